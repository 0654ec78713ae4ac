#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};

use azsaml::prompt::Prompter;
use azsaml::{Authenticator, ClientOptions};
use secrecy::SecretString;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const APP_ID: &str = "app-123";
pub const START_PATH: &str = "/applications/redirecttofederatedapplication.aspx";

#[derive(Default)]
struct Script {
    inputs: VecDeque<String>,
    prompts: Vec<String>,
    notifications: Vec<String>,
}

/// Prompter answering from a fixed script and recording what it was asked.
#[derive(Clone, Default)]
pub struct ScriptedPrompter {
    script: Arc<Mutex<Script>>,
}

impl ScriptedPrompter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_inputs(inputs: &[&str]) -> Self {
        let prompter = Self::default();
        prompter.script.lock().unwrap().inputs = inputs.iter().map(|s| s.to_string()).collect();
        prompter
    }

    pub fn prompts(&self) -> Vec<String> {
        self.script.lock().unwrap().prompts.clone()
    }

    pub fn notifications(&self) -> Vec<String> {
        self.script.lock().unwrap().notifications.clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn input(&self, prompt: &str) -> io::Result<String> {
        let mut script = self.script.lock().unwrap();
        script.prompts.push(prompt.to_string());
        script
            .inputs
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "no scripted input left"))
    }

    fn password(&self, prompt: &str) -> io::Result<SecretString> {
        self.input(prompt).map(SecretString::from)
    }

    fn select(&self, prompt: &str, _options: &[String]) -> io::Result<usize> {
        self.script.lock().unwrap().prompts.push(prompt.to_string());
        Ok(0)
    }

    fn notify(&self, message: &str) {
        self.script
            .lock()
            .unwrap()
            .notifications
            .push(message.to_string());
    }
}

pub fn authenticator(server: &MockServer, prompter: &ScriptedPrompter) -> Authenticator {
    Authenticator::new(
        ClientOptions::new(server.uri(), APP_ID),
        Box::new(prompter.clone()),
    )
    .unwrap()
}

/// An HTML page embedding `config` as its `$Config` object.
pub fn converged_page(config: &Value) -> String {
    format!(
        "<!DOCTYPE html><html><head><script type=\"text/javascript\">//<![CDATA[\n$Config={config};\n//]]></script></head><body></body></html>"
    )
}

pub fn sign_in_config() -> Value {
    json!({
        "pgid": "ConvergedSignIn",
        "urlGetCredentialType": "/common/GetCredentialType?mkt=en-US",
        "urlPost": "/common/login",
        "sFT": "ft-sign-in",
        "sFTName": "flowToken",
        "sCtx": "ctx-sign-in",
        "canary": "canary-1",
        "apiCanary": "api-canary-1",
        "correlationId": "corr-1",
        "sessionId": "session-1",
        "hpgact": 1800,
        "hpgid": 1104,
        "sErrorCode": "50058",
        "sErrTxt": ""
    })
}

pub fn tfa_config(proofs: Value) -> Value {
    json!({
        "pgid": "ConvergedTFA",
        "urlBeginAuth": "/common/SAS/BeginAuth",
        "urlEndAuth": "/common/SAS/EndAuth",
        "urlPost": "/common/SAS/ProcessAuth",
        "sFT": "ft-tfa",
        "sFTName": "flowToken",
        "sCtx": "ctx-tfa",
        "canary": "canary-tfa",
        "sPOST_Username": "alice@example.com",
        "arrUserProofs": proofs,
        "oPerAuthPollingInterval": {"PhoneAppNotification": 0.01, "PhoneAppOTP": 0.01}
    })
}

pub fn kmsi_config() -> Value {
    json!({
        "pgid": "KmsiInterrupt",
        "urlPost": "/kmsi",
        "sFT": "ft-kmsi",
        "sFTName": "flowToken",
        "sCtx": "ctx-kmsi"
    })
}

/// Auto-post page relaying a SAML request, including an empty field.
pub fn saml_request_page(action: &str) -> String {
    format!(
        r#"<html><body onload="document.forms[0].submit()">
<form method="POST" name="hiddenform" action="{action}">
  <input type="hidden" name="SAMLRequest" value="req-123" />
  <input type="hidden" name="RelayState" value="" />
  <noscript><input type="submit" value="Continue" /></noscript>
</form></body></html>"#
    )
}

/// Final page posting the assertion to the service provider.
pub fn saml_response_page(assertion: &str) -> String {
    format!(
        r#"<html><body onload="document.forms[0].submit()">
<form method="POST" name="hiddenform" action="https://signin.aws.amazon.com/saml">
  <input type="hidden" name="SAMLResponse" value="{assertion}" />
</form></body></html>"#
    )
}
