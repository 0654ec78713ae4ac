//! Wire types for the converged sign-in pages and their JSON endpoints.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

/// Error code the sign-in page carries before any credentials were posted
/// ("user has not signed in yet"). It is not a failure.
pub const BENIGN_ERROR_CODE: &str = "50058";

/// Read an explicit JSON `null` as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// Session context embedded as `$Config` in each converged page.
///
/// Every page produces a fresh one; nothing is merged across pages.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConvergedConfig {
    #[serde(rename = "pgid", deserialize_with = "null_as_default")]
    pub page_id: String,
    #[serde(rename = "urlGetCredentialType", deserialize_with = "null_as_default")]
    pub url_get_credential_type: String,
    #[serde(rename = "urlPost", deserialize_with = "null_as_default")]
    pub url_post: String,
    #[serde(rename = "urlBeginAuth", deserialize_with = "null_as_default")]
    pub url_begin_auth: String,
    #[serde(rename = "urlEndAuth", deserialize_with = "null_as_default")]
    pub url_end_auth: String,
    #[serde(rename = "urlSkipMfaRegistration", deserialize_with = "null_as_default")]
    pub url_skip_mfa_registration: String,
    #[serde(rename = "arrUserProofs", deserialize_with = "null_as_default")]
    pub user_proofs: Vec<UserProof>,
    /// Seconds to wait between EndAuth polls, keyed by method id.
    #[serde(rename = "oPerAuthPollingInterval", deserialize_with = "null_as_default")]
    pub polling_intervals: HashMap<String, f64>,
    #[serde(rename = "sErrorCode", deserialize_with = "null_as_default")]
    pub error_code: String,
    #[serde(rename = "sErrTxt", deserialize_with = "null_as_default")]
    pub error_text: String,
    #[serde(rename = "sPOST_Username", deserialize_with = "null_as_default")]
    pub post_username: String,
    #[serde(rename = "sFT", deserialize_with = "null_as_default")]
    pub flow_token: String,
    #[serde(rename = "sFTName", deserialize_with = "null_as_default")]
    pub flow_token_name: String,
    #[serde(rename = "sCtx", deserialize_with = "null_as_default")]
    pub ctx: String,
    #[serde(rename = "hpgact", deserialize_with = "null_as_default")]
    pub hpg_act: i64,
    #[serde(rename = "hpgid", deserialize_with = "null_as_default")]
    pub hpg_id: i64,
    #[serde(rename = "apiCanary", deserialize_with = "null_as_default")]
    pub api_canary: String,
    #[serde(deserialize_with = "null_as_default")]
    pub canary: String,
    #[serde(rename = "correlationId", deserialize_with = "null_as_default")]
    pub correlation_id: String,
    #[serde(rename = "sessionId", deserialize_with = "null_as_default")]
    pub session_id: String,
}

impl ConvergedConfig {
    /// The server-reported error, unless absent or the benign
    /// not-yet-signed-in code.
    pub fn reported_error(&self) -> Option<(&str, &str)> {
        if self.error_code.is_empty() || self.error_code == BENIGN_ERROR_CODE {
            None
        } else {
            Some((&self.error_code, &self.error_text))
        }
    }

    /// Form field name carrying the flow token.
    pub fn flow_token_field(&self) -> &str {
        if self.flow_token_name.is_empty() {
            "flowToken"
        } else {
            &self.flow_token_name
        }
    }

    /// Advertised polling interval for a method, if any.
    pub fn polling_interval(&self, method_id: &str) -> Option<Duration> {
        self.polling_intervals
            .get(method_id)
            .and_then(|secs| Duration::try_from_secs_f64(*secs).ok())
    }
}

/// One second factor registered for the account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UserProof {
    #[serde(rename = "authMethodId", deserialize_with = "null_as_default")]
    pub auth_method_id: String,
    #[serde(deserialize_with = "null_as_default")]
    pub data: String,
    #[serde(deserialize_with = "null_as_default")]
    pub display: String,
    #[serde(rename = "isDefault", deserialize_with = "null_as_default")]
    pub is_default: bool,
}

/// Body of the credential type lookup.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialTypeRequest<'a> {
    pub username: &'a str,
    pub is_other_idp_supported: bool,
    pub check_phones: bool,
    #[serde(rename = "isRemoteNGCSupported")]
    pub is_remote_ngc_supported: bool,
    pub is_cookie_banner_shown: bool,
    pub is_fido_supported: bool,
    pub original_request: &'a str,
    pub country: &'a str,
    pub forceotclogin: bool,
    pub is_external_federation_disallowed: bool,
    pub is_remote_connect_supported: bool,
    pub federation_flags: i64,
    pub is_signup: bool,
    pub flow_token: &'a str,
    pub is_access_pass_supported: bool,
}

impl<'a> CredentialTypeRequest<'a> {
    pub fn new(username: &'a str, config: &'a ConvergedConfig) -> Self {
        Self {
            username,
            is_other_idp_supported: true,
            check_phones: false,
            is_remote_ngc_supported: false,
            is_cookie_banner_shown: false,
            is_fido_supported: false,
            original_request: &config.ctx,
            country: "",
            forceotclogin: false,
            is_external_federation_disallowed: false,
            is_remote_connect_supported: false,
            federation_flags: 0,
            is_signup: false,
            flow_token: &config.flow_token,
            is_access_pass_supported: false,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CredentialTypeResponse {
    #[serde(rename = "Username", deserialize_with = "null_as_default")]
    pub username: String,
    #[serde(rename = "IfExistsResult", deserialize_with = "null_as_default")]
    pub if_exists_result: i64,
    #[serde(rename = "Credentials", deserialize_with = "null_as_default")]
    pub credentials: CredentialDetails,
    #[serde(rename = "FlowToken", deserialize_with = "null_as_default")]
    pub flow_token: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CredentialDetails {
    #[serde(rename = "PrefCredential", deserialize_with = "null_as_default")]
    pub pref_credential: i64,
    #[serde(rename = "HasPassword", deserialize_with = "null_as_default")]
    pub has_password: bool,
    #[serde(rename = "FederationRedirectUrl", deserialize_with = "null_as_default")]
    pub federation_redirect_url: String,
}

impl CredentialTypeResponse {
    pub fn federation_redirect(&self) -> Option<&str> {
        Some(self.credentials.federation_redirect_url.trim()).filter(|url| !url.is_empty())
    }
}

/// Body of BeginAuth / EndAuth calls.
#[derive(Debug, Clone, Serialize)]
pub struct MfaRequest {
    #[serde(rename = "AuthMethodId")]
    pub auth_method_id: String,
    #[serde(rename = "Method")]
    pub method: &'static str,
    #[serde(rename = "Ctx")]
    pub ctx: String,
    #[serde(rename = "FlowToken")]
    pub flow_token: String,
    #[serde(rename = "SessionId", skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(rename = "AdditionalAuthData", skip_serializing_if = "String::is_empty")]
    pub additional_auth_data: String,
}

/// Result of a BeginAuth or EndAuth call; each poll replaces the last.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MfaState {
    #[serde(rename = "Success", deserialize_with = "null_as_default")]
    pub success: bool,
    #[serde(rename = "ResultValue", deserialize_with = "null_as_default")]
    pub result_value: String,
    #[serde(rename = "Message", deserialize_with = "null_as_default")]
    pub message: serde_json::Value,
    #[serde(rename = "AuthMethodId", deserialize_with = "null_as_default")]
    pub auth_method_id: String,
    #[serde(rename = "ErrCode", deserialize_with = "null_as_default")]
    pub err_code: i64,
    #[serde(rename = "Retry", deserialize_with = "null_as_default")]
    pub retry: bool,
    #[serde(rename = "FlowToken", deserialize_with = "null_as_default")]
    pub flow_token: String,
    #[serde(rename = "Ctx", deserialize_with = "null_as_default")]
    pub ctx: String,
    #[serde(rename = "SessionId", deserialize_with = "null_as_default")]
    pub session_id: String,
    #[serde(rename = "CorrelationId", deserialize_with = "null_as_default")]
    pub correlation_id: String,
    /// Number the user must match in the authenticator app.
    #[serde(rename = "Entropy", deserialize_with = "null_as_default")]
    pub entropy: i64,
}

impl MfaState {
    pub fn message_text(&self) -> String {
        match &self.message {
            serde_json::Value::Null => self.result_value.clone(),
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        }
    }
}
