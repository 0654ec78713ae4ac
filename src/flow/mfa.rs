//! Second-factor challenge: one BeginAuth call, then EndAuth polls until
//! the server reports success, a hard error, or stops offering retries.

use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use url::Url;

use super::context::{ConvergedConfig, MfaRequest, MfaState, UserProof};
use super::{required_url, AuthOptions};
use crate::error::AuthError;
use crate::prompt::Prompter;
use crate::transport::{Snapshot, Transport};

const HANDLER: &str = "ConvergedTFA";

/// Second-factor methods the driver distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MfaMethod {
    PhoneAppOtp,
    PhoneAppNotification,
    OneWaySms,
    TwoWayVoiceMobile,
    Other,
}

impl MfaMethod {
    pub fn from_id(id: &str) -> Self {
        match id {
            "PhoneAppOTP" => MfaMethod::PhoneAppOtp,
            "PhoneAppNotification" => MfaMethod::PhoneAppNotification,
            "OneWaySMS" => MfaMethod::OneWaySms,
            "TwoWayVoiceMobile" => MfaMethod::TwoWayVoiceMobile,
            _ => MfaMethod::Other,
        }
    }

    /// Methods that need a verification code typed in.
    pub fn takes_code(self) -> bool {
        matches!(self, MfaMethod::PhoneAppOtp | MfaMethod::OneWaySms)
    }

    pub fn is_push(self) -> bool {
        self == MfaMethod::PhoneAppNotification
    }
}

/// Pick the proof flagged as default, else the first one offered.
pub fn select_proof(proofs: &[UserProof]) -> Option<&UserProof> {
    proofs.iter().find(|p| p.is_default).or_else(|| proofs.first())
}

fn push_hint(entropy: i64) -> String {
    if entropy == 0 {
        "Phone approval required.".to_string()
    } else {
        format!("Phone approval required. Number match: {entropy}")
    }
}

pub struct MfaDriver<'a> {
    transport: &'a Transport,
    prompter: &'a dyn Prompter,
    options: &'a AuthOptions,
}

impl<'a> MfaDriver<'a> {
    pub fn new(
        transport: &'a Transport,
        prompter: &'a dyn Prompter,
        options: &'a AuthOptions,
    ) -> Self {
        Self {
            transport,
            prompter,
            options,
        }
    }

    /// Run the challenge for `proof` using the tokens of the challenge page.
    ///
    /// `code` is used for code-based methods instead of prompting.
    pub async fn run(
        &self,
        page: &Snapshot,
        config: &ConvergedConfig,
        proof: &UserProof,
        code: Option<&SecretString>,
    ) -> Result<MfaState, AuthError> {
        let begin_url = required_url(page, HANDLER, &config.url_begin_auth, "urlBeginAuth")?;
        let end_url = required_url(page, HANDLER, &config.url_end_auth, "urlEndAuth")?;

        let begun = self
            .begin(begin_url, config, proof)
            .await
            .map_err(|e| e.in_step("BeginAuth"))?;

        let polling = self.poll(&end_url, config, begun, code);
        let state = match self.options.mfa_timeout {
            Some(limit) => tokio::time::timeout(limit, polling)
                .await
                .map_err(|_| AuthError::MfaTimeout(limit))?,
            None => polling.await,
        };
        state.map_err(|e| e.in_step("EndAuth"))
    }

    async fn begin(
        &self,
        url: Url,
        config: &ConvergedConfig,
        proof: &UserProof,
    ) -> Result<MfaState, AuthError> {
        let request = MfaRequest {
            auth_method_id: proof.auth_method_id.clone(),
            method: "BeginAuth",
            ctx: config.ctx.clone(),
            flow_token: config.flow_token.clone(),
            session_id: String::new(),
            additional_auth_data: String::new(),
        };

        let mut state = self.call(url, &request, "BeginAuth response").await?;
        if !state.success {
            return Err(AuthError::MfaBegin {
                message: state.message_text(),
            });
        }
        if state.auth_method_id.is_empty() {
            state.auth_method_id = request.auth_method_id;
        }
        debug!(method = %state.auth_method_id, entropy = state.entropy, "MFA challenge started");
        Ok(state)
    }

    async fn poll(
        &self,
        url: &Url,
        config: &ConvergedConfig,
        mut state: MfaState,
        code: Option<&SecretString>,
    ) -> Result<MfaState, AuthError> {
        let mut attempt = 0u32;
        loop {
            let method = MfaMethod::from_id(&state.auth_method_id);
            let mut request = MfaRequest {
                auth_method_id: state.auth_method_id.clone(),
                method: "EndAuth",
                ctx: state.ctx.clone(),
                flow_token: state.flow_token.clone(),
                session_id: state.session_id.clone(),
                additional_auth_data: String::new(),
            };

            if method.takes_code() {
                request.additional_auth_data = match code {
                    Some(code) => code.expose_secret().to_string(),
                    None => self
                        .prompter
                        .input("Enter verification code")
                        .map_err(|source| AuthError::Prompt {
                            what: "verification code",
                            source,
                        })?,
                };
            } else if method.is_push() && attempt == 0 {
                self.prompter.notify(&push_hint(state.entropy));
            }

            let mut next = self
                .call(url.clone(), &request, "EndAuth response")
                .await?;
            if next.auth_method_id.is_empty() {
                next.auth_method_id = request.auth_method_id;
            }
            state = next;
            attempt += 1;

            if state.err_code != 0 {
                return Err(AuthError::Mfa {
                    code: state.err_code,
                    message: state.message_text(),
                });
            }
            if state.success {
                info!(method = %state.auth_method_id, attempts = attempt, "MFA verification succeeded");
                return Ok(state);
            }
            if !state.retry {
                return Err(AuthError::MfaNotCompleted {
                    method: state.auth_method_id,
                });
            }

            let interval = config
                .polling_interval(&state.auth_method_id)
                .unwrap_or(self.options.default_poll_interval);
            debug!(attempt, ?interval, "MFA not completed yet; polling again");
            tokio::time::sleep(interval).await;
        }
    }

    async fn call(
        &self,
        url: Url,
        request: &MfaRequest,
        what: &'static str,
    ) -> Result<MfaState, AuthError> {
        let response = self.transport.post_json(url, request).await?;
        let page = Snapshot::capture(response).await?;
        serde_json::from_str(page.body()).map_err(|source| AuthError::Malformed {
            handler: HANDLER,
            what,
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn proof(id: &str, is_default: bool) -> UserProof {
        UserProof {
            auth_method_id: id.to_string(),
            is_default,
            ..Default::default()
        }
    }

    #[test]
    fn test_select_proof_prefers_default_regardless_of_order() {
        let proofs = vec![
            proof("OneWaySMS", false),
            proof("PhoneAppOTP", false),
            proof("PhoneAppNotification", true),
        ];
        assert_eq!(
            select_proof(&proofs).unwrap().auth_method_id,
            "PhoneAppNotification"
        );

        let proofs = vec![
            proof("PhoneAppNotification", true),
            proof("OneWaySMS", false),
            proof("PhoneAppOTP", false),
        ];
        assert_eq!(
            select_proof(&proofs).unwrap().auth_method_id,
            "PhoneAppNotification"
        );
    }

    #[test]
    fn test_select_proof_falls_back_to_first() {
        let proofs = vec![
            proof("TwoWayVoiceMobile", false),
            proof("OneWaySMS", false),
            proof("PhoneAppOTP", false),
        ];
        assert_eq!(
            select_proof(&proofs).unwrap().auth_method_id,
            "TwoWayVoiceMobile"
        );
        assert!(select_proof(&[]).is_none());
    }

    #[test]
    fn test_method_classification() {
        assert!(MfaMethod::from_id("PhoneAppOTP").takes_code());
        assert!(MfaMethod::from_id("OneWaySMS").takes_code());
        assert!(MfaMethod::from_id("PhoneAppNotification").is_push());
        let voice = MfaMethod::from_id("TwoWayVoiceMobile");
        assert!(!voice.takes_code() && !voice.is_push());
        assert_eq!(MfaMethod::from_id("FidoKey"), MfaMethod::Other);
    }

    #[test]
    fn test_push_hint() {
        assert_eq!(push_hint(0), "Phone approval required.");
        assert_eq!(push_hint(42), "Phone approval required. Number match: 42");
    }
}
