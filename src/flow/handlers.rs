//! One handler per recognized page. Each takes the current page and returns
//! the page the server answered with.

use reqwest::header::REFERER;
use reqwest::Method;
use secrecy::ExposeSecret;
use tracing::{debug, info};
use url::Url;

use super::context::{CredentialTypeRequest, CredentialTypeResponse, ConvergedConfig};
use super::mfa::{select_proof, MfaDriver};
use super::{missing, required_url, session_context, Authenticator};
use crate::credentials::LoginCredentials;
use crate::error::AuthError;
use crate::extract;
use crate::transport::Snapshot;

fn field(name: &str, value: impl Into<String>) -> (String, String) {
    (name.to_string(), value.into())
}

impl Authenticator {
    pub(super) async fn converged_sign_in(
        &self,
        page: &Snapshot,
        creds: &LoginCredentials,
    ) -> Result<Snapshot, AuthError> {
        const HANDLER: &str = "ConvergedSignIn";

        let config = session_context(page, HANDLER)?;
        let credential_type = self
            .credential_type(page, &config, creds)
            .await
            .map_err(|e| e.in_step("GetCredentialType"))?;

        if let Some(federation) = credential_type.federation_redirect() {
            let url = page.resolve(federation)?;
            info!(url = %url, "account is federated; continuing at federation server");
            return self
                .federated_auth(url, creds)
                .await
                .map_err(|e| e.in_step("FederatedAuth"));
        }

        if let Some((code, message)) = config.reported_error() {
            return Err(AuthError::ServerReported {
                code: code.to_string(),
                message: message.to_string(),
            });
        }

        let login_url = required_url(page, HANDLER, &config.url_post, "urlPost")?;
        let fields = vec![
            field("canary", &config.canary),
            field("hpgrequestid", &config.session_id),
            field(config.flow_token_field(), &config.flow_token),
            field("ctx", &config.ctx),
            field("login", &creds.username),
            field("loginfmt", &creds.username),
            field("passwd", creds.password.expose_secret()),
        ];

        debug!(url = %login_url, "submitting password");
        let request = self
            .transport
            .request(Method::POST, login_url)
            .header(REFERER, page.url().as_str())
            .form(&fields);
        let response = self.transport.send(request).await?;
        Snapshot::capture(response).await
    }

    /// Ask whether the account signs in here or at a federation server.
    async fn credential_type(
        &self,
        page: &Snapshot,
        config: &ConvergedConfig,
        creds: &LoginCredentials,
    ) -> Result<CredentialTypeResponse, AuthError> {
        let url = required_url(
            page,
            "ConvergedSignIn",
            &config.url_get_credential_type,
            "urlGetCredentialType",
        )?;

        let correlation_id = if config.correlation_id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            config.correlation_id.clone()
        };

        let request = self
            .transport
            .request(Method::POST, url)
            .header("canary", &config.api_canary)
            .header("client-request-id", correlation_id)
            .header("hpgact", config.hpg_act.to_string())
            .header("hpgid", config.hpg_id.to_string())
            .header("hpgrequestid", &config.session_id)
            .header(REFERER, page.url().as_str())
            .json(&CredentialTypeRequest::new(&creds.username, config));

        let response = self.transport.send(request).await?;
        let reply = Snapshot::capture(response).await?;
        serde_json::from_str(reply.body()).map_err(|source| AuthError::Malformed {
            handler: "ConvergedSignIn",
            what: "GetCredentialType response",
            source,
        })
    }

    /// Sign in on an ADFS-style form, keeping every hidden field it carries.
    async fn federated_auth(&self, url: Url, creds: &LoginCredentials) -> Result<Snapshot, AuthError> {
        const HANDLER: &str = "FederatedAuth";

        let page = self.fetch(url).await?;
        let mut form =
            extract::first_form(page.body()).ok_or_else(|| missing(&page, HANDLER, "form"))?;
        let action = form
            .action
            .as_deref()
            .ok_or_else(|| missing(&page, HANDLER, "form action"))?;
        let action = page.resolve(action)?;

        form.set("UserName", creds.username.as_str());
        form.set("Password", creds.password.expose_secret());
        form.set("AuthMethod", "FormsAuthentication");

        debug!(url = %action, fields = form.fields.len(), "submitting federation form");
        let response = self.transport.post_form(action, &form.fields).await?;
        Snapshot::capture(response).await
    }

    pub(super) async fn converged_tfa(
        &self,
        page: &Snapshot,
        creds: &LoginCredentials,
    ) -> Result<Snapshot, AuthError> {
        const HANDLER: &str = "ConvergedTFA";

        let config = session_context(page, HANDLER)?;

        let skip = config.url_skip_mfa_registration.trim();
        if !skip.is_empty() {
            let url = page.resolve(skip)?;
            info!(url = %url, "skipping MFA registration");
            return self.fetch(url).await;
        }

        let proof = select_proof(&config.user_proofs)
            .ok_or_else(|| missing(page, HANDLER, "arrUserProofs"))?;
        let post_url = required_url(page, HANDLER, &config.url_post, "urlPost")?;
        info!(method = %proof.auth_method_id, display = %proof.display, "starting MFA");

        let state = MfaDriver::new(&self.transport, &*self.prompter, &self.options)
            .run(page, &config, proof, creds.mfa_code.as_ref())
            .await
            .map_err(|e| e.in_step("MFA"))?;

        let login = if config.post_username.is_empty() {
            creds.username.as_str()
        } else {
            config.post_username.as_str()
        };
        let fields = vec![
            field("request", state.ctx),
            field("mfaAuthMethod", state.auth_method_id),
            field("canary", &config.canary),
            field("login", login),
            field(config.flow_token_field(), state.flow_token),
        ];

        debug!(url = %post_url, "completing MFA");
        let response = self.transport.post_form(post_url, &fields).await?;
        Snapshot::capture(response).await
    }

    /// Decline "keep me signed in". The answer is posted with redirects off
    /// so the redirect it triggers is observed here.
    pub(super) async fn kmsi_interrupt(&mut self, page: &Snapshot) -> Result<Snapshot, AuthError> {
        const HANDLER: &str = "KmsiInterrupt";

        let config = session_context(page, HANDLER)?;
        let url = required_url(page, HANDLER, &config.url_post, "urlPost")?;
        let fields = vec![
            field(config.flow_token_field(), &config.flow_token),
            field("ctx", &config.ctx),
            field("LoginOptions", "1"),
        ];

        let observed = {
            let transport = self.transport.without_redirects();
            let response = transport.post_form(url, &fields).await?;
            Snapshot::capture(response).await?
        };

        match observed.redirect_target()? {
            Some(target) => {
                debug!(status = %observed.status(), url = %target, "following KMSI redirect");
                self.fetch(target).await
            }
            None => Ok(observed),
        }
    }

    /// Re-post the page's first form exactly as received.
    pub(super) async fn relay_form(
        &self,
        page: &Snapshot,
        handler: &'static str,
    ) -> Result<Snapshot, AuthError> {
        let form = extract::first_form(page.body()).ok_or_else(|| missing(page, handler, "form"))?;
        let action = form
            .action
            .as_deref()
            .ok_or_else(|| missing(page, handler, "form action"))?;
        let action = page.resolve(action)?;

        debug!(url = %action, fields = form.fields.len(), "relaying form");
        let response = self.transport.post_form(action, &form.fields).await?;
        Snapshot::capture(response).await
    }
}
