//! The sign-in conversation.
//!
//! [`Authenticator::authenticate`] starts at the application's linked
//! sign-in URL, then repeatedly classifies the current page and lets the
//! matching handler produce the next one. The loop ends when a page carries
//! a completed `SAMLResponse`, or with the first error.

pub mod context;
mod handlers;
pub mod mfa;
pub mod page;

pub use context::{ConvergedConfig, MfaState, UserProof};
pub use mfa::{select_proof, MfaDriver, MfaMethod};
pub use page::Page;

use std::time::Duration;

use tracing::{debug, info};
use url::Url;

use crate::credentials::LoginCredentials;
use crate::error::AuthError;
use crate::extract::{self, ConfigError};
use crate::prompt::Prompter;
use crate::transport::{Snapshot, Transport, TransportOptions};

/// Where and how to connect.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Identity provider base URL, e.g. `https://account.activedirectory.windowsazure.com`.
    pub url: String,
    /// Application id of the federated enterprise app.
    pub app_id: String,
    pub skip_verify: bool,
    pub timeout: Duration,
}

impl ClientOptions {
    pub fn new(url: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            app_id: app_id.into(),
            skip_verify: false,
            timeout: TransportOptions::default().timeout,
        }
    }
}

/// Tuning for the second-factor exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthOptions {
    /// Wait between EndAuth polls when the page advertises no interval.
    pub default_poll_interval: Duration,
    /// Upper bound on the whole polling phase. `None` waits as long as the
    /// server keeps offering retries.
    pub mfa_timeout: Option<Duration>,
}

impl Default for AuthOptions {
    fn default() -> Self {
        Self {
            default_poll_interval: Duration::from_secs(2),
            mfa_timeout: None,
        }
    }
}

/// Outcome of handling one page.
#[derive(Debug)]
enum Step {
    Next(Snapshot),
    Done(String),
}

pub struct Authenticator {
    transport: Transport,
    base_url: Url,
    app_id: String,
    prompter: Box<dyn Prompter>,
    options: AuthOptions,
}

impl Authenticator {
    pub fn new(client: ClientOptions, prompter: Box<dyn Prompter>) -> Result<Self, AuthError> {
        let url = client.url.trim();
        if url.is_empty() {
            return Err(AuthError::InvalidInput("identity provider URL is required"));
        }
        if client.app_id.trim().is_empty() {
            return Err(AuthError::InvalidInput("application id is required"));
        }
        let base_url = Url::parse(url.trim_end_matches('/')).map_err(|source| {
            AuthError::InvalidUrl {
                url: url.to_string(),
                source,
            }
        })?;

        let transport = Transport::new(TransportOptions {
            timeout: client.timeout,
            skip_verify: client.skip_verify,
        })?;

        Ok(Self {
            transport,
            base_url,
            app_id: client.app_id.trim().to_string(),
            prompter,
            options: AuthOptions::default(),
        })
    }

    pub fn with_options(mut self, options: AuthOptions) -> Self {
        self.options = options;
        self
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// First URL of the conversation.
    pub fn start_url(&self) -> Url {
        let mut url = self.base_url.clone();
        let path = format!(
            "{}/applications/redirecttofederatedapplication.aspx",
            url.path().trim_end_matches('/')
        );
        url.set_path(&path);
        url.query_pairs_mut()
            .clear()
            .append_pair("Operation", "LinkedSignIn")
            .append_pair("applicationId", &self.app_id);
        url
    }

    /// Run the whole sign-in and return the base64 SAML assertion.
    ///
    /// Starts from an empty cookie jar. Errors are wrapped with the name of
    /// the page handler that failed; use [`AuthError::kind`] to branch.
    pub async fn authenticate(&mut self, creds: &LoginCredentials) -> Result<String, AuthError> {
        use secrecy::ExposeSecret;

        if creds.username.trim().is_empty() {
            return Err(AuthError::InvalidInput("username is required"));
        }
        if creds.password.expose_secret().is_empty() {
            return Err(AuthError::InvalidInput("password is required"));
        }

        self.transport.reset_cookies()?;

        let start = self.start_url();
        info!(url = %start, username = %creds.username, "starting sign-in");
        let mut current = self.fetch(start).await.map_err(|e| e.in_step("start"))?;

        loop {
            let page = Page::classify(current.body());
            debug!(page = page.name(), url = %current.url(), status = %current.status(), "classified page");

            let step = self
                .handle(page, &current, creds)
                .await
                .map_err(|e| e.in_step(page.name()))?;
            match step {
                Step::Next(next) => current = next,
                Step::Done(assertion) => {
                    info!(bytes = assertion.len(), "SAML assertion obtained");
                    return Ok(assertion);
                }
            }
        }
    }

    async fn handle(
        &mut self,
        page: Page,
        current: &Snapshot,
        creds: &LoginCredentials,
    ) -> Result<Step, AuthError> {
        let next = match page {
            Page::ConvergedSignIn => self.converged_sign_in(current, creds).await?,
            Page::ConvergedTfa => self.converged_tfa(current, creds).await?,
            Page::KmsiInterrupt => self.kmsi_interrupt(current).await?,
            Page::SamlRequestRelay => self.relay_form(current, page.name()).await?,
            Page::HiddenForm => match extract::saml_response(current.body()) {
                Some(assertion) => return Ok(Step::Done(assertion)),
                None => self.relay_form(current, page.name()).await?,
            },
            Page::Unrecognized => return Err(unrecognized(current)),
        };
        Ok(Step::Next(next))
    }

    async fn fetch(&self, url: Url) -> Result<Snapshot, AuthError> {
        let response = self.transport.get(url).await?;
        Snapshot::capture(response).await
    }
}

/// Fallback for pages matching no marker: surface the server's own error
/// when it reports one.
fn unrecognized(page: &Snapshot) -> AuthError {
    if page.contains("sErrorCode") {
        if let Ok(config) = extract::embedded_config::<ConvergedConfig>(page.body()) {
            if let Some((code, message)) = config.reported_error() {
                return AuthError::ServerReported {
                    code: code.to_string(),
                    message: message.to_string(),
                };
            }
        }
    }
    AuthError::UnrecognizedState {
        url: page.url().to_string(),
    }
}

/// Parse the `$Config` session context of a converged page.
pub(crate) fn session_context(
    page: &Snapshot,
    handler: &'static str,
) -> Result<ConvergedConfig, AuthError> {
    extract::embedded_config(page.body()).map_err(|err| match err {
        ConfigError::NotFound => missing(page, handler, "$Config"),
        ConfigError::Json(source) => AuthError::Malformed {
            handler,
            what: "$Config",
            source,
        },
    })
}

/// Resolve a server-advertised URL, failing when the page left it empty.
pub(crate) fn required_url(
    page: &Snapshot,
    handler: &'static str,
    value: &str,
    expected: &'static str,
) -> Result<Url, AuthError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(missing(page, handler, expected));
    }
    page.resolve(value)
}

pub(crate) fn missing(page: &Snapshot, handler: &'static str, expected: &'static str) -> AuthError {
    AuthError::MissingElement {
        handler,
        expected,
        url: page.url().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use reqwest::StatusCode;
    use secrecy::SecretString;
    use std::io;

    struct NoPrompts;

    impl Prompter for NoPrompts {
        fn input(&self, _prompt: &str) -> io::Result<String> {
            Err(io::Error::other("no input expected"))
        }

        fn password(&self, _prompt: &str) -> io::Result<SecretString> {
            Err(io::Error::other("no input expected"))
        }

        fn select(&self, _prompt: &str, _options: &[String]) -> io::Result<usize> {
            Err(io::Error::other("no input expected"))
        }
    }

    fn page(body: &str) -> Snapshot {
        Snapshot::from_parts(
            "https://login.example.com/common/login".parse().unwrap(),
            StatusCode::OK,
            body,
        )
    }

    #[test]
    fn test_start_url() {
        let auth = Authenticator::new(
            ClientOptions::new("https://account.example.com/", "app-123"),
            Box::new(NoPrompts),
        )
        .unwrap();

        assert_eq!(
            auth.start_url().as_str(),
            "https://account.example.com/applications/redirecttofederatedapplication.aspx?Operation=LinkedSignIn&applicationId=app-123"
        );
    }

    #[test]
    fn test_new_requires_url_and_app_id() {
        let err = Authenticator::new(ClientOptions::new("", "app"), Box::new(NoPrompts))
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err = Authenticator::new(
            ClientOptions::new("https://account.example.com", " "),
            Box::new(NoPrompts),
        )
        .err()
        .unwrap();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[tokio::test]
    async fn test_authenticate_rejects_empty_password() {
        let mut auth = Authenticator::new(
            ClientOptions::new("https://account.example.com", "app"),
            Box::new(NoPrompts),
        )
        .unwrap();

        let creds = LoginCredentials::new("alice@example.com", String::new());
        let err = auth.authenticate(&creds).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_unrecognized_reports_server_error() {
        let err = unrecognized(&page(
            r#"<script>$Config={"sErrorCode":"50126","sErrTxt":"Invalid password."};</script>"#,
        ));
        assert_eq!(err.kind(), ErrorKind::ServerReported);

        let err = unrecognized(&page(r#"<script>$Config={"sErrorCode":"50058"};</script>"#));
        assert_eq!(err.kind(), ErrorKind::UnrecognizedState);

        let err = unrecognized(&page(
            r#"<script>$Config={"sErrorCode":"50053","sErrTxt":"Account locked.","urlSkipMfaRegistration":null,"hpgid":null};</script>"#,
        ));
        assert!(matches!(err, AuthError::ServerReported { code, .. } if code == "50053"));

        let err = unrecognized(&page("<html>maintenance</html>"));
        assert!(matches!(err, AuthError::UnrecognizedState { url } if url.ends_with("/common/login")));
    }

    #[test]
    fn test_required_url_resolves_relative() {
        let page = page("");
        let url = required_url(&page, "ConvergedTFA", "/common/SAS/BeginAuth", "urlBeginAuth").unwrap();
        assert_eq!(url.as_str(), "https://login.example.com/common/SAS/BeginAuth");

        let err = required_url(&page, "ConvergedTFA", "  ", "urlBeginAuth").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolContract);
        assert!(err.to_string().contains("urlBeginAuth"));
    }

    #[test]
    fn test_session_context_errors_are_contract_failures() {
        let err = session_context(&page("<html></html>"), "KmsiInterrupt").unwrap_err();
        assert!(matches!(err, AuthError::MissingElement { expected: "$Config", .. }));

        let err = session_context(&page(r#"$Config={"sFT":};"#), "KmsiInterrupt").unwrap_err();
        assert!(matches!(err, AuthError::Malformed { .. }));
        assert_eq!(err.kind(), ErrorKind::ProtocolContract);
    }
}
