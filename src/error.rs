use std::time::Duration;

/// Root classification of an [`AuthError`], independent of which step
/// produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connectivity, TLS or timeout failure from the HTTP layer.
    Transport,
    /// A page no longer carries an element the flow depends on.
    ProtocolContract,
    /// The identity provider reported an explicit error code.
    ServerReported,
    /// The second-factor exchange failed or was rejected.
    Mfa,
    /// The second-factor exchange outlived the configured deadline.
    MfaTimeout,
    /// The identity provider returned a page the flow does not know.
    UnrecognizedState,
    /// The caller supplied unusable input.
    InvalidInput,
    /// Interactive input could not be read.
    Prompt,
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid URL {url:?}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{handler}: {expected} not found in page at {url}")]
    MissingElement {
        handler: &'static str,
        expected: &'static str,
        url: String,
    },

    #[error("{handler}: malformed {what}")]
    Malformed {
        handler: &'static str,
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("authentication error {code}: {message}")]
    ServerReported { code: String, message: String },

    #[error("MFA BeginAuth rejected: {message}")]
    MfaBegin { message: String },

    #[error("MFA error {code}: {message}")]
    Mfa { code: i64, message: String },

    #[error("MFA verification with {method} was not completed")]
    MfaNotCompleted { method: String },

    #[error("MFA verification did not complete within {0:?}")]
    MfaTimeout(Duration),

    #[error("reached unrecognized authentication state at {url}")]
    UnrecognizedState { url: String },

    #[error("{0}")]
    InvalidInput(&'static str),

    #[error("failed to read {what}")]
    Prompt {
        what: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} failed")]
    Step {
        step: &'static str,
        #[source]
        source: Box<AuthError>,
    },
}

impl AuthError {
    /// Wrap this error with the name of the step that produced it.
    pub fn in_step(self, step: &'static str) -> Self {
        AuthError::Step {
            step,
            source: Box::new(self),
        }
    }

    /// The innermost (non-step) error.
    pub fn root(&self) -> &AuthError {
        let mut current = self;
        while let AuthError::Step { source, .. } = current {
            current = source;
        }
        current
    }

    /// Names of the steps this error passed through, outermost first.
    pub fn steps(&self) -> Vec<&'static str> {
        let mut steps = Vec::new();
        let mut current = self;
        while let AuthError::Step { step, source } = current {
            steps.push(*step);
            current = source;
        }
        steps
    }

    pub fn kind(&self) -> ErrorKind {
        match self.root() {
            AuthError::Transport(_) => ErrorKind::Transport,
            AuthError::InvalidUrl { .. }
            | AuthError::MissingElement { .. }
            | AuthError::Malformed { .. } => ErrorKind::ProtocolContract,
            AuthError::ServerReported { .. } => ErrorKind::ServerReported,
            AuthError::MfaBegin { .. }
            | AuthError::Mfa { .. }
            | AuthError::MfaNotCompleted { .. } => ErrorKind::Mfa,
            AuthError::MfaTimeout(_) => ErrorKind::MfaTimeout,
            AuthError::UnrecognizedState { .. } => ErrorKind::UnrecognizedState,
            AuthError::InvalidInput(_) => ErrorKind::InvalidInput,
            AuthError::Prompt { .. } => ErrorKind::Prompt,
            AuthError::Step { .. } => unreachable!("root() never returns a step"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_looks_through_steps() {
        let err = AuthError::UnrecognizedState {
            url: "https://login.example.com/".to_string(),
        }
        .in_step("HiddenForm")
        .in_step("authenticate");

        assert_eq!(err.kind(), ErrorKind::UnrecognizedState);
        assert_eq!(err.steps(), vec!["authenticate", "HiddenForm"]);
    }

    #[test]
    fn test_step_message_names_step() {
        let err = AuthError::ServerReported {
            code: "50126".to_string(),
            message: "Invalid username or password".to_string(),
        }
        .in_step("ConvergedSignIn");

        assert_eq!(err.to_string(), "ConvergedSignIn failed");
        assert!(err.root().to_string().contains("50126"));
    }
}
