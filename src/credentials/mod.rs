//! Login credentials and password backends.
//!
//! A profile can name a backend that supplies the password so `login` does
//! not have to prompt every time:
//!
//! ```toml
//! [profiles.work.password]
//! backend = "pass"
//! path = "work/azure-ad"
//! ```

mod config;
mod env;
mod pass;

pub use config::PasswordConfig;
pub use env::EnvPasswordStore;
pub use pass::{PassConfig, PassPasswordStore};

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;

/// Input to one authentication. Read-only to the flow.
///
/// `Debug` output redacts the password and code.
#[derive(Debug)]
pub struct LoginCredentials {
    pub username: String,
    pub password: SecretString,
    /// One-time code to use instead of prompting for code-based MFA.
    pub mfa_code: Option<SecretString>,
}

impl LoginCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<SecretString>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            mfa_code: None,
        }
    }

    pub fn with_mfa_code(mut self, code: impl Into<SecretString>) -> Self {
        self.mfa_code = Some(code.into());
        self
    }
}

/// A place a profile's password can be read from.
#[async_trait]
pub trait PasswordStore: Send + Sync {
    /// Returns `Ok(None)` when the backend has no password for this profile.
    async fn get(&self) -> Result<Option<SecretString>>;

    /// Store a new password (e.g. after an interactive login).
    async fn set(&self, password: SecretString) -> Result<()>;

    /// Environment-backed stores are read-only.
    fn supports_write(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_debug_redacts_secrets() {
        let creds = LoginCredentials::new("alice@example.com", "hunter2".to_string())
            .with_mfa_code("123456".to_string());
        let debug = format!("{creds:?}");

        assert!(debug.contains("alice@example.com"));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("123456"));
        assert_eq!(creds.mfa_code.unwrap().expose_secret(), "123456");
    }
}
