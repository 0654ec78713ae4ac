use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;

use super::PasswordStore;

/// Read-only password from an environment variable.
pub struct EnvPasswordStore {
    var: String,
}

impl EnvPasswordStore {
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

#[async_trait]
impl PasswordStore for EnvPasswordStore {
    async fn get(&self) -> Result<Option<SecretString>> {
        Ok(std::env::var(&self.var)
            .ok()
            .filter(|v| !v.is_empty())
            .map(SecretString::from))
    }

    async fn set(&self, _password: SecretString) -> Result<()> {
        anyhow::bail!("environment variable {} cannot be written", self.var)
    }

    fn supports_write(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[tokio::test]
    async fn test_reads_variable() -> Result<()> {
        std::env::set_var("AZSAML_TEST_PASSWORD_READ", "from-env");
        let store = EnvPasswordStore::new("AZSAML_TEST_PASSWORD_READ");

        let password = store.get().await?.expect("password set");
        assert_eq!(password.expose_secret(), "from-env");
        assert!(!store.supports_write());
        assert!(store.set(SecretString::from("x".to_string())).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_variable_is_none() -> Result<()> {
        let store = EnvPasswordStore::new("AZSAML_TEST_PASSWORD_UNSET");
        assert!(store.get().await?.is_none());
        Ok(())
    }
}
