//! Password backend selection for a profile.

use serde::{Deserialize, Serialize};

use super::env::EnvPasswordStore;
use super::pass::{PassConfig, PassPasswordStore};
use super::PasswordStore;

/// Which backend holds a profile's password.
///
/// ```toml
/// [profiles.work.password]
/// backend = "env"
/// var = "AZURE_AD_PASSWORD"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum PasswordConfig {
    /// Password-store (pass) backend.
    Pass {
        #[serde(flatten)]
        config: PassConfig,
    },
    /// Environment variable backend.
    Env { var: String },
}

impl PasswordConfig {
    pub fn build(&self) -> Box<dyn PasswordStore> {
        match self {
            PasswordConfig::Pass { config } => Box::new(PassPasswordStore::new(config.clone())),
            PasswordConfig::Env { var } => Box::new(EnvPasswordStore::new(var.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pass_config() {
        let config: PasswordConfig = toml::from_str(
            r#"
backend = "pass"
path = "work/azure-ad"
field = "azure"
"#,
        )
        .unwrap();

        assert_eq!(
            config,
            PasswordConfig::Pass {
                config: PassConfig {
                    path: "work/azure-ad".to_string(),
                    field: Some("azure".to_string()),
                }
            }
        );
    }

    #[test]
    fn test_parse_env_config() {
        let config: PasswordConfig = toml::from_str(
            r#"
backend = "env"
var = "AZURE_AD_PASSWORD"
"#,
        )
        .unwrap();

        assert_eq!(
            config,
            PasswordConfig::Env {
                var: "AZURE_AD_PASSWORD".to_string()
            }
        );
        assert!(!config.build().supports_write());
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result: Result<PasswordConfig, _> = toml::from_str(r#"backend = "keychain""#);
        assert!(result.is_err());
    }
}
