use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::credentials::PasswordConfig;
use crate::duration::{deserialize_duration_opt, serialize_duration_opt};
use crate::flow::{AuthOptions, ClientOptions};
use crate::transport::TransportOptions;

/// Sign-in portal used when a profile does not name one.
pub const DEFAULT_URL: &str = "https://account.activedirectory.windowsazure.com";

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_session_duration() -> u64 {
    3600
}

/// Settings every profile inherits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Defaults {
    pub region: String,

    /// Requested AWS session length in seconds.
    pub session_duration: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            region: default_region(),
            session_duration: default_session_duration(),
        }
    }
}

/// One named sign-in target.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,

    /// Application id of the AWS enterprise app.
    pub app_id: String,

    pub username: String,

    /// Role to pick without asking when the assertion grants several.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role_arn: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_duration: Option<u64>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub skip_verify: bool,

    /// Per-request HTTP timeout.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_duration_opt",
        serialize_with = "serialize_duration_opt"
    )]
    pub timeout: Option<Duration>,

    /// MFA polling interval when the sign-in page advertises none.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_duration_opt",
        serialize_with = "serialize_duration_opt"
    )]
    pub poll_interval: Option<Duration>,

    /// Give up waiting for MFA approval after this long.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_duration_opt",
        serialize_with = "serialize_duration_opt"
    )]
    pub mfa_timeout: Option<Duration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<PasswordConfig>,
}

/// The config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub defaults: Defaults,
    pub profiles: BTreeMap<String, Profile>,
}

impl Config {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load config from a file, or return default config if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the config, readable by the owner only.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        write_private(path, content.as_bytes())
            .with_context(|| format!("Failed to write config file: {}", path.display()))
    }

    /// A profile with defaults applied.
    pub fn profile(&self, name: &str) -> Result<ResolvedProfile> {
        let profile = self
            .profiles
            .get(name)
            .with_context(|| format!("Profile not found: {name}"))?;

        Ok(ResolvedProfile {
            name: name.to_string(),
            url: if profile.url.trim().is_empty() {
                DEFAULT_URL.to_string()
            } else {
                profile.url.clone()
            },
            app_id: profile.app_id.clone(),
            username: profile.username.clone(),
            role_arn: profile.role_arn.clone().filter(|arn| !arn.is_empty()),
            region: profile
                .region
                .clone()
                .filter(|r| !r.is_empty())
                .unwrap_or_else(|| self.defaults.region.clone()),
            session_duration: profile
                .session_duration
                .filter(|d| *d > 0)
                .unwrap_or(self.defaults.session_duration),
            skip_verify: profile.skip_verify,
            timeout: profile.timeout.unwrap_or(TransportOptions::default().timeout),
            auth: AuthOptions {
                default_poll_interval: profile
                    .poll_interval
                    .unwrap_or(AuthOptions::default().default_poll_interval),
                mfa_timeout: profile.mfa_timeout,
            },
            password: profile.password.clone(),
        })
    }

    pub fn set_profile(&mut self, name: impl Into<String>, profile: Profile) {
        self.profiles.insert(name.into(), profile);
    }

    pub fn profile_names(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

#[cfg(unix)]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(content)
}

#[cfg(not(unix))]
fn write_private(path: &Path, content: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, content)
}

/// A profile merged with the file's defaults, ready to drive a login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedProfile {
    pub name: String,
    pub url: String,
    pub app_id: String,
    pub username: String,
    pub role_arn: Option<String>,
    pub region: String,
    pub session_duration: u64,
    pub skip_verify: bool,
    pub timeout: Duration,
    pub auth: AuthOptions,
    pub password: Option<PasswordConfig>,
}

impl ResolvedProfile {
    pub fn client_options(&self) -> ClientOptions {
        ClientOptions {
            url: self.url.clone(),
            app_id: self.app_id.clone(),
            skip_verify: self.skip_verify,
            timeout: self.timeout,
        }
    }
}

/// Returns the default config file path.
///
/// Resolution order:
/// 1. `$AZSAML_CONFIG` if set
/// 2. `<config dir>/azsaml/config.toml` (e.g. `~/.config/azsaml/config.toml`)
/// 3. `./azsaml.toml`
pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os("AZSAML_CONFIG").filter(|p| !p.is_empty()) {
        return PathBuf::from(path);
    }

    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("azsaml").join("config.toml");
    }

    PathBuf::from("azsaml.toml")
}
