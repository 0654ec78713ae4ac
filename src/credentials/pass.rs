//! Password-store (pass) backend.
//!
//! The password is the first line of the entry unless `field` names a
//! `field: value` line instead.

use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::PasswordStore;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassConfig {
    /// The pass entry path (e.g., "work/azure-ad").
    pub path: String,

    /// Read this `field: value` line instead of the first line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

pub struct PassPasswordStore {
    config: PassConfig,
}

impl PassPasswordStore {
    pub fn new(config: PassConfig) -> Self {
        Self { config }
    }

    fn show(&self) -> Result<Option<String>> {
        let output = Command::new("pass")
            .arg("show")
            .arg(&self.config.path)
            .output()
            .context("Failed to run pass command")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if stderr.contains("is not in the password store") {
                return Ok(None);
            }
            anyhow::bail!("pass show {} failed: {}", self.config.path, stderr.trim());
        }

        String::from_utf8(output.stdout)
            .map(Some)
            .context("Invalid UTF-8 in pass output")
    }

    fn insert(&self, content: &str) -> Result<()> {
        let mut child = Command::new("pass")
            .arg("insert")
            .arg("--multiline")
            .arg("--force")
            .arg(&self.config.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .spawn()
            .context("Failed to spawn pass command")?;

        if let Some(stdin) = child.stdin.as_mut() {
            stdin
                .write_all(content.as_bytes())
                .context("Failed to write to pass stdin")?;
        }

        let status = child.wait().context("Failed to wait for pass command")?;
        if !status.success() {
            anyhow::bail!("pass insert {} failed", self.config.path);
        }
        Ok(())
    }
}

#[async_trait]
impl PasswordStore for PassPasswordStore {
    async fn get(&self) -> Result<Option<SecretString>> {
        let Some(content) = self.show()? else {
            return Ok(None);
        };
        let entry = PassEntry::parse(&content);
        Ok(entry
            .password(self.config.field.as_deref())
            .map(|pw| SecretString::from(pw.to_string())))
    }

    async fn set(&self, password: SecretString) -> Result<()> {
        let mut entry = self
            .show()?
            .map(|content| PassEntry::parse(&content))
            .unwrap_or_default();
        entry.replace(self.config.field.as_deref(), password.expose_secret());
        self.insert(&entry.render())
    }
}

/// Lines of a pass entry, first line being the password.
#[derive(Debug, Default, PartialEq, Eq)]
struct PassEntry {
    lines: Vec<String>,
}

impl PassEntry {
    fn parse(content: &str) -> Self {
        Self {
            lines: content.lines().map(str::to_string).collect(),
        }
    }

    fn password(&self, field: Option<&str>) -> Option<&str> {
        match field {
            None => self.lines.first().map(String::as_str).filter(|l| !l.is_empty()),
            Some(field) => self.lines.iter().skip(1).find_map(|line| {
                line.split_once(": ")
                    .filter(|(key, _)| *key == field)
                    .map(|(_, value)| value)
            }),
        }
    }

    fn replace(&mut self, field: Option<&str>, password: &str) {
        let Some(field) = field else {
            match self.lines.first_mut() {
                Some(first) => *first = password.to_string(),
                None => self.lines.push(password.to_string()),
            }
            return;
        };

        if self.lines.is_empty() {
            self.lines.push(String::new());
        }
        let prefix = format!("{field}: ");
        let line = format!("{prefix}{password}");
        match self.lines.iter_mut().skip(1).find(|l| l.starts_with(&prefix)) {
            Some(existing) => *existing = line,
            None => self.lines.push(line),
        }
    }

    fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_is_first_line() {
        let entry = PassEntry::parse("s3cret\nusername: alice@example.com\n");
        assert_eq!(entry.password(None), Some("s3cret"));
        assert_eq!(entry.password(Some("username")), Some("alice@example.com"));
        assert_eq!(entry.password(Some("missing")), None);
    }

    #[test]
    fn test_empty_entry_has_no_password() {
        let entry = PassEntry::parse("");
        assert_eq!(entry.password(None), None);
    }

    #[test]
    fn test_replace_first_line_keeps_fields() {
        let mut entry = PassEntry::parse("old\nurl: https://example.com");
        entry.replace(None, "new");
        assert_eq!(entry.render(), "new\nurl: https://example.com\n");
    }

    #[test]
    fn test_replace_named_field() {
        let mut entry = PassEntry::parse("master\nazure: old");
        entry.replace(Some("azure"), "new");
        assert_eq!(entry.password(Some("azure")), Some("new"));
        assert_eq!(entry.password(None), Some("master"));

        let mut fresh = PassEntry::default();
        fresh.replace(Some("azure"), "pw");
        assert_eq!(fresh.render(), "\nazure: pw\n");
    }
}
