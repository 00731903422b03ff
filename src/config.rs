// Credential loading: the Feishu app id/secret come from the goclaw config
// file first and from environment variables second. Nothing here ever
// writes to either source.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const APP_ID_ENV: &str = "FEISHU_APP_ID";
pub const APP_SECRET_ENV: &str = "FEISHU_APP_SECRET";

/// Printed next to a config error so the user knows where to put the keys.
pub const REMEDIATION: &str = r#"Configure in ~/.goclaw/config.json under channels.feishu:
  {
    "channels": {
      "feishu": {
        "app_id": "your_app_id",
        "app_secret": "your_app_secret"
      }
    }
  }
or export FEISHU_APP_ID and FEISHU_APP_SECRET."#;

/// Application identity used to obtain an `app_access_token`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub app_id: String,
    pub app_secret: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("app_secret", &"<redacted>")
            .finish()
    }
}

// Only the part of the goclaw config we care about. Everything else in the
// file is ignored.
#[derive(Deserialize, Default)]
struct ConfigFile {
    #[serde(default)]
    channels: Channels,
}

#[derive(Deserialize, Default)]
struct Channels {
    #[serde(default)]
    feishu: FeishuSection,
}

#[derive(Deserialize, Default)]
struct FeishuSection {
    app_id: Option<String>,
    app_secret: Option<String>,
}

/// Layered credential lookup: config file, then environment.
#[derive(Debug, Clone)]
pub struct CredentialSource {
    config_path: Option<PathBuf>,
}

impl CredentialSource {
    /// Use the per-user default `~/.goclaw/config.json`.
    pub fn new() -> Self {
        CredentialSource {
            config_path: default_config_path(),
        }
    }

    /// Use an explicit config file instead of the per-user default.
    pub fn with_config_path(path: impl Into<PathBuf>) -> Self {
        CredentialSource {
            config_path: Some(path.into()),
        }
    }

    /// Load credentials using the process environment as the second layer.
    pub fn load(&self) -> Result<Credentials> {
        self.load_with(|key| std::env::var(key).ok())
    }

    /// Same as `load` but with an injectable environment lookup.
    pub fn load_with<F>(&self, env: F) -> Result<Credentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = &self.config_path {
            if let Some(creds) = read_config_file(path)? {
                debug!(path = %path.display(), "loaded credentials from config file");
                return Ok(creds);
            }
        }

        match (non_empty(env(APP_ID_ENV)), non_empty(env(APP_SECRET_ENV))) {
            (Some(app_id), Some(app_secret)) => {
                debug!("loaded credentials from environment");
                Ok(Credentials { app_id, app_secret })
            }
            _ => Err(Error::Config(format!(
                "no channels.feishu entry in the config file and {} / {} are not set",
                APP_ID_ENV, APP_SECRET_ENV
            ))),
        }
    }
}

impl Default for CredentialSource {
    fn default() -> Self {
        Self::new()
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".goclaw").join("config.json"))
}

/// Returns `Ok(None)` when the file is absent or lacks a complete pair so the
/// caller can fall through to the environment. A file that exists but is not
/// valid JSON is a config error.
fn read_config_file(path: &Path) -> Result<Option<Credentials>> {
    if !path.exists() {
        debug!(path = %path.display(), "config file not present");
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
    let parsed: ConfigFile = serde_json::from_str(&raw)
        .map_err(|e| Error::Config(format!("invalid JSON in {}: {}", path.display(), e)))?;

    let section = parsed.channels.feishu;
    match (non_empty(section.app_id), non_empty(section.app_secret)) {
        (Some(app_id), Some(app_secret)) => Ok(Some(Credentials { app_id, app_secret })),
        _ => Ok(None),
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn config_file_wins_over_environment() {
        let file = config_file(
            r#"{"channels":{"feishu":{"app_id":"cli_file","app_secret":"file_secret"}},"agents":{}}"#,
        );
        let source = CredentialSource::with_config_path(file.path());
        let creds = source
            .load_with(env_from(&[(APP_ID_ENV, "cli_env"), (APP_SECRET_ENV, "env_secret")]))
            .unwrap();
        assert_eq!(creds.app_id, "cli_file");
        assert_eq!(creds.app_secret, "file_secret");
    }

    #[test]
    fn incomplete_file_falls_back_to_environment() {
        let file = config_file(r#"{"channels":{"feishu":{"app_id":"cli_file","app_secret":""}}}"#);
        let source = CredentialSource::with_config_path(file.path());
        let creds = source
            .load_with(env_from(&[(APP_ID_ENV, "cli_env"), (APP_SECRET_ENV, "env_secret")]))
            .unwrap();
        assert_eq!(creds.app_id, "cli_env");
    }

    #[test]
    fn missing_file_uses_environment() {
        let dir = tempfile::tempdir().unwrap();
        let source = CredentialSource::with_config_path(dir.path().join("config.json"));
        let creds = source
            .load_with(env_from(&[(APP_ID_ENV, "cli_env"), (APP_SECRET_ENV, "env_secret")]))
            .unwrap();
        assert_eq!(creds.app_secret, "env_secret");
    }

    #[test]
    fn nothing_configured_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = CredentialSource::with_config_path(dir.path().join("config.json"));
        let err = source.load_with(env_from(&[(APP_ID_ENV, "only_id")])).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn malformed_config_file_is_a_config_error() {
        let file = config_file("{ not json");
        let source = CredentialSource::with_config_path(file.path());
        let err = source
            .load_with(env_from(&[(APP_ID_ENV, "cli_env"), (APP_SECRET_ENV, "env_secret")]))
            .unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let creds = Credentials {
            app_id: "cli_a".into(),
            app_secret: "super-secret".into(),
        };
        let printed = format!("{:?}", creds);
        assert!(printed.contains("cli_a"));
        assert!(!printed.contains("super-secret"));
    }
}
