//! Provider configuration
//!
//! Credentials are resolved field by field: the provider block first, then
//! `PUREPORT_*` environment variables, then the active profile of
//! `~/.pureport/credentials.json`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::client::PureportError;

pub const DEFAULT_ENDPOINT: &str = "https://api.pureport.com";
pub const DEFAULT_MAX_RETRIES: u32 = 25;

/// First retry delay; doubled on every further attempt
pub const DEFAULT_RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Delay between polls while waiting for a connection to be torn down
pub const DEFAULT_POLLING_INTERVAL: Duration = Duration::from_secs(5);

/// Upper bound on waiting for a connection to be torn down
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(20 * 60);

/// The `pureport` provider block as written in configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PureportConfig {
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub profile: Option<String>,
    pub token: Option<String>,
    pub max_retries: Option<u32>,
    pub endpoint: Option<String>,
}

/// One profile of the credentials file
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsProfile {
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_secret: Option<String>,
}

/// `~/.pureport/credentials.json`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CredentialsFile {
    #[serde(default)]
    pub current_profile: Option<String>,
    #[serde(default)]
    pub profiles: HashMap<String, CredentialsProfile>,
}

impl CredentialsFile {
    pub fn load(path: &Path) -> Result<Self, PureportError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PureportError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            PureportError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    /// The named profile, or the file's current profile
    pub fn profile(&self, name: Option<&str>) -> Option<&CredentialsProfile> {
        let name = name.or(self.current_profile.as_deref())?;
        self.profiles.get(name)
    }
}

/// How the session authenticates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    Token(String),
    ApiKey { key: String, secret: String },
}

/// Fully resolved provider settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: String,
    pub credentials: Credentials,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub polling_interval: Duration,
    pub delete_timeout: Duration,
}

impl PureportConfig {
    pub fn from_block(block: &serde_json::Value) -> Result<Self, PureportError> {
        serde_json::from_value(block.clone())
            .map_err(|e| PureportError::Config(format!("invalid pureport provider block: {}", e)))
    }

    pub fn resolve(self) -> Result<Settings, PureportError> {
        self.resolve_with(|key| std::env::var(key).ok())
    }

    /// Resolve using the given environment lookup
    pub fn resolve_with<F>(self, env: F) -> Result<Settings, PureportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |field: Option<String>, key: &str| -> Option<String> {
            field.or_else(|| env(key)).filter(|v| !v.is_empty())
        };

        let profile_name = lookup(self.profile, "PUREPORT_PROFILE");
        let profile = match credentials_path(&env) {
            Some(path) if path.exists() => {
                let file = CredentialsFile::load(&path)?;
                file.profile(profile_name.as_deref()).cloned()
            }
            _ => None,
        };
        if let (Some(name), None) = (&profile_name, &profile) {
            return Err(PureportError::Config(format!(
                "profile '{}' not found in credentials file",
                name
            )));
        }
        let profile = profile.unwrap_or_default();

        let endpoint = lookup(self.endpoint, "PUREPORT_ENDPOINT")
            .or(profile.api_url)
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let credentials = match lookup(self.token, "PUREPORT_TOKEN") {
            Some(token) => Credentials::Token(token),
            None => {
                let key = lookup(self.access_key, "PUREPORT_API_KEY").or(profile.api_key);
                let secret = lookup(self.secret_key, "PUREPORT_API_SECRET").or(profile.api_secret);
                match (key, secret) {
                    (Some(key), Some(secret)) => Credentials::ApiKey { key, secret },
                    _ => {
                        return Err(PureportError::Config(
                            "either token or access_key and secret_key must be set".to_string(),
                        ));
                    }
                }
            }
        };

        Ok(Settings {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials,
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            retry_base_delay: DEFAULT_RETRY_BASE_DELAY,
            polling_interval: DEFAULT_POLLING_INTERVAL,
            delete_timeout: DEFAULT_DELETE_TIMEOUT,
        })
    }
}

fn credentials_path<F>(env: &F) -> Option<PathBuf>
where
    F: Fn(&str) -> Option<String>,
{
    env("HOME").map(|home| PathBuf::from(home).join(".pureport").join("credentials.json"))
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn home_with_credentials(content: serde_json::Value) -> TempDir {
        let home = TempDir::new().unwrap();
        let dir = home.path().join(".pureport");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("credentials.json"), content.to_string()).unwrap();
        home
    }

    #[test]
    fn explicit_fields_win_over_env() {
        let config = PureportConfig {
            access_key: Some("key".to_string()),
            secret_key: Some("secret".to_string()),
            ..Default::default()
        };
        let settings = config
            .resolve_with(env_of(&[
                ("PUREPORT_API_KEY", "env-key"),
                ("PUREPORT_API_SECRET", "env-secret"),
            ]))
            .unwrap();
        assert_eq!(
            settings.credentials,
            Credentials::ApiKey {
                key: "key".to_string(),
                secret: "secret".to_string()
            }
        );
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.max_retries, 25);
    }

    #[test]
    fn token_takes_precedence_over_keys() {
        let settings = PureportConfig::default()
            .resolve_with(env_of(&[
                ("PUREPORT_TOKEN", "bearer"),
                ("PUREPORT_API_KEY", "k"),
                ("PUREPORT_API_SECRET", "s"),
            ]))
            .unwrap();
        assert_eq!(settings.credentials, Credentials::Token("bearer".to_string()));
    }

    #[test]
    fn falls_back_to_current_profile() {
        let home = home_with_credentials(json!({
            "current_profile": "dev",
            "profiles": {
                "dev": {"api_url": "https://dev.example.com/", "api_key": "dk", "api_secret": "ds"},
                "prod": {"api_key": "pk", "api_secret": "ps"}
            }
        }));
        let home_path = home.path().to_string_lossy().to_string();

        let settings = PureportConfig::default()
            .resolve_with(env_of(&[("HOME", home_path.as_str())]))
            .unwrap();
        assert_eq!(settings.endpoint, "https://dev.example.com");
        assert_eq!(
            settings.credentials,
            Credentials::ApiKey {
                key: "dk".to_string(),
                secret: "ds".to_string()
            }
        );

        let settings = PureportConfig {
            profile: Some("prod".to_string()),
            ..Default::default()
        }
        .resolve_with(env_of(&[("HOME", home_path.as_str())]))
        .unwrap();
        assert_eq!(settings.endpoint, DEFAULT_ENDPOINT);
        assert!(matches!(settings.credentials, Credentials::ApiKey { ref key, .. } if key == "pk"));
    }

    #[test]
    fn unknown_profile_is_an_error() {
        let home = home_with_credentials(json!({"profiles": {}}));
        let home_path = home.path().to_string_lossy().to_string();
        let err = PureportConfig::default()
            .resolve_with(env_of(&[("HOME", home_path.as_str()), ("PUREPORT_PROFILE", "missing")]))
            .unwrap_err();
        assert!(err.to_string().contains("profile 'missing'"));
    }

    #[test]
    fn missing_credentials_is_an_error() {
        let err = PureportConfig::default()
            .resolve_with(env_of(&[]))
            .unwrap_err();
        assert!(matches!(err, PureportError::Config(_)));
    }

    #[test]
    fn provider_block_rejects_unknown_fields() {
        assert!(PureportConfig::from_block(&json!({"token": "t", "max_retries": 3})).is_ok());
        assert!(PureportConfig::from_block(&json!({"region": "us"})).is_err());
    }
}
