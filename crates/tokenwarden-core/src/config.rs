//! Application configuration management.
//!
//! This module handles loading and saving the client configuration: where
//! the auth backend lives, how often to renew, and the last identifier used
//! to log in.
//!
//! Configuration is stored at `~/.config/tokenwarden/config.json`. A few
//! fields can be overridden from the environment (`TOKENWARDEN_*`).

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::auth::RenewalPolicy;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "tokenwarden";

/// Config file name
const CONFIG_FILE: &str = "config.json";

const ENV_BASE_URL: &str = "TOKENWARDEN_BASE_URL";
const ENV_REQUEST_TIMEOUT: &str = "TOKENWARDEN_REQUEST_TIMEOUT_SECS";
const ENV_RENEWAL_INTERVAL: &str = "TOKENWARDEN_RENEWAL_INTERVAL_SECS";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the auth backend; `/login`, `/refresh` and `/logout` hang off it
    pub base_url: String,
    /// HTTP request timeout in seconds.
    /// 30s allows for slow responses while failing fast enough for good UX.
    pub request_timeout_secs: u64,
    pub renewal_interval_secs: u64,
    pub renewal_margin_secs: u64,
    /// Lifetime assumed when the backend does not report one
    pub default_token_lifetime_secs: u64,
    pub last_identifier: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        let policy = RenewalPolicy::default();
        Self {
            base_url: "http://localhost:8000/api".to_string(),
            request_timeout_secs: 30,
            renewal_interval_secs: policy.interval.as_secs(),
            renewal_margin_secs: policy.margin.as_secs(),
            default_token_lifetime_secs: policy.default_token_lifetime.as_secs(),
            last_identifier: None,
        }
    }
}

impl Config {
    /// Load from the default location, then apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?)?;
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Apply `TOKENWARDEN_*` overrides from `lookup`
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_BASE_URL) {
            self.base_url = url;
        }
        if let Some(secs) = lookup(ENV_REQUEST_TIMEOUT) {
            self.request_timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", ENV_REQUEST_TIMEOUT))?;
        }
        if let Some(secs) = lookup(ENV_RENEWAL_INTERVAL) {
            self.renewal_interval_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("{} must be a number of seconds", ENV_RENEWAL_INTERVAL))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            anyhow::bail!("base_url must be an http(s) URL, got {:?}", self.base_url);
        }
        if self.request_timeout_secs == 0 {
            anyhow::bail!("request_timeout_secs must be greater than zero");
        }
        if self.renewal_interval_secs == 0 {
            anyhow::bail!("renewal_interval_secs must be greater than zero");
        }
        Ok(())
    }

    /// Base URL without a trailing slash
    pub fn api_base(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn renewal_policy(&self) -> RenewalPolicy {
        RenewalPolicy {
            interval: Duration::from_secs(self.renewal_interval_secs),
            margin: Duration::from_secs(self.renewal_margin_secs),
            default_token_lifetime: Duration::from_secs(self.default_token_lifetime_secs),
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for log files
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn temp_config_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("{}-test-{}-{}", APP_NAME, std::process::id(), name))
            .join(CONFIG_FILE)
    }

    #[test]
    fn test_defaults_match_renewal_policy() {
        let config = Config::default();
        assert_eq!(config.renewal_policy(), RenewalPolicy::default());
        assert_eq!(config.renewal_policy().delay_for(Duration::from_secs(900)), Duration::from_secs(840));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let path = temp_config_path("missing");
        assert_eq!(Config::load_from(&path).expect("load defaults"), Config::default());
    }

    #[test]
    fn test_save_and_load_partial_file() {
        let path = temp_config_path("roundtrip");
        let config = Config {
            last_identifier: Some("alice".to_string()),
            ..Config::default()
        };
        config.save_to(&path).expect("save config");
        assert_eq!(Config::load_from(&path).expect("load config"), config);

        // Fields missing from the file fall back to defaults
        std::fs::write(&path, r#"{"base_url":"https://auth.example.com/api/"}"#).expect("write");
        let loaded = Config::load_from(&path).expect("load partial config");
        assert_eq!(loaded.api_base(), "https://auth.example.com/api");
        assert_eq!(loaded.request_timeout_secs, 30);

        let _ = std::fs::remove_dir_all(path.parent().expect("parent dir"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = HashMap::from([
            (ENV_BASE_URL, "https://auth.example.com"),
            (ENV_RENEWAL_INTERVAL, " 300 "),
        ]);
        let mut config = Config::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .expect("apply overrides");
        assert_eq!(config.base_url, "https://auth.example.com");
        assert_eq!(config.renewal_interval_secs, 300);
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_bad_override_is_an_error() {
        let mut config = Config::default();
        let result = config.apply_overrides(|key| {
            (key == ENV_REQUEST_TIMEOUT).then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = Config {
            request_timeout_secs: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        // An override to zero is caught the same way
        let mut config = Config::default();
        config
            .apply_overrides(|key| (key == ENV_REQUEST_TIMEOUT).then(|| "0".to_string()))
            .expect("apply overrides");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = Config {
            base_url: "localhost:8000".to_string(),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
