//! Adapter configuration.
//!
//! Loaded once from TOML and validated before the adapter is built. Keys use
//! snake_case; the kebab-case spellings (`bot-number`, `whitelisted-numbers`,
//! `poll-interval`) are accepted as aliases.
//!
//! ```toml
//! url = "http://localhost:8080"
//! bot_number = "+15550000000"
//! poll_interval_secs = 10
//! allowed_senders = ["alice", "+15550000002"]
//!
//! [rooms]
//! alice = "+15550000001"
//! family = "group.ZmFtaWx5"
//! ```

use crate::error::{ConfigError, ConfigResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Default delay between two receive requests in polling mode.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

fn default_poll_interval() -> u64 {
    DEFAULT_POLL_INTERVAL_SECS
}

/// Immutable configuration of one Signal bridge adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Base URL of the bridge REST API (e.g. `http://localhost:8080`).
    pub url: String,
    /// Account number the bridge is registered with.
    #[serde(alias = "bot-number")]
    pub bot_number: String,
    /// Room alias -> backend address (phone number or `group.` id).
    #[serde(default)]
    pub rooms: BTreeMap<String, String>,
    /// Senders allowed to reach the router, as aliases or raw addresses.
    /// Empty means everyone is allowed.
    #[serde(default, alias = "whitelisted-numbers")]
    pub allowed_senders: Vec<String>,
    /// Seconds to wait between receive requests in polling mode.
    #[serde(default = "default_poll_interval", alias = "poll-interval")]
    pub poll_interval_secs: u64,
}

impl AdapterConfig {
    /// Minimal config with no rooms, no allow-list and the default poll interval.
    pub fn new(url: impl Into<String>, bot_number: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            bot_number: bot_number.into(),
            rooms: BTreeMap::new(),
            allowed_senders: Vec::new(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        let config: AdapterConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Check required keys and value ranges.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::Missing("url"));
        }
        let parsed = url::Url::parse(&self.url).map_err(|e| ConfigError::Invalid {
            key: "url",
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid {
                key: "url",
                reason: format!("unsupported scheme '{}'", parsed.scheme()),
            });
        }
        if self.bot_number.trim().is_empty() {
            return Err(ConfigError::Missing("bot_number"));
        }
        if self.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "poll_interval_secs",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Polling interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_minimal_config_defaults() {
        let config = AdapterConfig::from_toml_str(
            r#"
            url = "http://localhost:8080"
            bot_number = "+15550000000"
            "#,
        )
        .unwrap();
        assert!(config.rooms.is_empty());
        assert!(config.allowed_senders.is_empty());
        assert_eq!(config.poll_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_kebab_case_aliases() {
        let config = AdapterConfig::from_toml_str(
            r#"
            url = "http://localhost:8080"
            bot-number = "+15550000000"
            whitelisted-numbers = ["alice"]
            poll-interval = 3

            [rooms]
            alice = "+15550000001"
            "#,
        )
        .unwrap();
        assert_eq!(config.bot_number, "+15550000000");
        assert_eq!(config.allowed_senders, vec!["alice".to_string()]);
        assert_eq!(config.poll_interval_secs, 3);
        assert_eq!(config.rooms["alice"], "+15550000001");
    }

    #[test]
    fn test_missing_bot_number_fails() {
        let err = AdapterConfig::from_toml_str(r#"url = "http://localhost:8080""#).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));

        let err = AdapterConfig::new("http://localhost:8080", "").validate().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("bot_number")));
    }

    #[test]
    fn test_invalid_url_rejected() {
        let err = AdapterConfig::new("not a url", "+1").validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "url", .. }));

        let err = AdapterConfig::new("ftp://host", "+1").validate().unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "url", .. }));
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let mut config = AdapterConfig::new("http://localhost:8080", "+1");
        config.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "url = \"https://bridge.example\"\nbot_number = \"+15550000000\""
        )
        .unwrap();
        let config = AdapterConfig::load(file.path()).unwrap();
        assert_eq!(config.url, "https://bridge.example");
    }

    #[test]
    fn test_load_missing_file() {
        let err = AdapterConfig::load(Path::new("/nonexistent/sigrelay.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
