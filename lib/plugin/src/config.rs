//! Plugin service configuration.

use serde::Deserialize;
use std::time::Duration;

/// Where the plugin service lives and how long to wait for it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PluginConfig {
    /// Base URL of the plugin service, without a trailing slash.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Total request timeout, in seconds.
    /// Document-processing plugins can take minutes.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Connection timeout, in seconds.
    #[serde(default = "default_connect_timeout_seconds")]
    pub connect_timeout_seconds: u64,

    /// Plugin ids known to be installed before the first catalog refresh.
    #[serde(default)]
    pub plugins: Vec<String>,
}

fn default_base_url() -> String {
    "http://localhost:8001".to_string()
}

fn default_timeout_seconds() -> u64 {
    300
}

fn default_connect_timeout_seconds() -> u64 {
    10
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_seconds: default_timeout_seconds(),
            connect_timeout_seconds: default_connect_timeout_seconds(),
            plugins: Vec::new(),
        }
    }
}

impl PluginConfig {
    /// Creates a config pointing at `base_url` with default timeouts.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Total request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    /// Connection timeout.
    #[must_use]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_config_has_correct_defaults() {
        let config = PluginConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert!(config.plugins.is_empty());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: PluginConfig =
            serde_json::from_str(r#"{"base_url": "http://plugins:9000"}"#).expect("deserialize");
        assert_eq!(config.base_url, "http://plugins:9000");
        assert_eq!(config.timeout_seconds, 300);
    }
}
