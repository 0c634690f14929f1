//! Configuration management for limiters.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use crate::error::{LimiterError, Result};

/// Configuration for a single limiter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Logical name of the limited resource
    pub key: String,

    /// Maximum events allowed within one period
    pub limit: u64,

    /// Window size in seconds
    pub period_secs: u64,

    /// Name of the sorted set in the store (defaults to `<key>-ratelimit:rk`)
    #[serde(default)]
    pub remote_key: Option<String>,

    /// Emit diagnostic traces for rejections and remote errors
    #[serde(default)]
    pub debug: bool,

    /// Start in strict burst mode
    #[serde(default)]
    pub stop_burst: bool,
}

impl LimiterConfig {
    /// Create a configuration with default options.
    pub fn new(key: impl Into<String>, limit: u64, period_secs: u64) -> Self {
        Self {
            key: key.into(),
            limit,
            period_secs,
            remote_key: None,
            debug: false,
            stop_burst: false,
        }
    }

    /// Use an explicit sorted-set name in the store.
    pub fn with_remote_key(mut self, remote_key: impl Into<String>) -> Self {
        self.remote_key = Some(remote_key.into());
        self
    }

    /// Enable or disable diagnostic traces.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Start in strict burst mode.
    pub fn with_stop_burst(mut self, stop_burst: bool) -> Self {
        self.stop_burst = stop_burst;
        self
    }

    /// The sorted-set name this limiter uses in the store.
    pub fn resolved_remote_key(&self) -> String {
        match self.remote_key.as_deref() {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}-ratelimit:rk", self.key),
        }
    }
}

/// Remote store configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Redis connection URL; password and database index go in the URL
    #[serde(default = "default_store_url")]
    pub url: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
        }
    }
}

fn default_store_url() -> String {
    "redis://127.0.0.1:6379/0".to_string()
}

/// A file describing a store and a set of limiters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Store connection settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Limiters to build over the store
    #[serde(default)]
    pub limiters: Vec<LimiterConfig>,
}

impl LimitsConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading limiter configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| LimiterError::Config(format!("Failed to parse limiter config: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_remote_key() {
        let config = LimiterConfig::new("api", 10, 2);
        assert_eq!(config.resolved_remote_key(), "api-ratelimit:rk");

        let config = config.with_remote_key("custom:zset");
        assert_eq!(config.resolved_remote_key(), "custom:zset");
    }

    #[test]
    fn test_empty_remote_key_falls_back() {
        let config = LimiterConfig::new("api", 10, 2).with_remote_key("");
        assert_eq!(config.resolved_remote_key(), "api-ratelimit:rk");
    }

    #[test]
    fn test_parse_limits_yaml() {
        let yaml = r#"
store:
  url: redis://cache:6380/2
limiters:
  - key: login
    limit: 5
    period_secs: 60
    stop_burst: true
  - key: search
    limit: 100
    period_secs: 10
    remote_key: search:window
    debug: true
"#;
        let config = LimitsConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.store.url, "redis://cache:6380/2");
        assert_eq!(config.limiters.len(), 2);
        assert!(config.limiters[0].stop_burst);
        assert!(!config.limiters[0].debug);
        assert_eq!(config.limiters[1].resolved_remote_key(), "search:window");
        assert!(config.limiters[1].debug);
    }

    #[test]
    fn test_store_defaults() {
        let config = LimitsConfig::from_yaml("limiters: []").unwrap();
        assert_eq!(config.store.url, "redis://127.0.0.1:6379/0");
        assert!(config.limiters.is_empty());
    }

    #[test]
    fn test_invalid_yaml() {
        let err = LimitsConfig::from_yaml("limiters: [ {key: 1").unwrap_err();
        assert!(matches!(err, LimiterError::Config(_)));
    }
}
