//! Runtime configuration.
//!
//! Read from an optional JSON file with camelCase keys; every field has a
//! default, so `{}` is a valid file. Command-line flags are applied on top by
//! the binary.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::constants::*;
use crate::controller::ControllerConfig;
use crate::preload::FetchLimits;
use crate::reference::ImageReference;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    /// Period of the default-source poll.
    pub refresh_interval_ms: u64,
    /// Length of the reveal, from effect start to role swap.
    pub reveal_duration_ms: u64,
    /// Polled every refresh interval. `null` disables polling.
    pub default_source: Option<String>,
    /// Append a fresh `random=` query parameter to every poll.
    pub cache_bust: bool,
    /// Address of the push listener. `null` disables it.
    pub push_listen: Option<String>,
    pub fetch_timeout_ms: u64,
    pub max_image_bytes: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            refresh_interval_ms: REFRESH_INTERVAL_MS,
            reveal_duration_ms: REVEAL_DURATION_MS,
            default_source: Some(DEFAULT_SOURCE.to_string()),
            cache_bust: true,
            push_listen: Some(DEFAULT_PUSH_LISTEN.to_string()),
            fetch_timeout_ms: FETCH_TIMEOUT_MS,
            max_image_bytes: MAX_IMAGE_BYTES,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_ms == 0 {
            return Err(ConfigError::Invalid("refreshIntervalMs must be positive".into()));
        }
        if self.reveal_duration_ms == 0 {
            return Err(ConfigError::Invalid("revealDurationMs must be positive".into()));
        }
        if self.fetch_timeout_ms == 0 {
            return Err(ConfigError::Invalid("fetchTimeoutMs must be positive".into()));
        }
        if self.max_image_bytes == 0 {
            return Err(ConfigError::Invalid("maxImageBytes must be positive".into()));
        }
        self.default_reference()?;
        self.push_addr()?;
        Ok(())
    }

    pub fn controller_config(&self) -> Result<ControllerConfig, ConfigError> {
        Ok(ControllerConfig {
            refresh_interval: Duration::from_millis(self.refresh_interval_ms),
            reveal_duration: Duration::from_millis(self.reveal_duration_ms),
            default_source: self.default_reference()?,
            cache_bust: self.cache_bust,
        })
    }

    pub fn fetch_limits(&self) -> FetchLimits {
        FetchLimits {
            timeout: Duration::from_millis(self.fetch_timeout_ms),
            max_bytes: self.max_image_bytes,
        }
    }

    pub fn push_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        self.push_listen
            .as_deref()
            .map(|addr| {
                addr.parse()
                    .map_err(|e| ConfigError::Invalid(format!("pushListen {addr:?}: {e}")))
            })
            .transpose()
    }

    fn default_reference(&self) -> Result<Option<ImageReference>, ConfigError> {
        self.default_source
            .as_deref()
            .map(|raw| {
                ImageReference::parse(raw)
                    .map_err(|e| ConfigError::Invalid(format!("defaultSource: {e}")))
            })
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_means_defaults() {
        assert_eq!(Config::from_json("{}").unwrap(), Config::default());
    }

    #[test]
    fn camel_case_keys() {
        let config = Config::from_json(
            r#"{"refreshIntervalMs": 500, "revealDurationMs": 250, "defaultSource": "img://x", "cacheBust": false}"#,
        )
        .unwrap();
        let controller = config.controller_config().unwrap();
        assert_eq!(controller.refresh_interval, Duration::from_millis(500));
        assert_eq!(controller.reveal_duration, Duration::from_millis(250));
        assert_eq!(controller.default_source.unwrap().as_str(), "img://x");
        assert!(!controller.cache_bust);
    }

    #[test]
    fn null_disables_sources() {
        let config = Config::from_json(r#"{"defaultSource": null, "pushListen": null}"#).unwrap();
        assert!(config.controller_config().unwrap().default_source.is_none());
        assert!(config.push_addr().unwrap().is_none());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_json(r#"{"revealDurationMs": 0}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"pushListen": "not an address"}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            Config::from_json(r#"{"defaultSource": "  "}"#),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(Config::from_json("[1, 2"), Err(ConfigError::Parse(_))));
    }
}
