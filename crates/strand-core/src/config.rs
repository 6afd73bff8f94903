//! Runtime configuration
//!
//! An [`AppConfig`] sizes the entity pools and paces the continuous run loop.
//! It can be written by hand or loaded from a TOML file:
//!
//! ```toml
//! num_entities = 512
//! frame_time_micros = 16667
//! max_run_time_ms = 5000
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Errors that can occur while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Settings for an app and its run loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Maximum number of live entities; also the capacity of the entity id pool
    pub num_entities: usize,
    /// Target time between frames in continuous run mode (microseconds)
    pub frame_time_micros: u64,
    /// Stop the run loop after this much simulated time (milliseconds)
    pub max_run_time_ms: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            num_entities: 1024,
            frame_time_micros: 16_667,
            max_run_time_ms: None,
        }
    }
}

impl AppConfig {
    /// Target time between frames
    pub fn frame_time(&self) -> Duration {
        Duration::from_micros(self.frame_time_micros)
    }

    /// Run budget, if any
    pub fn max_run_time(&self) -> Option<Duration> {
        self.max_run_time_ms.map(Duration::from_millis)
    }

    /// Parse a config from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_keys() {
        let config = AppConfig::from_toml_str("num_entities = 5").unwrap();
        assert_eq!(config.num_entities, 5);
        assert_eq!(config.frame_time(), Duration::from_micros(16_667));
        assert_eq!(config.max_run_time(), None);
    }

    #[test]
    fn test_run_budget() {
        let config = AppConfig::from_toml_str("max_run_time_ms = 250\nframe_time_micros = 1000")
            .unwrap();
        assert_eq!(config.max_run_time(), Some(Duration::from_millis(250)));
        assert_eq!(config.frame_time(), Duration::from_millis(1));
    }

    #[test]
    fn test_parse_error() {
        assert!(matches!(
            AppConfig::from_toml_str("num_entities = \"many\""),
            Err(ConfigError::Parse(_))
        ));
    }
}
