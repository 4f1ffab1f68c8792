//! Store configuration
//!
//! Loaded from a JSON file or built from defaults. Every field is optional
//! in the file; missing fields take the defaults below.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event};

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Cannot read config '{path}': {reason}")]
    Unreadable { path: String, reason: String },

    /// The file is not valid JSON for this shape
    #[error("Invalid config: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::Unreadable { .. } => "ESGEO_CONFIG_UNREADABLE",
            ConfigError::Invalid(_) => "ESGEO_CONFIG_INVALID",
        }
    }
}

/// Per data-store settings shared by every layer it serves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Index (or index pattern) searched
    #[serde(default = "default_index_name")]
    pub index_name: String,

    /// Hits fetched per scroll round trip when streaming
    #[serde(default = "default_scroll_size")]
    pub scroll_size: usize,

    /// Backend keep-alive for scroll cursors, also the pager idle timeout
    #[serde(default = "default_scroll_time_secs")]
    pub scroll_time_secs: u64,

    /// Stream large result sets through a scroll instead of one search
    #[serde(default)]
    pub scroll_enabled: bool,

    /// Hit cap applied when a query is unbounded
    #[serde(default = "default_max_features")]
    pub default_max_features: usize,

    /// Cell budget for geohash grid aggregations
    #[serde(default = "default_grid_size")]
    pub grid_size: u64,

    /// Request only used attributes via `_source` / `stored_fields`
    #[serde(default)]
    pub source_filtering: bool,
}

fn default_index_name() -> String {
    "features".to_string()
}
fn default_scroll_size() -> usize {
    100
}
fn default_scroll_time_secs() -> u64 {
    120
}
fn default_max_features() -> usize {
    10_000
}
fn default_grid_size() -> u64 {
    10_000
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            index_name: default_index_name(),
            scroll_size: default_scroll_size(),
            scroll_time_secs: default_scroll_time_secs(),
            scroll_enabled: false,
            default_max_features: default_max_features(),
            grid_size: default_grid_size(),
            source_filtering: false,
        }
    }
}

impl StoreConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| ConfigError::Unreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let config = Self::from_json(&text)?;
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("path", path.display().to_string().as_str()),
                ("index", config.index_name.as_str()),
            ],
        );
        Ok(config)
    }

    /// Parse and validate config text
    pub fn from_json(text: &str) -> ConfigResult<Self> {
        let config: StoreConfig =
            serde_json::from_str(text).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make scrolling or aggregation meaningless
    pub fn validate(&self) -> ConfigResult<()> {
        if self.index_name.trim().is_empty() {
            return Err(ConfigError::Invalid("index_name must not be empty".into()));
        }
        if self.scroll_size == 0 {
            return Err(ConfigError::Invalid("scroll_size must be positive".into()));
        }
        if self.scroll_time_secs == 0 {
            return Err(ConfigError::Invalid("scroll_time_secs must be positive".into()));
        }
        if self.default_max_features == 0 {
            return Err(ConfigError::Invalid("default_max_features must be positive".into()));
        }
        if self.grid_size == 0 {
            return Err(ConfigError::Invalid("grid_size must be positive".into()));
        }
        Ok(())
    }

    /// Scroll keep-alive as a duration
    pub fn scroll_time(&self) -> Duration {
        Duration::from_secs(self.scroll_time_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.scroll_size, 100);
        assert_eq!(config.scroll_time(), Duration::from_secs(120));
        assert!(!config.scroll_enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = StoreConfig::from_json(r#"{"index_name": "roads", "scroll_size": 500}"#)
            .unwrap();
        assert_eq!(config.index_name, "roads");
        assert_eq!(config.scroll_size, 500);
        assert_eq!(config.grid_size, 10_000);
    }

    #[test]
    fn test_rejects_zero_sizes() {
        let err = StoreConfig::from_json(r#"{"scroll_size": 0}"#).unwrap_err();
        assert_eq!(err.code(), "ESGEO_CONFIG_INVALID");

        assert!(StoreConfig::from_json(r#"{"grid_size": 0}"#).is_err());
        assert!(StoreConfig::from_json(r#"{"index_name": " "}"#).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"scroll_enabled": true, "scroll_time_secs": 30}}"#).unwrap();

        let config = StoreConfig::load(file.path()).unwrap();
        assert!(config.scroll_enabled);
        assert_eq!(config.scroll_time_secs, 30);
    }

    #[test]
    fn test_load_missing_file() {
        let err = StoreConfig::load(Path::new("/nonexistent/esgeo.json")).unwrap_err();
        assert_eq!(err.code(), "ESGEO_CONFIG_UNREADABLE");
    }
}
