//! Store configuration
//!
//! Loaded from a JSON file or built in code. Immutable after the store
//! starts.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{StoreError, StoreResult};
use crate::observability::{log_event_with_fields, Event, Logger, Severity};

/// Store configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Connection URL handed to the connector (default: "memory://default")
    #[serde(default = "default_url")]
    pub url: String,

    /// Database name inside the storage engine (default: "app")
    #[serde(default = "default_database")]
    pub database: String,

    /// Minimum log severity: trace, info, warn, error (default: "warn")
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_url() -> String {
    "memory://default".to_string()
}

fn default_database() -> String {
    "app".to_string()
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            database: default_database(),
            log_level: default_log_level(),
        }
    }
}

impl StoreConfig {
    /// Create a config for the given URL and database
    pub fn new(url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            database: database.into(),
            ..Default::default()
        }
    }

    /// Load configuration from file
    pub fn load(path: &Path) -> StoreResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("Failed to read config: {}", e)))?;

        let config: StoreConfig = serde_json::from_str(&content)
            .map_err(|e| StoreError::Config(format!("Invalid config JSON: {}", e)))?;

        config.validate()?;

        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("database", config.database.as_str()),
                ("url", config.url.as_str()),
            ],
        );

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> StoreResult<()> {
        if self.url.trim().is_empty() {
            return Err(StoreError::Config("url must not be empty".into()));
        }

        if self.database.trim().is_empty() {
            return Err(StoreError::Config("database must not be empty".into()));
        }

        self.severity()?;

        Ok(())
    }

    /// Parsed log level
    pub fn severity(&self) -> StoreResult<Severity> {
        self.log_level.parse().map_err(StoreError::Config)
    }

    /// Apply the configured log level to the global logger
    pub fn apply_logging(&self) -> StoreResult<()> {
        Logger::set_min_severity(self.severity()?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_applied() {
        let file = write_config("{}");
        let config = StoreConfig::load(file.path()).unwrap();

        assert_eq!(config, StoreConfig::default());
        assert_eq!(config.url, "memory://default");
        assert_eq!(config.database, "app");
    }

    #[test]
    fn test_load_explicit_values() {
        let file = write_config(
            r#"{"url": "memory://orders", "database": "shop", "log_level": "trace"}"#,
        );
        let config = StoreConfig::load(file.path()).unwrap();

        assert_eq!(config.url, "memory://orders");
        assert_eq!(config.database, "shop");
        assert_eq!(config.severity().unwrap(), Severity::Trace);
    }

    #[test]
    fn test_invalid_json_rejected() {
        let file = write_config("{not json");
        let err = StoreConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn test_missing_file_rejected() {
        let err = StoreConfig::load(Path::new("/nonexistent/docquery.json")).unwrap_err();
        assert_eq!(err.code(), "DOCQ_CONFIG_INVALID");
    }

    #[test]
    fn test_validation() {
        assert!(StoreConfig::new("", "app").validate().is_err());
        assert!(StoreConfig::new("memory://x", " ").validate().is_err());

        let mut config = StoreConfig::new("memory://x", "app");
        config.log_level = "loud".into();
        assert!(config.validate().is_err());
    }
}
