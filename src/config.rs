//! Session configuration
//!
//! Loaded from a JSON file with camelCase keys:
//!
//! ```json
//! {
//!   "resourceLocation": "data/movies.json",
//!   "timeout": 5000,
//!   "workerLocation": "task",
//!   "logLevel": "warn",
//!   "dateFields": ["release_date"],
//!   "listFields": ["genres"]
//! }
//! ```

use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::Severity;

pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where the worker context runs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerLocation {
    /// A task on the caller's tokio runtime
    #[default]
    Task,
    /// A dedicated OS thread with its own runtime
    Thread,
}

impl WorkerLocation {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerLocation::Task => "task",
            WorkerLocation::Thread => "thread",
        }
    }
}

impl fmt::Display for WorkerLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CollectionConfig {
    /// Resource locator handed to the loader (required)
    pub resource_location: String,

    /// Milliseconds before a pending request is rejected
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Milliseconds allowed for the initial load; `timeout` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_timeout: Option<u64>,

    #[serde(default)]
    pub worker_location: WorkerLocation,

    #[serde(default = "default_log_level")]
    pub log_level: Severity,

    /// Attributes parsed into dates on load
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub date_fields: Vec<String>,

    /// Attributes decoded from an encoded list string on load
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub list_fields: Vec<String>,
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_log_level() -> Severity {
    Severity::Warn
}

impl CollectionConfig {
    /// Config with defaults for everything but the resource
    pub fn new(resource_location: impl Into<String>) -> Self {
        Self {
            resource_location: resource_location.into(),
            timeout: DEFAULT_TIMEOUT_MS,
            load_timeout: None,
            worker_location: WorkerLocation::default(),
            log_level: default_log_level(),
            date_fields: Vec::new(),
            list_fields: Vec::new(),
        }
    }

    /// Reads and validates a config file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: CollectionConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.resource_location.trim().is_empty() {
            return Err(ConfigError::Invalid("resourceLocation must not be empty".into()));
        }
        if self.timeout == 0 {
            return Err(ConfigError::Invalid("timeout must be > 0".into()));
        }
        if self.load_timeout == Some(0) {
            return Err(ConfigError::Invalid("loadTimeout must be > 0".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout.unwrap_or(self.timeout))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout.as_millis() as u64;
        self
    }

    pub fn with_worker_location(mut self, location: WorkerLocation) -> Self {
        self.worker_location = location;
        self
    }

    pub fn with_date_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.date_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_list_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.list_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = CollectionConfig::from_json(r#"{"resourceLocation": "movies.json"}"#).unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(5000));
        assert_eq!(config.load_timeout(), config.timeout());
        assert_eq!(config.worker_location, WorkerLocation::Task);
        assert_eq!(config.log_level, Severity::Warn);
    }

    #[test]
    fn test_all_keys() {
        let config = CollectionConfig::from_json(
            r#"{
                "resourceLocation": "movies.json",
                "timeout": 250,
                "loadTimeout": 10000,
                "workerLocation": "thread",
                "logLevel": "trace",
                "dateFields": ["release_date"],
                "listFields": ["genres"]
            }"#,
        )
        .unwrap();
        assert_eq!(config.timeout(), Duration::from_millis(250));
        assert_eq!(config.load_timeout(), Duration::from_secs(10));
        assert_eq!(config.worker_location, WorkerLocation::Thread);
        assert_eq!(config.log_level, Severity::Trace);
        assert_eq!(config.list_fields, vec!["genres"]);
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = CollectionConfig::from_json(r#"{"resourceLocation": "m.json", "timeout": 0}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = CollectionConfig::from_json(r#"{"resourceLocation": "m.json", "timout": 5}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_missing_resource_rejected() {
        assert!(CollectionConfig::from_json("{}").is_err());
        assert!(CollectionConfig::from_json(r#"{"resourceLocation": " "}"#).is_err());
    }

    #[test]
    fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, r#"{{"resourceLocation": "movies.json", "timeout": 100}}"#).unwrap();
        let config = CollectionConfig::load(file.path()).unwrap();
        assert_eq!(config.timeout, 100);

        let err = CollectionConfig::load(Path::new("/nonexistent/aeroquery.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
