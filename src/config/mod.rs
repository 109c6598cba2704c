//! Configuration loading and management

use crate::core::{ConfigError, DateEncoding, Normalizer};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Connection settings for the MongoDB backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MongoConfig {
    /// Connection string (e.g., "mongodb://localhost:27017")
    pub uri: String,

    /// Database holding the collections
    pub database: String,
}

/// Complete configuration for the invoice store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// How dates are written to the store
    pub date_encoding: DateEncoding,

    /// Broadcast buffer of the in-memory store's event bus
    pub event_capacity: usize,

    /// Tracing filter used when `RUST_LOG` is not set
    pub log_filter: String,

    /// Optional MongoDB connection settings
    pub mongodb: Option<MongoConfig>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            date_encoding: DateEncoding::default(),
            event_capacity: 1024,
            log_filter: "info".to_string(),
            mongodb: None,
        }
    }
}

impl StoreConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_capacity".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if let Some(mongodb) = &self.mongodb
            && mongodb.database.is_empty()
        {
            return Err(ConfigError::Invalid {
                field: "mongodb.database".to_string(),
                message: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Normalizer matching the configured date encoding
    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(self.date_encoding)
    }
}
