//! Configuration management for the query node catalog
//!
//! Sources, lowest to highest precedence:
//! - Built-in defaults
//! - `/etc/qnode/qnode.*` and `./config/qnode.*`
//! - The file named by `QNODE_CONFIG`
//! - `QNODE__*` environment variables (e.g. `QNODE__CATALOG__SEGMENT_CAPACITY=4096`)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure for a query node
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct QueryNodeConfig {
    /// Node identifier assigned by the cluster, echoed in statistics snapshots
    #[serde(default)]
    pub node_id: u64,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl QueryNodeConfig {
    /// Load configuration from all sources, then validate it.
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder = Self::set_defaults(Config::builder())?;

        builder = builder
            .add_source(File::with_name("/etc/qnode/qnode").required(false))
            .add_source(File::with_name("./config/qnode").required(false));

        if let Ok(config_path) = std::env::var("QNODE_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix("QNODE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: QueryNodeConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        builder
            .set_default("node_id", 0)?
            .set_default("catalog.collection_capacity", 16)?
            .set_default("catalog.segment_capacity", 1024)?
            .set_default("logging.filter", "info")?
            .set_default("logging.ansi", true)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.catalog.collection_capacity == 0 {
            return Err(ConfigError::Message(
                "catalog.collection_capacity must be > 0".to_string(),
            ));
        }

        if self.catalog.segment_capacity == 0 {
            return Err(ConfigError::Message(
                "catalog.segment_capacity must be > 0".to_string(),
            ));
        }

        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Message(
                "logging.filter must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Load configuration from a specific file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config: QueryNodeConfig = Self::set_defaults(Config::builder())?
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;
        config.validate()?;

        Ok(config)
    }
}

/// Sizing hints for the in-memory catalog
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    /// Initial capacity of the collection map
    pub collection_capacity: usize,

    /// Initial capacity of the flat segment map
    pub segment_capacity: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            collection_capacity: 16,
            segment_capacity: 1024,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,

    /// Emit ANSI colour codes
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    #[test]
    fn test_default_configuration() {
        let config = QueryNodeConfig::default();

        assert_eq!(config.node_id, 0);
        assert_eq!(config.catalog.collection_capacity, 16);
        assert_eq!(config.catalog.segment_capacity, 1024);
        assert_eq!(config.logging.filter, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_source_keeps_defaults() {
        let toml = r#"
            node_id = 3

            [catalog]
            segment_capacity = 64
        "#;

        let config: QueryNodeConfig = QueryNodeConfig::set_defaults(Config::builder())
            .unwrap()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.node_id, 3);
        assert_eq!(config.catalog.segment_capacity, 64);
        assert_eq!(config.catalog.collection_capacity, 16);
        assert!(config.logging.ansi);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = QueryNodeConfig::default();

        config.catalog.segment_capacity = 0;
        assert!(config.validate().is_err());

        config.catalog.segment_capacity = 8;
        assert!(config.validate().is_ok());

        config.logging.filter = "  ".to_string();
        assert!(config.validate().is_err());
    }
}
