//! Configuration for the core crate
//!
//! This module provides configuration options for the core crate:
//! grouping limits, catalog history retention and logging.

use std::path::Path;

use serde::{Serialize, Deserialize};

use crate::error::{AisError, Result};

/// Grouping limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupingConfig {
    /// Maximum number of levels in a group, the root counting as one
    pub max_group_depth: usize,

    /// Whether a group index may take all its columns from one table
    pub allow_single_table_group_index: bool,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        GroupingConfig {
            max_group_depth: 16,
            allow_single_table_group_index: true,
        }
    }
}

/// Catalog manager configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Number of superseded generations kept for readers
    pub retained_generations: usize,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            retained_generations: 4,
        }
    }
}

/// Core configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoreConfig {
    /// Grouping limits
    pub grouping: GroupingConfig,

    /// Catalog manager configuration
    pub catalog: CatalogConfig,

    /// Log filter, in `env_logger` syntax
    pub log_level: String,

    /// Whether to enable debug mode
    pub debug_mode: bool,
}

impl Default for CoreConfig {
    fn default() -> Self {
        CoreConfig {
            grouping: GroupingConfig::default(),
            catalog: CatalogConfig::default(),
            log_level: "info".to_string(),
            debug_mode: false,
        }
    }
}

impl CoreConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: CoreConfig = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Reject values no catalog can work with
    pub fn validate(&self) -> Result<()> {
        if self.grouping.max_group_depth == 0 {
            return Err(AisError::ConfigError(
                "grouping.max_group_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Install `env_logger` with this configuration's filter. Does nothing
    /// when a logger is already installed.
    pub fn init_logging(&self) {
        let _ = env_logger::Builder::new()
            .parse_filters(&self.log_level)
            .is_test(self.debug_mode)
            .try_init();
    }

    /// Create a development configuration
    pub fn development() -> Self {
        let mut config = Self::default();
        config.debug_mode = true;
        config.log_level = "debug".to_string();
        config
    }

    /// Create a production configuration
    pub fn production() -> Self {
        let mut config = Self::default();
        config.debug_mode = false;
        config.log_level = "info".to_string();
        config.catalog.retained_generations = 8;
        config
    }

    /// Create a testing configuration
    pub fn testing() -> Self {
        let mut config = Self::default();
        config.debug_mode = true;
        config.log_level = "debug".to_string();
        config.grouping.max_group_depth = 8;
        config.catalog.retained_generations = 2;
        config
    }
}
