//! # GroupDB Core
//!
//! Schema catalog and table grouping for GroupDB.
//! This crate models tables, columns, indexes and grouping joins, arranges
//! tables into groups stored together, derives the hierarchical keys (HKeys)
//! that order rows within a group, maintains group indexes and classifies how
//! disruptive a table change is.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod ais;
pub mod catalog;
pub mod change_level;
pub mod config;
pub mod error;
pub mod group_index;
pub mod hkey;
pub mod models;
pub mod schema;

#[cfg(test)]
pub(crate) mod testing;

/// Re-export common types for ease of use
pub use ais::{Ais, AisBuilder, ValidationFailure, ValidationFailures};
pub use catalog::{create_schema_manager, SchemaManager, SharedSchemaManager};
pub use change_level::{classify, ChangeLevel};
pub use config::{CatalogConfig, CoreConfig, GroupingConfig};
pub use error::{AisError, ErrorCode, Result};
pub use hkey::{BranchHKey, HKey};
pub use schema::{AisMerge, DdlExecutor, DdlOperation, StorageLayer, TableDefinition};

/// Version of the core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
