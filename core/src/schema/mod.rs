//! Name-based table definitions and DDL
//!
//! This module describes tables the way DDL statements do, by name, and
//! applies those descriptions to a catalog builder: one statement at a time
//! through [`DdlExecutor`], or as a batch through [`AisMerge`].

mod ddl;
mod executor;
mod merge;

pub use ddl::{
    ChangeType, ChildReference, DdlOperation, GroupingReference, IndexDefinition, JoinColumnDefinition,
    TableChange, TableDefinition,
};
pub use executor::{DdlExecutor, NoopStorage, StorageLayer};
pub use merge::{add_table_definition, AisMerge};
