//! Error types for the core crate
//!
//! Usage errors are raised immediately by the call that caused them. Structural
//! problems in the grouping are never raised one by one: they are collected by
//! the validator as [`ValidationFailures`](crate::ais::validator::ValidationFailures).

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::io;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ais::validator::ValidationFailures;

/// Stable error codes shared by usage errors and collected validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// A table is not a member of any group
    TableNotInGroup,
    /// Two grouped joins claim the same child table
    MultipleParents,
    /// A table reaches itself through parent joins
    GroupCycle,
    /// A non-root table of a group has no parent join inside the group
    OrphanTable,
    /// Join columns do not line up with the parent's primary key
    JoinToWrongColumns,
    /// Join parent has no primary key
    JoinToParentWithoutPk,
    /// Join endpoints live in different groups than the join
    JoinGroupMismatch,
    /// Join columns have incompatible type categories
    JoinColumnTypesMismatch,
    /// Group index would need values from two branches of the group tree
    BranchingGroupIndex,
    /// Group index references a table outside its group
    GroupIndexTableNotInGroup,
    /// Primary key column is nullable
    PrimaryKeyNullColumn,
    /// Column positions are not a contiguous 0-based sequence
    ColumnPositionGap,
    /// Group is deeper than the configured maximum
    GroupTooDeep,
    /// Referenced object does not exist
    NoSuchObject,
    /// Object with that name already exists
    DuplicateObject,
    /// Operation not allowed in the current grouping state
    IllegalGroupingOperation,
    /// Storage layer found a NULL in a NOT NULL column
    NotNullViolation,
    /// Builder was based on an older generation than the one published
    StaleGeneration,
    /// Anything else
    Internal,
}

impl ErrorCode {
    /// Five character code, stable across releases
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TableNotInGroup => "50010",
            ErrorCode::MultipleParents => "50011",
            ErrorCode::GroupCycle => "50012",
            ErrorCode::OrphanTable => "50013",
            ErrorCode::JoinToWrongColumns => "50014",
            ErrorCode::JoinToParentWithoutPk => "50015",
            ErrorCode::JoinGroupMismatch => "50016",
            ErrorCode::JoinColumnTypesMismatch => "50017",
            ErrorCode::BranchingGroupIndex => "50018",
            ErrorCode::GroupIndexTableNotInGroup => "50019",
            ErrorCode::PrimaryKeyNullColumn => "50020",
            ErrorCode::ColumnPositionGap => "50021",
            ErrorCode::GroupTooDeep => "50022",
            ErrorCode::NoSuchObject => "42501",
            ErrorCode::DuplicateObject => "42502",
            ErrorCode::IllegalGroupingOperation => "42503",
            ErrorCode::NotNullViolation => "23502",
            ErrorCode::StaleGeneration => "40001",
            ErrorCode::Internal => "XX000",
        }
    }
}

impl Display for ErrorCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Core error type
#[derive(Error, Debug)]
pub enum AisError {
    /// Unknown table
    #[error("Table {0} does not exist")]
    NoSuchTable(String),

    /// Unknown column
    #[error("Column `{1}` does not exist in table {0}")]
    NoSuchColumn(String, String),

    /// Unknown group
    #[error("Group {0} does not exist")]
    NoSuchGroup(String),

    /// Unknown join
    #[error("Join {0} does not exist")]
    NoSuchJoin(String),

    /// Unknown index
    #[error("Index `{1}` does not exist on {0}")]
    NoSuchIndex(String, String),

    /// Unknown sequence
    #[error("Sequence {0} does not exist")]
    NoSuchSequence(String),

    /// Duplicate table, column, index, group or sequence
    #[error("{0} already exists")]
    DuplicateObject(String),

    /// Grouping operation not legal in the current state
    #[error("Cannot {operation}: {reason}")]
    IllegalGrouping {
        /// Operation that was attempted
        operation: String,
        /// Why it was refused
        reason: String,
    },

    /// Join column types are in different categories
    #[error("Join column types of {child} ({child_type}) and {parent} ({parent_type}) are not compatible")]
    JoinColumnTypesMismatch {
        /// Fully qualified child column
        child: String,
        /// Child column type
        child_type: String,
        /// Fully qualified parent column
        parent: String,
        /// Parent column type
        parent_type: String,
    },

    /// Join columns do not match the parent's primary key
    #[error("Table {child_table} join reference part `{child_column}` does not match {parent_table} primary key part `{parent_column}`")]
    JoinToWrongColumns {
        /// Child table, already quoted
        child_table: String,
        /// Child join column name
        child_column: String,
        /// Parent table, already quoted
        parent_table: String,
        /// Parent primary key column name
        parent_column: String,
    },

    /// Join parent has no primary key
    #[error("Table {child} references {parent} which has no primary key")]
    JoinToParentWithoutPk {
        /// Child table, already quoted
        child: String,
        /// Parent table, already quoted
        parent: String,
    },

    /// Group index spans two children of one table
    #[error("Group index `{index}` branches at table {branch_table}")]
    BranchingGroupIndex {
        /// Index name
        index: String,
        /// Table with two participating children
        branch_table: String,
    },

    /// Storage layer reported NULLs in a NOT NULL column
    #[error("Column {0} contains NULL values")]
    NotNullViolation(String),

    /// Builder based on an older generation
    #[error("Builder is based on generation {based_on} but generation {current} is published")]
    StaleGeneration {
        /// Generation the builder copied
        based_on: u64,
        /// Currently published generation
        current: u64,
    },

    /// Grouping validation failed
    #[error(transparent)]
    Validation(#[from] ValidationFailures),

    /// Storage layer failure
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Bincode error
    #[error("Bincode error: {0}")]
    BincodeError(#[from] bincode::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Shared catalog state is unusable, e.g. a poisoned lock
    #[error("State error: {0}")]
    StateError(String),
}

impl AisError {
    /// Stable code of this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AisError::NoSuchTable(_)
            | AisError::NoSuchColumn(_, _)
            | AisError::NoSuchGroup(_)
            | AisError::NoSuchJoin(_)
            | AisError::NoSuchIndex(_, _)
            | AisError::NoSuchSequence(_) => ErrorCode::NoSuchObject,
            AisError::DuplicateObject(_) => ErrorCode::DuplicateObject,
            AisError::IllegalGrouping { .. } => ErrorCode::IllegalGroupingOperation,
            AisError::JoinColumnTypesMismatch { .. } => ErrorCode::JoinColumnTypesMismatch,
            AisError::JoinToWrongColumns { .. } => ErrorCode::JoinToWrongColumns,
            AisError::JoinToParentWithoutPk { .. } => ErrorCode::JoinToParentWithoutPk,
            AisError::BranchingGroupIndex { .. } => ErrorCode::BranchingGroupIndex,
            AisError::NotNullViolation(_) => ErrorCode::NotNullViolation,
            AisError::StaleGeneration { .. } => ErrorCode::StaleGeneration,
            AisError::Validation(failures) => failures
                .first()
                .map(|failure| failure.code)
                .unwrap_or(ErrorCode::Internal),
            AisError::StorageError(_)
            | AisError::IoError(_)
            | AisError::JsonError(_)
            | AisError::BincodeError(_)
            | AisError::ConfigError(_)
            | AisError::StateError(_) => ErrorCode::Internal,
        }
    }
}

/// Result type for the core crate
pub type Result<T> = std::result::Result<T, AisError>;

/// Build an [`AisError::IllegalGrouping`]
pub fn illegal_grouping<O: Display, R: Display>(operation: O, reason: R) -> AisError {
    AisError::IllegalGrouping {
        operation: operation.to_string(),
        reason: reason.to_string(),
    }
}

/// Convert any displayable storage failure into an [`AisError::StorageError`]
pub fn to_storage_error<E: Display>(err: E) -> AisError {
    AisError::StorageError(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: AisError = io_err.into();
        match err {
            AisError::IoError(_) => {}
            _ => panic!("Expected IoError variant"),
        }

        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: AisError = json_err.into();
        assert_eq!(err.code(), ErrorCode::Internal);

        let err = illegal_grouping("delete group `s`.`g`", "group is not empty");
        assert_eq!(err.code(), ErrorCode::IllegalGroupingOperation);
        assert_eq!(err.to_string(), "Cannot delete group `s`.`g`: group is not empty");
    }

    #[test]
    fn test_join_to_wrong_columns_message() {
        let err = AisError::JoinToWrongColumns {
            child_table: "`s`.`child`".to_string(),
            child_column: "nk".to_string(),
            parent_table: "`s`.`parent`".to_string(),
            parent_column: "pk".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Table `s`.`child` join reference part `nk` does not match `s`.`parent` primary key part `pk`"
        );
        assert_eq!(err.code().as_str(), "50014");
    }
}
