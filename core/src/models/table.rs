//! Tables, columns and sequences of the schema model

use std::fmt::{Display, Formatter, Result as FmtResult};
use serde::{Serialize, Deserialize};
use uuid::Uuid;

use super::types::DataType;
use super::{ColumnId, GroupId, IndexId, TableId};

/// Schema-qualified name of a table, group or sequence
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    /// Schema name
    pub schema: String,

    /// Object name within the schema
    pub name: String,
}

/// Name of a table
pub type TableName = QualifiedName;

/// Name of a group; the name of its root table
pub type GroupName = QualifiedName;

impl QualifiedName {
    /// Create a qualified name
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        QualifiedName {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Quoted column name qualified by this table, e.g. `` `s`.`t`.`c` ``
    pub fn column(&self, column: &str) -> String {
        format!("{}.`{}`", self, column)
    }
}

impl Display for QualifiedName {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "`{}`.`{}`", self.schema, self.name)
    }
}

/// Identity generation attached to a column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Sequence supplying values
    pub sequence: QualifiedName,

    /// `GENERATED ALWAYS` rather than `BY DEFAULT`
    pub always: bool,
}

/// Column of a table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Column {
    /// Stable id
    pub id: ColumnId,

    /// Owning table
    pub table: TableId,

    /// Column name
    pub name: String,

    /// 0-based position within the table
    pub position: usize,

    /// Type descriptor
    pub data_type: DataType,

    /// Whether NULL is allowed
    pub nullable: bool,

    /// Default expression text
    pub default: Option<String>,

    /// Identity generator
    pub identity: Option<Identity>,
}

/// Caller-supplied description of a column, independent of any catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Name of the column
    pub name: String,

    /// Type of the column
    pub data_type: DataType,

    /// Whether the column can be null
    pub nullable: bool,

    /// Default expression
    #[serde(default)]
    pub default: Option<String>,

    /// Identity generator
    #[serde(default)]
    pub identity: Option<Identity>,
}

impl ColumnDefinition {
    /// Plain column without default or identity
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        ColumnDefinition {
            name: name.into(),
            data_type,
            nullable,
            default: None,
            identity: None,
        }
    }

    /// Same column with a default expression
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Same column backed by an identity sequence
    pub fn with_identity(mut self, sequence: QualifiedName, always: bool) -> Self {
        self.identity = Some(Identity { sequence, always });
        self
    }
}

impl From<&Column> for ColumnDefinition {
    fn from(column: &Column) -> Self {
        ColumnDefinition {
            name: column.name.clone(),
            data_type: column.data_type,
            nullable: column.nullable,
            default: column.default.clone(),
            identity: column.identity.clone(),
        }
    }
}

/// Ordinary (non-grouping) foreign key, kept by column name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeyDefinition {
    /// Constraint name
    pub name: String,

    /// Referencing columns
    pub columns: Vec<String>,

    /// Referenced table
    pub referenced_table: TableName,

    /// Referenced columns
    pub referenced_columns: Vec<String>,
}

/// Table of the schema model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Table {
    /// Stable integer id
    pub id: TableId,

    /// Schema-qualified name
    pub name: TableName,

    /// Identity that survives renames and restarts
    pub uuid: Uuid,

    /// Columns in position order
    pub columns: Vec<ColumnId>,

    /// Primary key index
    pub primary_key: Option<IndexId>,

    /// Other table indexes
    pub indexes: Vec<IndexId>,

    /// Owning group
    pub group: Option<GroupId>,

    /// Ordinary foreign keys
    pub foreign_keys: Vec<ForeignKeyDefinition>,
}

impl Table {
    /// Create an empty, ungrouped table
    pub fn new(id: TableId, name: TableName) -> Self {
        Table {
            id,
            name,
            uuid: Uuid::new_v4(),
            columns: Vec::new(),
            primary_key: None,
            indexes: Vec::new(),
            group: None,
            foreign_keys: Vec::new(),
        }
    }
}

/// Sequence backing identity columns
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sequence {
    /// Qualified sequence name
    pub name: QualifiedName,

    /// First value
    pub start: i64,

    /// Step between values
    pub increment: i64,

    /// Table whose identity column owns this sequence, if any
    pub owner: Option<TableId>,
}
