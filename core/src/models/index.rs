//! Table indexes and group indexes

use serde::{Serialize, Deserialize};

use super::types::DataType;
use super::{ColumnId, GroupId, IndexId, TableId};

/// Kind of a single-table index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndexKind {
    /// The table's primary key
    Primary,
    /// Unique secondary index
    Unique,
    /// Non-unique secondary index
    Secondary,
}

/// One key column of an index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexColumn {
    /// Indexed column
    pub column: ColumnId,

    /// Type the index encodes the key with
    pub data_type: DataType,

    /// Ascending order
    pub ascending: bool,
}

/// Index over the columns of one table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableIndex {
    /// Stable id
    pub id: IndexId,

    /// Indexed table
    pub table: TableId,

    /// Index name, unique within the table
    pub name: String,

    /// Primary, unique or plain
    pub kind: IndexKind,

    /// Key columns in key order
    pub columns: Vec<IndexColumn>,
}

impl TableIndex {
    /// Whether `column` is one of the key columns
    pub fn contains(&self, column: ColumnId) -> bool {
        self.columns.iter().any(|c| c.column == column)
    }

    /// Key column ids in key order
    pub fn column_ids(&self) -> Vec<ColumnId> {
        self.columns.iter().map(|c| c.column).collect()
    }
}

/// Outer-join semantics of a group index for rows missing on one side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JoinType {
    /// Keep ancestor rows without matching descendants
    Left,
    /// Keep descendant rows without matching ancestors
    Right,
}

/// Index whose key columns come from several tables of one group
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupIndex {
    /// Stable id
    pub id: IndexId,

    /// Owning group
    pub group: GroupId,

    /// Index name, unique within the group
    pub name: String,

    /// Outer-join semantics
    pub join_type: JoinType,

    /// Key columns ordered from the root-most to the leaf-most table
    pub columns: Vec<IndexColumn>,

    /// Table nearest the group root
    pub root_most: TableId,

    /// Table furthest from the group root
    pub leaf_most: TableId,
}

impl GroupIndex {
    /// Whether `column` is one of the key columns
    pub fn contains(&self, column: ColumnId) -> bool {
        self.columns.iter().any(|c| c.column == column)
    }
}
