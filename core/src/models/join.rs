//! Grouping joins between parent and child tables

use serde::{Serialize, Deserialize};

use super::{ColumnId, GroupId, JoinId, TableId};

/// One (parent column, child column) pair of a join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinColumn {
    /// Column of the parent's primary key
    pub parent: ColumnId,

    /// Referencing column of the child
    pub child: ColumnId,
}

/// Directed parent to child edge declared by a grouping foreign key.
///
/// A join exists independently of grouping; it only shapes a group while
/// `group` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Join {
    /// Stable id
    pub id: JoinId,

    /// Constraint name
    pub name: String,

    /// Referenced table
    pub parent: TableId,

    /// Referencing table
    pub child: TableId,

    /// Column pairs in parent primary key order
    pub columns: Vec<JoinColumn>,

    /// Group the edge currently belongs to
    pub group: Option<GroupId>,

    /// Ordering among siblings
    pub position: u32,
}

impl Join {
    /// Child column carrying the value of `parent_column`
    pub fn matching_child(&self, parent_column: ColumnId) -> Option<ColumnId> {
        self.columns
            .iter()
            .find(|jc| jc.parent == parent_column)
            .map(|jc| jc.child)
    }

    /// Parent column referenced by `child_column`
    pub fn matching_parent(&self, child_column: ColumnId) -> Option<ColumnId> {
        self.columns
            .iter()
            .find(|jc| jc.child == child_column)
            .map(|jc| jc.parent)
    }

    /// Whether `column` is on either side of the join
    pub fn uses(&self, column: ColumnId) -> bool {
        self.columns
            .iter()
            .any(|jc| jc.parent == column || jc.child == column)
    }

    /// Whether the join currently shapes a group
    pub fn is_grouped(&self) -> bool {
        self.group.is_some()
    }
}
