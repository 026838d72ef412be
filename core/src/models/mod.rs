//! Data models for the schema catalog
//!
//! This module provides the plain data of the catalog: tables, columns,
//! indexes, joins, groups and sequences. Cross references are stored as ids
//! resolved through the owning [`Ais`](crate::ais::Ais) arena.

mod table;
mod index;
mod join;
mod group;
mod types;

use std::fmt::{Display, Formatter, Result as FmtResult};
use serde::{Serialize, Deserialize};

pub use table::{
    Column, ColumnDefinition, ForeignKeyDefinition, GroupName, Identity, QualifiedName,
    Sequence, Table, TableName,
};
pub use index::{GroupIndex, IndexColumn, IndexKind, JoinType, TableIndex};
pub use join::{Join, JoinColumn};
pub use group::Group;
pub use types::{DataType, TypeCategory};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub u32);

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
                write!(f, "{}#{}", $prefix, self.0)
            }
        }
    };
}

arena_id!(
    /// Stable id of a table
    TableId, "table"
);
arena_id!(
    /// Stable id of a column
    ColumnId, "column"
);
arena_id!(
    /// Stable id of a table or group index
    IndexId, "index"
);
arena_id!(
    /// Stable id of a join
    JoinId, "join"
);
arena_id!(
    /// Stable id of a group
    GroupId, "group"
);

/// Domain constants for catalog hashing
pub mod domains {
    /// Domain for grouping fingerprints
    pub const GROUPING: &str = "GROUPDB_GROUPING";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_display() {
        assert_eq!(TableId(4).to_string(), "table#4");
        assert_eq!(JoinId(9).to_string(), "join#9");
        assert!(ColumnId(1) < ColumnId(2));
    }
}
