//! Groups of co-located tables

use std::collections::{BTreeMap, BTreeSet};
use serde::{Serialize, Deserialize};

use super::index::GroupIndex;
use super::table::GroupName;
use super::{GroupId, TableId};

/// Tree of tables stored together, named after its root table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    /// Stable id
    pub id: GroupId,

    /// Group name
    pub name: GroupName,

    /// Member tables
    pub tables: BTreeSet<TableId>,

    /// Group indexes by name
    pub indexes: BTreeMap<String, GroupIndex>,
}

impl Group {
    /// Create an empty group
    pub fn new(id: GroupId, name: GroupName) -> Self {
        Group {
            id,
            name,
            tables: BTreeSet::new(),
            indexes: BTreeMap::new(),
        }
    }

    /// Whether the group has no member tables
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
