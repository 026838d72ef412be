//! The schema catalog (AIS)
//!
//! [`Ais`] is an arena of tables, columns, indexes, joins, groups and
//! sequences keyed by stable ids. A published `Ais` is only ever handed out
//! behind shared references, so it can be read from any number of threads.
//! All edits go through an [`AisBuilder`] working on a private copy, which is
//! turned back into an `Ais` by [`AisBuilder::freeze`].

mod builder;
mod grouping;
pub mod validator;

#[cfg(test)]
mod tests;

pub use builder::AisBuilder;
pub use validator::{FailureContext, GroupingValidator, ValidationFailure, ValidationFailures};

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use sha2::{Digest, Sha256};

use crate::error::{AisError, Result};
use crate::hkey::{self, BranchHKey, HKey};
use crate::models::{
    domains, Column, ColumnId, Group, GroupId, GroupIndex, IndexId, Join, JoinId, QualifiedName,
    Sequence, Table, TableId, TableIndex, TableName,
};

/// Schema catalog generation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Ais {
    pub(crate) generation: u64,
    pub(crate) published_at: Option<DateTime<Utc>>,
    pub(crate) next_id: u32,
    pub(crate) tables: BTreeMap<TableId, Table>,
    pub(crate) table_names: BTreeMap<TableName, TableId>,
    pub(crate) columns: BTreeMap<ColumnId, Column>,
    pub(crate) indexes: BTreeMap<IndexId, TableIndex>,
    pub(crate) joins: BTreeMap<JoinId, Join>,
    pub(crate) groups: BTreeMap<GroupId, Group>,
    pub(crate) sequences: BTreeMap<QualifiedName, Sequence>,
    pub(crate) hkeys: BTreeMap<TableId, HKey>,
}

impl Ais {
    /// Empty catalog at generation 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Generation counter, incremented on every publish
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// When this generation was published
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        self.published_at
    }

    // ---- tables and columns ----

    /// Table by id
    pub fn table(&self, id: TableId) -> Option<&Table> {
        self.tables.get(&id)
    }

    /// Table by id, failing with a usage error when missing
    pub fn require_table(&self, id: TableId) -> Result<&Table> {
        self.tables
            .get(&id)
            .ok_or_else(|| AisError::NoSuchTable(id.to_string()))
    }

    /// Table by qualified name
    pub fn table_by_name(&self, name: &TableName) -> Option<&Table> {
        self.table_names.get(name).and_then(|id| self.tables.get(id))
    }

    /// Id of the table called `schema`.`name`
    pub fn table_id(&self, schema: &str, name: &str) -> Result<TableId> {
        let name = TableName::new(schema, name);
        self.table_names
            .get(&name)
            .copied()
            .ok_or_else(|| AisError::NoSuchTable(name.to_string()))
    }

    /// All tables in id order
    pub fn tables(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    /// Distinct schema names
    pub fn schema_names(&self) -> BTreeSet<&str> {
        self.table_names
            .keys()
            .map(|name| name.schema.as_str())
            .chain(self.sequences.keys().map(|name| name.schema.as_str()))
            .collect()
    }

    /// Tables of one schema in name order
    pub fn tables_in_schema<'a>(&'a self, schema: &'a str) -> impl Iterator<Item = &'a Table> + 'a {
        self.table_names
            .iter()
            .filter(move |(name, _)| name.schema == schema)
            .filter_map(move |(_, id)| self.tables.get(id))
    }

    /// Column by id
    pub fn column(&self, id: ColumnId) -> Option<&Column> {
        self.columns.get(&id)
    }

    /// Columns of a table in position order
    pub fn columns_of(&self, table: TableId) -> Vec<&Column> {
        self.tables
            .get(&table)
            .map(|t| t.columns.iter().filter_map(|id| self.columns.get(id)).collect())
            .unwrap_or_default()
    }

    /// Column of `table` called `name`
    pub fn column_by_name(&self, table: TableId, name: &str) -> Option<&Column> {
        self.columns_of(table).into_iter().find(|c| c.name == name)
    }

    /// Column id of `table`.`name`, failing with a usage error when missing
    pub fn column_id(&self, table: TableId, name: &str) -> Result<ColumnId> {
        self.column_by_name(table, name)
            .map(|c| c.id)
            .ok_or_else(|| AisError::NoSuchColumn(self.table_label(table), name.to_string()))
    }

    /// Fully qualified, quoted column name
    pub fn column_label(&self, column: ColumnId) -> String {
        match self.columns.get(&column) {
            Some(c) => match self.tables.get(&c.table) {
                Some(t) => t.name.column(&c.name),
                None => format!("`{}`", c.name),
            },
            None => column.to_string(),
        }
    }

    /// Column name or the id when unknown
    pub fn column_name(&self, column: ColumnId) -> String {
        self.columns
            .get(&column)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| column.to_string())
    }

    /// Quoted table name or the id when unknown
    pub fn table_label(&self, table: TableId) -> String {
        self.tables
            .get(&table)
            .map(|t| t.name.to_string())
            .unwrap_or_else(|| table.to_string())
    }

    // ---- indexes ----

    /// Table index by id
    pub fn index(&self, id: IndexId) -> Option<&TableIndex> {
        self.indexes.get(&id)
    }

    /// Primary key of a table
    pub fn primary_key(&self, table: TableId) -> Option<&TableIndex> {
        self.tables
            .get(&table)
            .and_then(|t| t.primary_key)
            .and_then(|id| self.indexes.get(&id))
    }

    /// Primary key columns of a table, empty when it has none
    pub fn primary_key_columns(&self, table: TableId) -> Vec<ColumnId> {
        self.primary_key(table)
            .map(|pk| pk.column_ids())
            .unwrap_or_default()
    }

    /// Secondary indexes of a table
    pub fn indexes_of(&self, table: TableId) -> Vec<&TableIndex> {
        self.tables
            .get(&table)
            .map(|t| t.indexes.iter().filter_map(|id| self.indexes.get(id)).collect())
            .unwrap_or_default()
    }

    /// Secondary index of `table` called `name`
    pub fn index_by_name(&self, table: TableId, name: &str) -> Option<&TableIndex> {
        self.indexes_of(table).into_iter().find(|i| i.name == name)
    }

    // ---- joins ----

    /// Join by id
    pub fn join(&self, id: JoinId) -> Option<&Join> {
        self.joins.get(&id)
    }

    /// Join by id, failing with a usage error when missing
    pub fn require_join(&self, id: JoinId) -> Result<&Join> {
        self.joins
            .get(&id)
            .ok_or_else(|| AisError::NoSuchJoin(id.to_string()))
    }

    /// Join by constraint name
    pub fn join_by_name(&self, name: &str) -> Option<&Join> {
        self.joins.values().find(|j| j.name == name)
    }

    /// All joins, grouped or not
    pub fn joins(&self) -> impl Iterator<Item = &Join> {
        self.joins.values()
    }

    /// Every join declaring `table` as child, grouped or not
    pub fn candidate_parent_joins(&self, table: TableId) -> Vec<&Join> {
        self.joins.values().filter(|j| j.child == table).collect()
    }

    /// Grouped joins declaring `table` as child
    pub fn parent_joins(&self, table: TableId) -> Vec<&Join> {
        self.joins
            .values()
            .filter(|j| j.child == table && j.is_grouped())
            .collect()
    }

    /// The grouped join to the table's parent
    pub fn parent_join(&self, table: TableId) -> Option<&Join> {
        self.joins
            .values()
            .find(|j| j.child == table && j.is_grouped())
    }

    /// Parent table within the group
    pub fn parent_of(&self, table: TableId) -> Option<TableId> {
        self.parent_join(table).map(|j| j.parent)
    }

    /// Grouped joins to the table's children, in sibling order
    pub fn child_joins(&self, table: TableId) -> Vec<&Join> {
        let mut joins: Vec<&Join> = self
            .joins
            .values()
            .filter(|j| j.parent == table && j.is_grouped())
            .collect();
        joins.sort_by_key(|j| (j.position, j.id));
        joins
    }

    /// Every join declaring `table` as parent, grouped or not
    pub fn candidate_child_joins(&self, table: TableId) -> Vec<&Join> {
        self.joins.values().filter(|j| j.parent == table).collect()
    }

    // ---- groups and tree shape ----

    /// Group by id
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(&id)
    }

    /// Group by id, failing with a usage error when missing
    pub fn require_group(&self, id: GroupId) -> Result<&Group> {
        self.groups
            .get(&id)
            .ok_or_else(|| AisError::NoSuchGroup(id.to_string()))
    }

    /// Group by name
    pub fn group_by_name(&self, name: &QualifiedName) -> Option<&Group> {
        self.groups.values().find(|g| &g.name == name)
    }

    /// All groups in id order
    pub fn groups(&self) -> impl Iterator<Item = &Group> {
        self.groups.values()
    }

    /// Group the table belongs to
    pub fn group_of(&self, table: TableId) -> Option<&Group> {
        self.tables
            .get(&table)
            .and_then(|t| t.group)
            .and_then(|g| self.groups.get(&g))
    }

    /// Group index by group and name
    pub fn group_index(&self, group: GroupId, name: &str) -> Option<&GroupIndex> {
        self.groups.get(&group).and_then(|g| g.indexes.get(name))
    }

    /// Members of a group without a parent join inside the group. A well
    /// formed group has exactly one.
    pub fn parentless_members(&self, group: GroupId) -> Vec<TableId> {
        let Some(g) = self.groups.get(&group) else {
            return Vec::new();
        };
        g.tables
            .iter()
            .copied()
            .filter(|t| {
                self.parent_joins(*t)
                    .iter()
                    .all(|j| j.group != Some(group))
            })
            .collect()
    }

    /// Root table of a group. When several members lack a parent the one
    /// named like the group wins.
    pub fn group_root(&self, group: GroupId) -> Option<TableId> {
        let g = self.groups.get(&group)?;
        let roots = self.parentless_members(group);
        roots
            .iter()
            .copied()
            .find(|t| self.tables.get(t).map(|t| &t.name) == Some(&g.name))
            .or_else(|| roots.first().copied())
    }

    /// Tables from the group root down to `table`, or `None` when parent
    /// joins loop
    pub fn ancestor_path(&self, table: TableId) -> Option<Vec<TableId>> {
        let mut path = vec![table];
        let mut seen = HashSet::from([table]);
        let mut current = table;
        while let Some(parent) = self.parent_of(current) {
            if !seen.insert(parent) {
                return None;
            }
            path.push(parent);
            current = parent;
        }
        path.reverse();
        Some(path)
    }

    /// Number of ancestors of `table`; 0 for a root
    pub fn depth(&self, table: TableId) -> Option<usize> {
        self.ancestor_path(table).map(|path| path.len() - 1)
    }

    /// Whether `ancestor` is `table` or one of its ancestors
    pub fn is_ancestor_or_self(&self, ancestor: TableId, table: TableId) -> bool {
        self.ancestor_path(table)
            .map(|path| path.contains(&ancestor))
            .unwrap_or(false)
    }

    /// Descendants of `table` in breadth-first order, siblings in join order
    pub fn descendants(&self, table: TableId) -> Vec<TableId> {
        let mut result = Vec::new();
        let mut seen = HashSet::from([table]);
        let mut queue = VecDeque::from([table]);
        while let Some(current) = queue.pop_front() {
            for join in self.child_joins(current) {
                if seen.insert(join.child) {
                    result.push(join.child);
                    queue.push_back(join.child);
                }
            }
        }
        result
    }

    /// Members of a group in breadth-first order from the root
    pub fn group_tables_in_order(&self, group: GroupId) -> Vec<TableId> {
        match self.group_root(group) {
            Some(root) => {
                let mut tables = vec![root];
                tables.extend(self.descendants(root));
                tables
            }
            None => Vec::new(),
        }
    }

    // ---- hkeys ----

    /// HKey cached for this generation. Every grouped table of a published
    /// generation has one.
    pub fn hkey(&self, table: TableId) -> Option<&HKey> {
        self.hkeys.get(&table)
    }

    /// Branch HKey of a table
    pub fn branch_hkey(&self, table: TableId) -> Result<BranchHKey> {
        hkey::compute_branch_hkey(self, table)
    }

    // ---- sequences ----

    /// Sequence by name
    pub fn sequence(&self, name: &QualifiedName) -> Option<&Sequence> {
        self.sequences.get(name)
    }

    /// All sequences in name order
    pub fn sequences(&self) -> impl Iterator<Item = &Sequence> {
        self.sequences.values()
    }

    // ---- persistence and comparison ----

    /// Serialize this generation for the storage layer
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Restore a generation written by [`Ais::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    /// SHA-256 over a name-based description of every group: root, parent/child
    /// edges and the column names of each member's HKey. Two catalogs with the
    /// same grouping have the same fingerprint whatever their ids.
    pub fn grouping_fingerprint(&self) -> Result<String> {
        let mut groups: Vec<GroupShape> = Vec::new();
        for group in self.groups.values() {
            let root = self.group_root(group.id).map(|t| self.table_label(t));
            let mut edges: Vec<(String, String)> = self
                .joins
                .values()
                .filter(|j| j.group == Some(group.id))
                .map(|j| (self.table_label(j.parent), self.table_label(j.child)))
                .collect();
            edges.sort();
            let mut hkeys = Vec::new();
            for table in &group.tables {
                let key = hkey::compute_hkey(self, *table)?;
                hkeys.push((self.table_label(*table), key.describe(self)));
            }
            hkeys.sort();
            groups.push(GroupShape { root, edges, hkeys });
        }
        groups.sort_by(|a, b| a.root.cmp(&b.root));

        let shape = serde_json::to_string(&groups)?;
        let mut hasher = Sha256::new();
        hasher.update(domains::GROUPING.as_bytes());
        hasher.update(shape.as_bytes());
        Ok(hex::encode(hasher.finalize()))
    }
}

#[derive(Serialize)]
struct GroupShape {
    root: Option<String>,
    edges: Vec<(String, String)>,
    hkeys: Vec<(String, String)>,
}
