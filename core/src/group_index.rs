//! Group index manager
//!
//! A group index keys on columns from several tables of one group. Its tables
//! must lie on a single root-to-leaf path; an index that would need values
//! from two children of the same table is refused. The hooks at the bottom are
//! called by the builder whenever a column or table the index may depend on
//! changes.

use std::collections::BTreeSet;

use log::{debug, info, warn};

use crate::ais::{Ais, AisBuilder};
use crate::error::{illegal_grouping, AisError, Result};
use crate::models::{
    ColumnId, DataType, GroupId, GroupIndex, IndexColumn, IndexId, JoinType, TableId, TableName,
};

/// How a set of tables sits in its group tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Coverage {
    /// All tables lie on the path from `root_most` down to `leaf_most`
    Path {
        root_most: TableId,
        leaf_most: TableId,
    },
    /// Two of the tables are in different subtrees of `at`
    Branching { at: TableId },
}

/// Classify `tables` against the group tree. `None` for an empty set or when
/// a parent chain loops.
pub(crate) fn covering_path(ais: &Ais, tables: &BTreeSet<TableId>) -> Option<Coverage> {
    let mut paths = Vec::with_capacity(tables.len());
    for table in tables {
        paths.push(ais.ancestor_path(*table)?);
    }
    let deepest = paths.iter().max_by_key(|p| p.len())?;
    for path in &paths {
        let table = *path.last()?;
        if !deepest.contains(&table) {
            let common = path
                .iter()
                .zip(deepest.iter())
                .take_while(|(a, b)| a == b)
                .count();
            let at = if common == 0 { table } else { path[common - 1] };
            return Some(Coverage::Branching { at });
        }
    }
    let root_most = paths.iter().min_by_key(|p| p.len())?.last().copied()?;
    let leaf_most = deepest.last().copied()?;
    Some(Coverage::Path { root_most, leaf_most })
}

fn index_tables(ais: &Ais, index: &GroupIndex) -> BTreeSet<TableId> {
    index
        .columns
        .iter()
        .filter_map(|key| ais.column(key.column).map(|c| c.table))
        .collect()
}

impl AisBuilder {
    /// Create a group index over `columns`, given as (table, column name)
    /// pairs. Key columns are stored root-most table first; the order of the
    /// columns within one table is kept.
    pub fn create_group_index<S: AsRef<str>>(
        &mut self,
        group: GroupId,
        name: &str,
        join_type: JoinType,
        columns: &[(TableId, S)],
    ) -> Result<IndexId> {
        let g = self.ais.require_group(group)?;
        let operation = format!("create group index `{}` on {}", name, g.name);
        if g.is_empty() {
            return Err(illegal_grouping(operation, "the group has no tables"));
        }
        if g.indexes.contains_key(name) {
            return Err(AisError::DuplicateObject(format!("Group index `{}` on {}", name, g.name)));
        }
        if columns.is_empty() {
            return Err(illegal_grouping(operation, "no columns given"));
        }

        let mut keys: Vec<(usize, IndexColumn)> = Vec::with_capacity(columns.len());
        let mut tables = BTreeSet::new();
        for (table, column_name) in columns {
            if !g.tables.contains(table) {
                return Err(illegal_grouping(
                    operation,
                    format!("table {} is not in the group", self.ais.table_label(*table)),
                ));
            }
            let column = self.ais.column_id(*table, column_name.as_ref())?;
            let data_type = self
                .ais
                .column(column)
                .map(|c| c.data_type)
                .ok_or_else(|| AisError::NoSuchColumn(self.ais.table_label(*table), column_name.as_ref().to_string()))?;
            let depth = self.ais.depth(*table).unwrap_or(0);
            keys.push((depth, IndexColumn { column, data_type, ascending: true }));
            tables.insert(*table);
        }
        if tables.len() == 1 && !self.config().allow_single_table_group_index {
            return Err(illegal_grouping(operation, "the index covers a single table"));
        }

        let (root_most, leaf_most) = match covering_path(&self.ais, &tables) {
            Some(Coverage::Path { root_most, leaf_most }) => (root_most, leaf_most),
            Some(Coverage::Branching { at }) => {
                return Err(AisError::BranchingGroupIndex {
                    index: name.to_string(),
                    branch_table: self.ais.table_label(at),
                })
            }
            None => return Err(illegal_grouping(operation, "the group tree has a cycle")),
        };

        keys.sort_by_key(|(depth, _)| *depth);
        let id = IndexId(self.next_id());
        let index = GroupIndex {
            id,
            group,
            name: name.to_string(),
            join_type,
            columns: keys.into_iter().map(|(_, key)| key).collect(),
            root_most,
            leaf_most,
        };
        info!(
            "Created group index `{}` from {} to {}",
            name,
            self.ais.table_label(root_most),
            self.ais.table_label(leaf_most)
        );
        if let Some(g) = self.ais.groups.get_mut(&group) {
            g.indexes.insert(name.to_string(), index);
        }
        Ok(id)
    }

    /// Drop a group index by name
    pub fn drop_group_index(&mut self, group: GroupId, name: &str) -> Result<()> {
        let g = self.ais.require_group(group)?;
        let group_name = g.name.to_string();
        if !g.indexes.contains_key(name) {
            return Err(AisError::NoSuchIndex(group_name, name.to_string()));
        }
        if let Some(g) = self.ais.groups.get_mut(&group) {
            g.indexes.remove(name);
        }
        debug!("Dropped group index `{}` on {}", name, group_name);
        Ok(())
    }

    /// Drop every group index keyed on `column`. Returns the dropped names.
    pub(crate) fn on_column_dropped(&mut self, column: ColumnId) -> Vec<String> {
        let Some(group) = self.ais.column(column).and_then(|c| self.ais.table(c.table)).and_then(|t| t.group) else {
            return Vec::new();
        };
        let mut dropped = Vec::new();
        if let Some(g) = self.ais.groups.get_mut(&group) {
            g.indexes.retain(|name, index| {
                let keep = !index.contains(column);
                if !keep {
                    dropped.push(name.clone());
                }
                keep
            });
        }
        for name in &dropped {
            info!("Dropped group index `{}` with column {}", name, self.ais.column_label(column));
        }
        dropped
    }

    /// Re-encode `column` in every group index keyed on it. The index keeps
    /// its tables and path. Returns the names of the updated indexes.
    pub(crate) fn on_column_retyped(&mut self, column: ColumnId, data_type: DataType) -> Vec<String> {
        let Some(group) = self.ais.column(column).and_then(|c| self.ais.table(c.table)).and_then(|t| t.group) else {
            return Vec::new();
        };
        let mut updated = Vec::new();
        if let Some(g) = self.ais.groups.get_mut(&group) {
            for index in g.indexes.values_mut() {
                let mut touched = false;
                for key in index.columns.iter_mut().filter(|k| k.column == column) {
                    key.data_type = data_type;
                    touched = true;
                }
                if touched {
                    updated.push(index.name.clone());
                }
            }
        }
        if !updated.is_empty() {
            debug!("Retyped {} in group index(es) {:?}", self.ais.column_label(column), updated);
        }
        updated
    }

    /// The tables in `members` are about to move from `source` to `target`
    /// as one subtree. Indexes keyed only on those tables move along,
    /// unless `target` already has an index of the same name. Returns the
    /// names of the moved indexes.
    pub(crate) fn on_tree_moving(
        &mut self,
        source: GroupId,
        target: GroupId,
        members: &BTreeSet<TableId>,
    ) -> Vec<String> {
        let Some(g) = self.ais.group(source) else {
            return Vec::new();
        };
        let leaving: Vec<String> = g
            .indexes
            .values()
            .filter(|index| {
                let tables = index_tables(&self.ais, index);
                !tables.is_empty() && tables.is_subset(members)
            })
            .map(|index| index.name.clone())
            .collect();
        if leaving.is_empty() {
            return Vec::new();
        }

        let mut indexes = Vec::with_capacity(leaving.len());
        if let Some(g) = self.ais.groups.get_mut(&source) {
            for name in &leaving {
                if let Some(index) = g.indexes.remove(name) {
                    indexes.push(index);
                }
            }
        }

        let mut moved = Vec::new();
        if let Some(g) = self.ais.groups.get_mut(&target) {
            for mut index in indexes {
                if g.indexes.contains_key(&index.name) {
                    warn!("Dropped group index `{}`, {} already has one by that name", index.name, g.name);
                    continue;
                }
                info!("Group index `{}` moves into {}", index.name, g.name);
                index.group = target;
                moved.push(index.name.clone());
                g.indexes.insert(index.name.clone(), index);
            }
        }
        moved
    }

    /// `table` is about to leave its group. Indexes passing through it are
    /// dropped; indexes ending at it lose its columns and get new endpoints.
    /// An index left with one table is dropped when single-table group
    /// indexes are not allowed.
    pub(crate) fn on_table_dropped(&mut self, table: TableId) {
        let Some(group) = self.ais.table(table).and_then(|t| t.group) else {
            return;
        };
        let Some(g) = self.ais.group(group) else {
            return;
        };
        let allow_single = self.config().allow_single_table_group_index;

        let mut dropped: Vec<String> = Vec::new();
        let mut shrunk: Vec<GroupIndex> = Vec::new();
        for index in g.indexes.values() {
            let on_path = self
                .ais
                .ancestor_path(index.leaf_most)
                .map(|path| {
                    path.iter()
                        .skip_while(|t| **t != index.root_most)
                        .any(|t| *t == table)
                })
                .unwrap_or(false);
            if !on_path {
                continue;
            }
            let endpoint = table == index.root_most || table == index.leaf_most;
            let mut tables = index_tables(&self.ais, index);
            tables.remove(&table);
            if !endpoint || tables.is_empty() || (tables.len() == 1 && !allow_single) {
                dropped.push(index.name.clone());
                continue;
            }
            match covering_path(&self.ais, &tables) {
                Some(Coverage::Path { root_most, leaf_most }) => {
                    let mut index = index.clone();
                    index
                        .columns
                        .retain(|key| self.ais.column(key.column).map(|c| c.table) != Some(table));
                    index.root_most = root_most;
                    index.leaf_most = leaf_most;
                    shrunk.push(index);
                }
                _ => dropped.push(index.name.clone()),
            }
        }

        let table_label = self.ais.table_label(table);
        if let Some(g) = self.ais.groups.get_mut(&group) {
            for name in &dropped {
                g.indexes.remove(name);
                info!("Dropped group index `{}` as {} left the group", name, table_label);
            }
            for index in shrunk {
                debug!("Group index `{}` no longer covers {}", index.name, table_label);
                g.indexes.insert(index.name.clone(), index);
            }
        }
    }

    /// A group named after its root follows the root's renames
    pub(crate) fn on_table_renamed(&mut self, table: TableId, old_name: &TableName) {
        let Some(t) = self.ais.table(table) else {
            return;
        };
        let new_name = t.name.clone();
        let Some(group) = t.group else {
            return;
        };
        if self.ais.group_by_name(&new_name).is_some() {
            return;
        }
        if let Some(g) = self.ais.groups.get_mut(&group) {
            if &g.name == old_name {
                info!("Renaming group {} to {}", old_name, new_name);
                g.name = new_name;
            }
        }
    }
}
