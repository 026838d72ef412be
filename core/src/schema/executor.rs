//! DDL execution
//!
//! [`DdlExecutor`] turns a [`DdlOperation`] into builder calls on a private
//! catalog copy, classifies ALTERs and tells the storage layer what work the
//! change implies. When the storage layer fails the builder is left half
//! edited and must be discarded; nothing has been published.

use std::collections::{BTreeMap, BTreeSet};

use log::{debug, info};

use super::ddl::{ChangeType, DdlOperation, GroupingReference, TableChange, TableDefinition};
use super::merge::add_table_definition;
use crate::ais::AisBuilder;
use crate::change_level::{classify, ChangeLevel};
use crate::error::{illegal_grouping, AisError, Result};
use crate::models::{GroupId, GroupName, JoinId, TableId, TableName};

/// Row storage as seen from DDL execution
#[cfg_attr(test, mockall::automock)]
pub trait StorageLayer {
    /// Verify existing rows satisfy the table's constraints
    fn check_constraints(&mut self, table: &TableName) -> Result<()>;

    /// Build the named secondary indexes of a table
    fn build_indexes(&mut self, table: &TableName, indexes: &[String]) -> Result<()>;

    /// Build a group index
    fn build_group_index(&mut self, group: &GroupName, index: &str) -> Result<()>;

    /// Rewrite every row of a table in its new format
    fn rewrite_table(&mut self, table: &TableName) -> Result<()>;

    /// Move rows between groups after their trees changed shape
    fn reorganize_groups(&mut self, groups: &[GroupName]) -> Result<()>;

    /// Delete the rows of a dropped table
    fn drop_table_data(&mut self, table: &TableName) -> Result<()>;
}

/// Storage layer for catalogs without rows
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopStorage;

impl StorageLayer for NoopStorage {
    fn check_constraints(&mut self, _table: &TableName) -> Result<()> {
        Ok(())
    }

    fn build_indexes(&mut self, _table: &TableName, _indexes: &[String]) -> Result<()> {
        Ok(())
    }

    fn build_group_index(&mut self, _group: &GroupName, _index: &str) -> Result<()> {
        Ok(())
    }

    fn rewrite_table(&mut self, _table: &TableName) -> Result<()> {
        Ok(())
    }

    fn reorganize_groups(&mut self, _groups: &[GroupName]) -> Result<()> {
        Ok(())
    }

    fn drop_table_data(&mut self, _table: &TableName) -> Result<()> {
        Ok(())
    }
}

/// Applies DDL to a builder and drives the storage layer
pub struct DdlExecutor<'a, S: StorageLayer> {
    builder: &'a mut AisBuilder,
    storage: &'a mut S,
}

impl<'a, S: StorageLayer> DdlExecutor<'a, S> {
    /// Executor editing `builder`
    pub fn new(builder: &'a mut AisBuilder, storage: &'a mut S) -> Self {
        DdlExecutor { builder, storage }
    }

    /// Apply one operation and return how disruptive it was
    pub fn execute(&mut self, operation: DdlOperation) -> Result<ChangeLevel> {
        info!("Executing {}", operation.kind());
        match operation {
            DdlOperation::CreateTable(definition) => {
                add_table_definition(self.builder, &definition)?;
                Ok(ChangeLevel::Metadata)
            }
            DdlOperation::DropTable(name) => {
                let table = self.table_id(&name)?;
                self.builder.drop_table(table)?;
                self.storage.drop_table_data(&name)?;
                Ok(ChangeLevel::Table)
            }
            DdlOperation::RenameTable(old, new) => {
                let table = self.table_id(&old)?;
                self.builder.rename_table(table, new)?;
                Ok(ChangeLevel::Metadata)
            }
            DdlOperation::AlterTable { table, definition, column_changes, index_changes } => {
                self.alter_table(&table, &definition, &column_changes, &index_changes)
            }
            DdlOperation::CreateGroupIndex { group, name, join_type, columns } => {
                let group_id = self.group_id(&group)?;
                let resolved = columns
                    .iter()
                    .map(|(table, column)| Ok((self.table_id(table)?, column.clone())))
                    .collect::<Result<Vec<(TableId, String)>>>()?;
                self.builder.create_group_index(group_id, &name, join_type, &resolved)?;
                self.storage.build_group_index(&group, &name)?;
                Ok(ChangeLevel::Index)
            }
            DdlOperation::DropGroupIndex { group, name } => {
                let group_id = self.group_id(&group)?;
                self.builder.drop_group_index(group_id, &name)?;
                Ok(ChangeLevel::Metadata)
            }
        }
    }

    fn table_id(&self, name: &TableName) -> Result<TableId> {
        self.builder.ais().table_id(&name.schema, &name.name)
    }

    fn group_id(&self, name: &GroupName) -> Result<GroupId> {
        self.builder
            .ais()
            .group_by_name(name)
            .map(|g| g.id)
            .ok_or_else(|| AisError::NoSuchGroup(name.to_string()))
    }

    fn group_name_of(&self, table: TableId) -> Option<GroupName> {
        self.builder.ais().group_of(table).map(|g| g.name.clone())
    }

    fn alter_table(
        &mut self,
        name: &TableName,
        new: &TableDefinition,
        column_changes: &[TableChange],
        index_changes: &[TableChange],
    ) -> Result<ChangeLevel> {
        let table = self.table_id(name)?;
        let old = TableDefinition::from_ais(self.builder.ais(), table)?;
        let level = classify(&old, new, column_changes, index_changes)?;
        if level == ChangeLevel::None {
            debug!("ALTER of {} changes nothing", name);
            return Ok(level);
        }
        let old_group = self.group_name_of(table);

        self.apply_alter(table, &old, new, column_changes, index_changes)?;

        match level {
            ChangeLevel::None | ChangeLevel::Metadata => {}
            ChangeLevel::MetadataConstraint => self.storage.check_constraints(&new.name)?,
            ChangeLevel::Index => {
                let built: Vec<String> = index_changes
                    .iter()
                    .filter(|c| c.change_type != ChangeType::Drop)
                    .filter_map(|c| c.new_name.clone())
                    .collect();
                self.storage.build_indexes(&new.name, &built)?;
            }
            ChangeLevel::Table => self.storage.rewrite_table(&new.name)?,
            ChangeLevel::Group => {
                let mut groups: Vec<GroupName> = Vec::new();
                let affected = old_group
                    .into_iter()
                    .chain(self.group_name_of(table))
                    .chain(old.children.iter().filter_map(|child| {
                        let ais = self.builder.ais();
                        ais.table_by_name(&child.child)
                            .and_then(|t| t.group)
                            .and_then(|g| ais.group(g))
                            .map(|g| g.name.clone())
                    }));
                for group in affected {
                    if !groups.contains(&group) {
                        groups.push(group);
                    }
                }
                self.storage.reorganize_groups(&groups)?;
            }
        }
        info!("Altered {} at level {:?}", new.name, level);
        Ok(level)
    }

    fn apply_alter(
        &mut self,
        table: TableId,
        old: &TableDefinition,
        new: &TableDefinition,
        column_changes: &[TableChange],
        index_changes: &[TableChange],
    ) -> Result<()> {
        let renames: BTreeMap<&str, &str> = column_changes
            .iter()
            .filter(|c| c.change_type == ChangeType::Modify)
            .filter_map(|c| Some((c.old_name.as_deref()?, c.new_name.as_deref()?)))
            .collect();
        let renamed = |column: &str| renames.get(column).map(|n| n.to_string()).unwrap_or_else(|| column.to_string());
        let dropped: BTreeSet<&str> = column_changes
            .iter()
            .filter(|c| c.change_type == ChangeType::Drop)
            .filter_map(|c| c.old_name.as_deref())
            .collect();

        if old.name != new.name {
            self.builder.rename_table(table, new.name.clone())?;
        }

        let grouping_moved = match (&old.grouping, &new.grouping) {
            (Some(before), Some(after)) => !same_link(before, after, &renamed),
            (Some(_), None) => true,
            _ => false,
        };
        if grouping_moved {
            if let Some(join) = self.builder.ais().parent_join(table).map(|j| j.id) {
                self.builder.detach_child(join)?;
            }
        } else if let (Some(before), Some(after)) = (&old.grouping, &new.grouping) {
            if before.name != after.name {
                if let Some(join) = self.builder.ais().parent_join(table).map(|j| j.id) {
                    self.builder.rename_join(join, &after.name)?;
                }
            }
        }

        let old_key: Vec<String> = old.primary_key.iter().map(|c| renamed(c)).collect();
        let key_changed = old_key != new.primary_key;
        if key_changed {
            let children: Vec<JoinId> = self.builder.ais().child_joins(table).iter().map(|j| j.id).collect();
            for join in children {
                self.builder.detach_child(join)?;
            }
        }

        let released: Vec<(JoinId, bool)> = self
            .builder
            .ais()
            .joins()
            .filter(|j| j.parent == table || j.child == table)
            .filter(|j| {
                dropped.iter().any(|name| {
                    self.builder
                        .ais()
                        .column_by_name(table, name)
                        .map(|c| j.uses(c.id))
                        .unwrap_or(false)
                })
            })
            .map(|j| (j.id, j.is_grouped()))
            .collect();
        for (join, grouped) in released {
            self.release_join(join, grouped)?;
        }

        for change in index_changes.iter().filter(|c| c.change_type != ChangeType::Add) {
            let index = required(&change.old_name, "drop index")?;
            if self.builder.ais().index_by_name(table, index).is_some() {
                self.builder.drop_index(table, index)?;
            }
        }

        for name in &dropped {
            self.builder.drop_column(table, name)?;
        }
        for change in column_changes.iter().filter(|c| c.change_type == ChangeType::Modify) {
            let old_name = required(&change.old_name, "modify column")?;
            let new_name = required(&change.new_name, "modify column")?;
            let definition = new
                .find_column(new_name)
                .ok_or_else(|| AisError::NoSuchColumn(new.name.to_string(), new_name.to_string()))?;
            let column = self.builder.ais().column_id(table, old_name)?;
            self.builder.modify_column(column, definition)?;
        }

        let mismatched: Vec<(JoinId, bool)> = self
            .builder
            .ais()
            .joins()
            .filter(|j| j.parent == table || j.child == table)
            .filter(|j| {
                let ais = self.builder.ais();
                j.columns.iter().any(|pair| match (ais.column(pair.parent), ais.column(pair.child)) {
                    (Some(parent), Some(child)) => !child.data_type.joinable_with(&parent.data_type),
                    _ => true,
                })
            })
            .map(|j| (j.id, j.is_grouped()))
            .collect();
        for (join, grouped) in mismatched {
            self.release_join(join, grouped)?;
        }

        for change in column_changes.iter().filter(|c| c.change_type == ChangeType::Add) {
            let name = required(&change.new_name, "add column")?;
            let definition = new
                .find_column(name)
                .ok_or_else(|| AisError::NoSuchColumn(new.name.to_string(), name.to_string()))?;
            self.builder.add_column(table, definition)?;
        }

        for change in index_changes.iter().filter(|c| c.change_type != ChangeType::Drop) {
            let name = required(&change.new_name, "add index")?;
            let index = new
                .find_index(name)
                .ok_or_else(|| AisError::NoSuchIndex(new.name.to_string(), name.to_string()))?;
            self.builder.index(table, &index.name, index.unique, &index.columns)?;
        }

        self.builder.set_foreign_keys(table, new.foreign_keys.clone())?;

        if key_changed {
            if self.builder.ais().primary_key(table).is_some() {
                self.builder.drop_primary_key(table)?;
            }
            if !new.primary_key.is_empty() {
                self.builder.primary_key(table, &new.primary_key)?;
            }
        }

        if let Some(grouping) = &new.grouping {
            if self.builder.ais().parent_join(table).is_none() {
                self.regroup_under(table, grouping)?;
            }
        }
        Ok(())
    }

    fn release_join(&mut self, join: JoinId, grouped: bool) -> Result<()> {
        if grouped {
            self.builder.detach_child(join)?;
        } else {
            self.builder.drop_join(join)?;
        }
        Ok(())
    }

    /// Hang `table` and its subtree under the parent named by `grouping`
    fn regroup_under(&mut self, table: TableId, grouping: &GroupingReference) -> Result<()> {
        let parent = self.table_id(&grouping.parent)?;
        let target = self.builder.ais().table(parent).and_then(|t| t.group).ok_or_else(|| {
            illegal_grouping(
                format!("group {} under {}", self.builder.ais().table_label(table), grouping.parent),
                "the parent is not in a group",
            )
        })?;
        let pairs: Vec<(&str, &str)> = grouping
            .columns
            .iter()
            .map(|c| (c.parent.as_str(), c.child.as_str()))
            .collect();
        let join = self.builder.join(&grouping.name, parent, table, &pairs)?;

        let previous = self.builder.ais().table(table).and_then(|t| t.group);
        self.builder.move_tree_to_group(table, target, Some(join))?;
        if let Some(previous) = previous.filter(|g| *g != target) {
            if self.builder.ais().group(previous).map(|g| g.is_empty()).unwrap_or(false) {
                self.builder.delete_group(previous)?;
            }
        }
        Ok(())
    }
}

fn same_link<F: Fn(&str) -> String>(before: &GroupingReference, after: &GroupingReference, renamed: F) -> bool {
    before.parent == after.parent
        && before.columns.len() == after.columns.len()
        && before
            .columns
            .iter()
            .zip(&after.columns)
            .all(|(b, a)| b.parent == a.parent && renamed(&b.child) == a.child)
}

fn required<'c>(name: &'c Option<String>, operation: &str) -> Result<&'c str> {
    name.as_deref()
        .ok_or_else(|| illegal_grouping(operation, "the change descriptor has no name"))
}
