//! Mutable side of the catalog
//!
//! An [`AisBuilder`] owns a private copy of a published [`Ais`]. Every edit
//! updates group membership incrementally and drops the cached HKeys of the
//! tables it touches; nothing is recomputed until the HKey is asked for or the
//! builder is frozen.

use std::collections::BTreeSet;

use chrono::Utc;
use log::{debug, info};

use super::Ais;
use crate::config::GroupingConfig;
use crate::error::{illegal_grouping, AisError, Result};
use crate::hkey::{self, HKey};
use crate::models::{
    Column, ColumnDefinition, ColumnId, DataType, ForeignKeyDefinition, IndexColumn, IndexId, IndexKind,
    Join, JoinColumn, JoinId, QualifiedName, Sequence, Table, TableId, TableIndex, TableName,
};

/// Private, mutable copy of a catalog generation
#[derive(Debug, Clone)]
pub struct AisBuilder {
    pub(crate) ais: Ais,
    base_generation: u64,
    config: GroupingConfig,
}

impl Default for AisBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AisBuilder {
    /// Builder over an empty catalog
    pub fn new() -> Self {
        Self::with_config(GroupingConfig::default())
    }

    /// Builder over an empty catalog with explicit grouping limits
    pub fn with_config(config: GroupingConfig) -> Self {
        AisBuilder {
            ais: Ais::new(),
            base_generation: 0,
            config,
        }
    }

    /// Builder over a copy of a published generation
    pub fn from_published(published: &Ais, config: GroupingConfig) -> Self {
        AisBuilder {
            ais: published.clone(),
            base_generation: published.generation(),
            config,
        }
    }

    /// Read view of the catalog being built
    pub fn ais(&self) -> &Ais {
        &self.ais
    }

    /// Generation this builder was copied from
    pub fn base_generation(&self) -> u64 {
        self.base_generation
    }

    /// Grouping limits
    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    pub(crate) fn next_id(&mut self) -> u32 {
        self.ais.next_id += 1;
        self.ais.next_id
    }

    /// Drop cached HKeys of `table` and of every member of its group
    pub(crate) fn invalidate_hkeys(&mut self, table: TableId) {
        self.ais.hkeys.remove(&table);
        let members: Vec<TableId> = self
            .ais
            .group_of(table)
            .map(|g| g.tables.iter().copied().collect())
            .unwrap_or_default();
        for member in members {
            self.ais.hkeys.remove(&member);
        }
    }

    // ---- tables ----

    /// Create an empty, ungrouped table
    pub fn table(&mut self, schema: &str, name: &str) -> Result<TableId> {
        let name = TableName::new(schema, name);
        if self.ais.table_names.contains_key(&name) {
            return Err(AisError::DuplicateObject(format!("Table {}", name)));
        }
        let id = TableId(self.next_id());
        debug!("Creating table {} as {}", name, id);
        self.ais.table_names.insert(name.clone(), id);
        self.ais.tables.insert(id, Table::new(id, name));
        Ok(id)
    }

    /// Rename a table, keeping its id, UUID, columns and group
    pub fn rename_table(&mut self, table: TableId, new_name: TableName) -> Result<()> {
        let old_name = self.ais.require_table(table)?.name.clone();
        if old_name == new_name {
            return Ok(());
        }
        if self.ais.table_names.contains_key(&new_name) {
            return Err(AisError::DuplicateObject(format!("Table {}", new_name)));
        }
        info!("Renaming table {} to {}", old_name, new_name);
        self.ais.table_names.remove(&old_name);
        self.ais.table_names.insert(new_name.clone(), table);
        if let Some(t) = self.ais.tables.get_mut(&table) {
            t.name = new_name.clone();
        }
        for t in self.ais.tables.values_mut() {
            for fk in t.foreign_keys.iter_mut() {
                if fk.referenced_table == old_name {
                    fk.referenced_table = new_name.clone();
                }
            }
        }
        self.on_table_renamed(table, &old_name);
        Ok(())
    }

    /// Remove a table. It must not be the parent of any join; its own parent
    /// joins are deleted and it leaves its group, which is deleted when empty.
    pub fn drop_table(&mut self, table: TableId) -> Result<()> {
        let name = self.ais.require_table(table)?.name.clone();
        if let Some(join) = self.ais.candidate_child_joins(table).first() {
            return Err(illegal_grouping(
                format!("drop table {}", name),
                format!("it is referenced by join `{}`", join.name),
            ));
        }

        let parent_joins: Vec<JoinId> = self
            .ais
            .candidate_parent_joins(table)
            .iter()
            .map(|j| j.id)
            .collect();
        for join in parent_joins {
            if let Some(group) = self.ais.joins.get(&join).and_then(|j| j.group) {
                self.remove_join_from_group(group, join)?;
            }
            self.drop_join(join)?;
        }

        if let Some(group) = self.ais.table(table).and_then(|t| t.group) {
            self.remove_table_from_group(group, table)?;
            if self.ais.group(group).map(|g| g.is_empty()).unwrap_or(false) {
                self.delete_group(group)?;
            }
        }

        let removed = self.ais.tables.remove(&table);
        if let Some(t) = removed {
            for column in &t.columns {
                self.ais.columns.remove(column);
            }
            for index in t.primary_key.iter().chain(t.indexes.iter()) {
                self.ais.indexes.remove(index);
            }
            self.ais.table_names.remove(&t.name);
        }
        self.ais.sequences.retain(|_, s| s.owner != Some(table));
        self.ais.hkeys.remove(&table);
        info!("Dropped table {}", name);
        Ok(())
    }

    // ---- columns ----

    /// Append a plain column
    pub fn column(
        &mut self,
        table: TableId,
        name: &str,
        data_type: DataType,
        nullable: bool,
    ) -> Result<ColumnId> {
        self.add_column(table, &ColumnDefinition::new(name, data_type, nullable))
    }

    /// Append a column at the next position
    pub fn add_column(&mut self, table: TableId, definition: &ColumnDefinition) -> Result<ColumnId> {
        let t = self.ais.require_table(table)?;
        if self.ais.column_by_name(table, &definition.name).is_some() {
            return Err(AisError::DuplicateObject(format!(
                "Column {}",
                t.name.column(&definition.name)
            )));
        }
        if let Some(identity) = &definition.identity {
            if self.ais.sequence(&identity.sequence).is_none() {
                return Err(AisError::NoSuchSequence(identity.sequence.to_string()));
            }
        }
        let position = t.columns.len();
        let id = ColumnId(self.next_id());
        self.ais.columns.insert(
            id,
            Column {
                id,
                table,
                name: definition.name.clone(),
                position,
                data_type: definition.data_type,
                nullable: definition.nullable,
                default: definition.default.clone(),
                identity: definition.identity.clone(),
            },
        );
        if let Some(t) = self.ais.tables.get_mut(&table) {
            t.columns.push(id);
        }
        if let Some(identity) = &definition.identity {
            if let Some(sequence) = self.ais.sequences.get_mut(&identity.sequence) {
                sequence.owner = Some(table);
            }
        }
        Ok(id)
    }

    /// Replace a column's definition in place. The position and every index
    /// and join reference are kept; a new type is pushed into the index key
    /// descriptors that encode the column.
    pub fn modify_column(&mut self, column: ColumnId, definition: &ColumnDefinition) -> Result<()> {
        let current = self
            .ais
            .column(column)
            .cloned()
            .ok_or_else(|| AisError::NoSuchColumn("?".to_string(), column.to_string()))?;
        let table_name = self.ais.require_table(current.table)?.name.clone();

        if definition.name != current.name {
            if self.ais.column_by_name(current.table, &definition.name).is_some() {
                return Err(AisError::DuplicateObject(format!(
                    "Column {}",
                    table_name.column(&definition.name)
                )));
            }
            debug!(
                "Renaming column {} to `{}`",
                table_name.column(&current.name),
                definition.name
            );
            self.rename_foreign_key_column(current.table, &table_name, &current.name, &definition.name);
        }
        if let Some(identity) = &definition.identity {
            if self.ais.sequence(&identity.sequence).is_none() {
                return Err(AisError::NoSuchSequence(identity.sequence.to_string()));
            }
        }

        if let Some(c) = self.ais.columns.get_mut(&column) {
            c.name = definition.name.clone();
            c.data_type = definition.data_type;
            c.nullable = definition.nullable;
            c.default = definition.default.clone();
            c.identity = definition.identity.clone();
        }

        if definition.data_type != current.data_type {
            for index in self.ais.indexes.values_mut() {
                for key in index.columns.iter_mut().filter(|k| k.column == column) {
                    key.data_type = definition.data_type;
                }
            }
            self.on_column_retyped(column, definition.data_type);
        }
        Ok(())
    }

    /// Rename a column, keeping its position and references
    pub fn rename_column(&mut self, table: TableId, old_name: &str, new_name: &str) -> Result<()> {
        let column = self.ais.column_id(table, old_name)?;
        let mut definition = ColumnDefinition::from(
            self.ais
                .column(column)
                .ok_or_else(|| AisError::NoSuchColumn(self.ais.table_label(table), old_name.to_string()))?,
        );
        definition.name = new_name.to_string();
        self.modify_column(column, &definition)
    }

    fn rename_foreign_key_column(&mut self, table: TableId, table_name: &TableName, old: &str, new: &str) {
        for t in self.ais.tables.values_mut() {
            for fk in t.foreign_keys.iter_mut() {
                if t.id == table {
                    for c in fk.columns.iter_mut().filter(|c| c.as_str() == old) {
                        *c = new.to_string();
                    }
                }
                if &fk.referenced_table == table_name {
                    for c in fk.referenced_columns.iter_mut().filter(|c| c.as_str() == old) {
                        *c = new.to_string();
                    }
                }
            }
        }
    }

    /// Remove a column. Columns used by a join must be released first. Table
    /// indexes and foreign keys containing the column go with it, group
    /// indexes are maintained, and later columns shift down one position.
    pub fn drop_column(&mut self, table: TableId, name: &str) -> Result<()> {
        let column = self.ais.column_id(table, name)?;
        let table_name = self.ais.require_table(table)?.name.clone();
        if let Some(join) = self.ais.joins().find(|j| j.uses(column)) {
            return Err(illegal_grouping(
                format!("drop column {}", table_name.column(name)),
                format!("it is used by join `{}`", join.name),
            ));
        }

        let doomed: Vec<IndexId> = self
            .ais
            .indexes
            .values()
            .filter(|i| i.table == table && i.contains(column))
            .map(|i| i.id)
            .collect();
        for index in doomed {
            if let Some(removed) = self.ais.indexes.remove(&index) {
                debug!("Dropping index `{}` with column {}", removed.name, table_name.column(name));
            }
            if let Some(t) = self.ais.tables.get_mut(&table) {
                if t.primary_key == Some(index) {
                    t.primary_key = None;
                }
                t.indexes.retain(|i| *i != index);
            }
        }
        self.on_column_dropped(column);

        for t in self.ais.tables.values() {
            for fk in t.foreign_keys.iter() {
                let referencing = t.id == table && fk.columns.iter().any(|c| c == name);
                let referenced = t.id != table
                    && fk.referenced_table == table_name
                    && fk.referenced_columns.iter().any(|c| c == name);
                if referencing || referenced {
                    debug!("Dropping foreign key `{}` of {}", fk.name, t.name);
                }
            }
        }
        for t in self.ais.tables.values_mut() {
            if t.id == table {
                t.foreign_keys.retain(|fk| !fk.columns.iter().any(|c| c == name));
            } else {
                t.foreign_keys.retain(|fk| {
                    !(fk.referenced_table == table_name && fk.referenced_columns.iter().any(|c| c == name))
                });
            }
        }

        self.ais.columns.remove(&column);
        let remaining = match self.ais.tables.get_mut(&table) {
            Some(t) => {
                t.columns.retain(|c| *c != column);
                t.columns.clone()
            }
            None => Vec::new(),
        };
        for (position, id) in remaining.iter().enumerate() {
            if let Some(c) = self.ais.columns.get_mut(id) {
                c.position = position;
            }
        }
        self.invalidate_hkeys(table);
        Ok(())
    }

    // ---- indexes ----

    fn index_columns<S: AsRef<str>>(&self, table: TableId, columns: &[S]) -> Result<Vec<IndexColumn>> {
        columns
            .iter()
            .map(|name| {
                let id = self.ais.column_id(table, name.as_ref())?;
                let data_type = self
                    .ais
                    .column(id)
                    .map(|c| c.data_type)
                    .ok_or_else(|| AisError::NoSuchColumn(self.ais.table_label(table), name.as_ref().to_string()))?;
                Ok(IndexColumn { column: id, data_type, ascending: true })
            })
            .collect()
    }

    /// Declare the table's primary key
    pub fn primary_key<S: AsRef<str>>(&mut self, table: TableId, columns: &[S]) -> Result<IndexId> {
        let t = self.ais.require_table(table)?;
        if t.primary_key.is_some() {
            return Err(AisError::DuplicateObject(format!("Primary key of {}", t.name)));
        }
        let columns = self.index_columns(table, columns)?;
        let id = IndexId(self.next_id());
        self.ais.indexes.insert(
            id,
            TableIndex {
                id,
                table,
                name: "PRIMARY".to_string(),
                kind: IndexKind::Primary,
                columns,
            },
        );
        if let Some(t) = self.ais.tables.get_mut(&table) {
            t.primary_key = Some(id);
        }
        self.invalidate_hkeys(table);
        Ok(id)
    }

    /// Remove the table's primary key
    pub fn drop_primary_key(&mut self, table: TableId) -> Result<()> {
        let t = self.ais.require_table(table)?;
        let Some(pk) = t.primary_key else {
            return Err(AisError::NoSuchIndex(t.name.to_string(), "PRIMARY".to_string()));
        };
        self.ais.indexes.remove(&pk);
        if let Some(t) = self.ais.tables.get_mut(&table) {
            t.primary_key = None;
        }
        self.invalidate_hkeys(table);
        Ok(())
    }

    /// Create a secondary index
    pub fn index<S: AsRef<str>>(&mut self, table: TableId, name: &str, unique: bool, columns: &[S]) -> Result<IndexId> {
        let t = self.ais.require_table(table)?;
        if self.ais.index_by_name(table, name).is_some() {
            return Err(AisError::DuplicateObject(format!("Index `{}` on {}", name, t.name)));
        }
        let columns = self.index_columns(table, columns)?;
        let id = IndexId(self.next_id());
        self.ais.indexes.insert(
            id,
            TableIndex {
                id,
                table,
                name: name.to_string(),
                kind: if unique { IndexKind::Unique } else { IndexKind::Secondary },
                columns,
            },
        );
        if let Some(t) = self.ais.tables.get_mut(&table) {
            t.indexes.push(id);
        }
        Ok(id)
    }

    /// Drop a secondary index
    pub fn drop_index(&mut self, table: TableId, name: &str) -> Result<()> {
        let id = self
            .ais
            .index_by_name(table, name)
            .map(|i| i.id)
            .ok_or_else(|| AisError::NoSuchIndex(self.ais.table_label(table), name.to_string()))?;
        self.ais.indexes.remove(&id);
        if let Some(t) = self.ais.tables.get_mut(&table) {
            t.indexes.retain(|i| *i != id);
        }
        Ok(())
    }

    /// Replace the table's ordinary foreign keys
    pub fn set_foreign_keys(&mut self, table: TableId, foreign_keys: Vec<ForeignKeyDefinition>) -> Result<()> {
        self.ais.require_table(table)?;
        if let Some(t) = self.ais.tables.get_mut(&table) {
            t.foreign_keys = foreign_keys;
        }
        Ok(())
    }

    // ---- sequences ----

    /// Create a sequence
    pub fn sequence(&mut self, schema: &str, name: &str, start: i64, increment: i64) -> Result<()> {
        let name = QualifiedName::new(schema, name);
        if self.ais.sequences.contains_key(&name) {
            return Err(AisError::DuplicateObject(format!("Sequence {}", name)));
        }
        self.ais.sequences.insert(
            name.clone(),
            Sequence { name, start, increment, owner: None },
        );
        Ok(())
    }

    // ---- joins ----

    /// Declare an ungrouped join. `columns` pairs (parent column, child
    /// column); a pair whose types fall in different categories fails at once.
    pub fn join<S: AsRef<str>>(
        &mut self,
        name: &str,
        parent: TableId,
        child: TableId,
        columns: &[(S, S)],
    ) -> Result<JoinId> {
        self.ais.require_table(parent)?;
        self.ais.require_table(child)?;
        if self.ais.join_by_name(name).is_some() {
            return Err(AisError::DuplicateObject(format!("Join `{}`", name)));
        }
        let mut pairs = Vec::with_capacity(columns.len());
        for (parent_name, child_name) in columns {
            let parent_column = self.ais.column_id(parent, parent_name.as_ref())?;
            let child_column = self.ais.column_id(child, child_name.as_ref())?;
            let parent_type = self.ais.column(parent_column).map(|c| c.data_type);
            let child_type = self.ais.column(child_column).map(|c| c.data_type);
            if let (Some(parent_type), Some(child_type)) = (parent_type, child_type) {
                if !child_type.joinable_with(&parent_type) {
                    return Err(AisError::JoinColumnTypesMismatch {
                        child: self.ais.column_label(child_column),
                        child_type: child_type.to_string(),
                        parent: self.ais.column_label(parent_column),
                        parent_type: parent_type.to_string(),
                    });
                }
            }
            pairs.push(JoinColumn { parent: parent_column, child: child_column });
        }
        let id = JoinId(self.next_id());
        debug!(
            "Creating join `{}` from {} to {}",
            name,
            self.ais.table_label(parent),
            self.ais.table_label(child)
        );
        self.ais.joins.insert(
            id,
            Join {
                id,
                name: name.to_string(),
                parent,
                child,
                columns: pairs,
                group: None,
                position: 0,
            },
        );
        Ok(id)
    }

    /// Delete an ungrouped join
    pub fn drop_join(&mut self, join: JoinId) -> Result<()> {
        let j = self.ais.require_join(join)?;
        if j.is_grouped() {
            return Err(illegal_grouping(
                format!("drop join `{}`", j.name),
                "it still belongs to a group",
            ));
        }
        self.ais.joins.remove(&join);
        Ok(())
    }

    /// Rename a join constraint
    pub fn rename_join(&mut self, join: JoinId, name: &str) -> Result<()> {
        self.ais.require_join(join)?;
        if self.ais.joins.values().any(|j| j.id != join && j.name == name) {
            return Err(AisError::DuplicateObject(format!("Join `{}`", name)));
        }
        if let Some(j) = self.ais.joins.get_mut(&join) {
            j.name = name.to_string();
        }
        Ok(())
    }

    // ---- hkeys and publishing ----

    /// HKey of `table`, computed and cached on first use
    pub fn hkey(&mut self, table: TableId) -> Result<HKey> {
        if let Some(cached) = self.ais.hkeys.get(&table) {
            return Ok(cached.clone());
        }
        let computed = hkey::compute_hkey(&self.ais, table)?;
        self.ais.hkeys.insert(table, computed.clone());
        Ok(computed)
    }

    /// Validate the grouping, compute every HKey and produce the next
    /// immutable generation
    pub fn freeze(mut self) -> Result<Ais> {
        self.grouping_is_complete()?;
        let tables: BTreeSet<TableId> = self.ais.tables.keys().copied().collect();
        for table in tables {
            self.hkey(table)?;
        }
        self.ais.generation = self.base_generation + 1;
        self.ais.published_at = Some(Utc::now());
        info!(
            "Froze catalog generation {} with {} tables in {} groups",
            self.ais.generation,
            self.ais.tables.len(),
            self.ais.groups.len()
        );
        Ok(self.ais)
    }
}
