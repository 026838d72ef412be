//! Bulk import of table definitions
//!
//! Loads a batch of [`TableDefinition`]s into a copy of a published catalog.
//! Parents are loaded before their children whatever order the batch is in,
//! and every table is placed with the ordinary grouping calls, so the result
//! is exactly what the same DDL issued one statement at a time would give.

use std::collections::BTreeSet;

use log::{debug, info};

use super::ddl::TableDefinition;
use crate::ais::{Ais, AisBuilder};
use crate::config::GroupingConfig;
use crate::error::{illegal_grouping, AisError, Result};
use crate::models::{TableId, TableName};

/// Create the table described by `definition` and place it in the grouping:
/// under its parent's group when it has a grouping reference, otherwise as
/// the root of a new group named after it.
pub fn add_table_definition(builder: &mut AisBuilder, definition: &TableDefinition) -> Result<TableId> {
    let name = &definition.name;
    let table = builder.table(&name.schema, &name.name)?;
    for column in &definition.columns {
        builder.add_column(table, column)?;
    }
    if !definition.primary_key.is_empty() {
        builder.primary_key(table, &definition.primary_key)?;
    }
    for index in &definition.indexes {
        builder.index(table, &index.name, index.unique, &index.columns)?;
    }
    builder.set_foreign_keys(table, definition.foreign_keys.clone())?;

    match &definition.grouping {
        Some(grouping) => {
            let parent = builder.ais().table_id(&grouping.parent.schema, &grouping.parent.name)?;
            let pairs: Vec<(&str, &str)> = grouping
                .columns
                .iter()
                .map(|c| (c.parent.as_str(), c.child.as_str()))
                .collect();
            let join = builder.join(&grouping.name, parent, table, &pairs)?;
            let group = builder.ais().table(parent).and_then(|t| t.group).ok_or_else(|| {
                illegal_grouping(
                    format!("group {} under {}", name, grouping.parent),
                    "the parent is not in a group",
                )
            })?;
            let position = builder.ais().child_joins(parent).len() as u32;
            builder.add_join_to_group(group, join, position)?;
            debug!("Added {} under {} in group {}", name, grouping.parent, group);
        }
        None => {
            let group = builder.create_group(&name.name, &name.schema)?;
            builder.add_table_to_group(group, table)?;
            debug!("Added {} as root of its own group", name);
        }
    }
    Ok(table)
}

/// Merge of a batch of definitions into a published catalog
#[derive(Debug)]
pub struct AisMerge<'a> {
    base: &'a Ais,
    definitions: Vec<TableDefinition>,
    config: GroupingConfig,
}

impl<'a> AisMerge<'a> {
    /// Merge `definitions` into a copy of `base`
    pub fn new(base: &'a Ais, definitions: Vec<TableDefinition>, config: GroupingConfig) -> Self {
        AisMerge { base, definitions, config }
    }

    /// Load every definition, parents first, and validate the result. The
    /// returned builder is ready to be published.
    pub fn merge(self) -> Result<AisBuilder> {
        let mut builder = AisBuilder::from_published(self.base, self.config);
        let batch: BTreeSet<TableName> = self.definitions.iter().map(|d| d.name.clone()).collect();
        let mut pending = self.definitions;

        while !pending.is_empty() {
            let (ready, waiting): (Vec<TableDefinition>, Vec<TableDefinition>) =
                pending.into_iter().partition(|definition| match &definition.grouping {
                    Some(grouping) => builder.ais().table_by_name(&grouping.parent).is_some(),
                    None => true,
                });

            if ready.is_empty() {
                for definition in &waiting {
                    if let Some(grouping) = &definition.grouping {
                        if !batch.contains(&grouping.parent) {
                            return Err(AisError::NoSuchTable(grouping.parent.to_string()));
                        }
                    }
                }
                let names: Vec<String> = waiting.iter().map(|d| d.name.to_string()).collect();
                return Err(illegal_grouping(
                    "merge table definitions",
                    format!("grouping references form a cycle through {}", names.join(", ")),
                ));
            }

            for definition in &ready {
                add_table_definition(&mut builder, definition)?;
            }
            pending = waiting;
        }

        builder.grouping_is_complete()?;
        info!(
            "Merged {} table definition(s) into generation {}",
            batch.len(),
            builder.base_generation()
        );
        Ok(builder)
    }
}
