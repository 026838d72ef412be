//! Group builder and mutator operations
//!
//! These calls only keep the membership bookkeeping consistent. Whether the
//! result is a forest of well formed trees is decided later, in one pass, by
//! [`AisBuilder::grouping_is_complete`].

use std::collections::BTreeSet;

use log::{debug, info, warn};

use super::builder::AisBuilder;
use super::validator::{GroupingValidator, ValidationFailures};
use crate::error::{illegal_grouping, AisError, Result};
use crate::models::{Group, GroupId, GroupName, JoinId, TableId};

impl AisBuilder {
    /// Create an empty group called `schema`.`name`
    pub fn create_group(&mut self, name: &str, schema: &str) -> Result<GroupId> {
        let name = GroupName::new(schema, name);
        if self.ais.group_by_name(&name).is_some() {
            return Err(AisError::DuplicateObject(format!("Group {}", name)));
        }
        let id = GroupId(self.next_id());
        debug!("Creating group {} as {}", name, id);
        self.ais.groups.insert(id, Group::new(id, name));
        Ok(id)
    }

    /// Put an ungrouped table into a group, as its root or as a member still
    /// waiting for its parent join
    pub fn add_table_to_group(&mut self, group: GroupId, table: TableId) -> Result<()> {
        let group_name = self.ais.require_group(group)?.name.clone();
        let t = self.ais.require_table(table)?;
        if let Some(current) = t.group {
            return Err(illegal_grouping(
                format!("add table {} to group {}", t.name, group_name),
                format!("it already belongs to group {}", self.group_label(current)),
            ));
        }
        debug!("Adding table {} to group {}", t.name, group_name);
        self.set_table_group(table, Some(group));
        self.invalidate_hkeys(table);
        Ok(())
    }

    /// Make a join part of a group. Ungrouped endpoints join the group with
    /// it; an endpoint already in another group is refused.
    pub fn add_join_to_group(&mut self, group: GroupId, join: JoinId, position_hint: u32) -> Result<()> {
        let group_name = self.ais.require_group(group)?.name.clone();
        let j = self.ais.require_join(join)?.clone();
        let operation = format!("add join `{}` to group {}", j.name, group_name);
        if let Some(current) = j.group {
            return Err(illegal_grouping(
                operation,
                format!("it already belongs to group {}", self.group_label(current)),
            ));
        }
        for endpoint in [j.parent, j.child] {
            let t = self.ais.require_table(endpoint)?;
            if let Some(current) = t.group {
                if current != group {
                    return Err(illegal_grouping(
                        operation,
                        format!(
                            "table {} belongs to group {}",
                            t.name,
                            self.group_label(current)
                        ),
                    ));
                }
            }
        }

        debug!("Adding join `{}` to group {} at position {}", j.name, group_name, position_hint);
        if let Some(edge) = self.ais.joins.get_mut(&join) {
            edge.group = Some(group);
            edge.position = position_hint;
        }
        for endpoint in [j.parent, j.child] {
            if self.ais.table(endpoint).and_then(|t| t.group).is_none() {
                self.set_table_group(endpoint, Some(group));
            }
        }
        self.invalidate_hkeys(j.child);
        Ok(())
    }

    /// Take a join out of its group. The child and everything below it leave
    /// the group too and stay ungrouped until regrouped.
    pub fn remove_join_from_group(&mut self, group: GroupId, join: JoinId) -> Result<()> {
        let group_name = self.ais.require_group(group)?.name.clone();
        let j = self.ais.require_join(join)?.clone();
        if j.group != Some(group) {
            return Err(illegal_grouping(
                format!("remove join `{}` from group {}", j.name, group_name),
                "the join is not part of that group",
            ));
        }

        let mut subtree = vec![j.child];
        subtree.extend(self.ais.descendants(j.child));
        self.invalidate_hkeys(j.child);
        for table in &subtree {
            self.on_table_dropped(*table);
        }

        if let Some(edge) = self.ais.joins.get_mut(&join) {
            edge.group = None;
        }
        let members: BTreeSet<TableId> = subtree.iter().copied().collect();
        for edge in self.ais.joins.values_mut() {
            if edge.group == Some(group) && members.contains(&edge.child) {
                edge.group = None;
            }
        }
        for table in &subtree {
            self.set_table_group(*table, None);
        }
        info!(
            "Removed join `{}` from group {}; {} table(s) left the group",
            j.name,
            group_name,
            subtree.len()
        );
        Ok(())
    }

    /// Move `subtree_root` and all of its descendants into `target`. The
    /// subtree's own parent join leaves its group. With `via_join` the subtree
    /// hangs off that join's parent in `target`, otherwise it becomes a new
    /// root there.
    pub fn move_tree_to_group(
        &mut self,
        subtree_root: TableId,
        target: GroupId,
        via_join: Option<JoinId>,
    ) -> Result<()> {
        let target_name = self.ais.require_group(target)?.name.clone();
        let root_name = self.ais.require_table(subtree_root)?.name.clone();
        let operation = format!("move tree {} to group {}", root_name, target_name);

        let mut subtree = vec![subtree_root];
        subtree.extend(self.ais.descendants(subtree_root));
        let members: BTreeSet<TableId> = subtree.iter().copied().collect();

        if let Some(via) = via_join {
            let v = self.ais.require_join(via)?;
            if v.child != subtree_root {
                return Err(illegal_grouping(
                    operation,
                    format!("join `{}` does not reference {}", v.name, root_name),
                ));
            }
            if members.contains(&v.parent) {
                return Err(illegal_grouping(
                    operation,
                    format!("join `{}` would close a cycle", v.name),
                ));
            }
            let parent_group = self.ais.table(v.parent).and_then(|t| t.group);
            if parent_group != Some(target) {
                return Err(illegal_grouping(
                    operation,
                    format!("parent {} of join `{}` is not in that group", self.ais.table_label(v.parent), v.name),
                ));
            }
            if let Some(current) = v.group {
                let detaching_own_parent = self.ais.parent_join(subtree_root).map(|j| j.id) == Some(via);
                if !detaching_own_parent {
                    return Err(illegal_grouping(
                        operation,
                        format!("join `{}` already belongs to group {}", v.name, self.group_label(current)),
                    ));
                }
            }
        }

        let source = self.ais.table(subtree_root).and_then(|t| t.group);
        self.invalidate_hkeys(subtree_root);

        // Index hooks need the subtree still attached to its old parent.
        if let Some(source) = source.filter(|s| *s != target) {
            self.on_tree_moving(source, target, &members);
            for table in &subtree {
                self.on_table_dropped(*table);
            }
        }

        if let Some(parent_join) = self.ais.parent_join(subtree_root).map(|j| j.id) {
            if let Some(edge) = self.ais.joins.get_mut(&parent_join) {
                edge.group = None;
            }
        }

        if source != Some(target) {
            for edge in self.ais.joins.values_mut() {
                if edge.is_grouped() && members.contains(&edge.child) && members.contains(&edge.parent) {
                    edge.group = Some(target);
                }
            }
            for table in &subtree {
                self.set_table_group(*table, None);
                self.set_table_group(*table, Some(target));
            }
        }

        if let Some(via) = via_join {
            if let Some(edge) = self.ais.joins.get_mut(&via) {
                edge.group = Some(target);
            }
        }
        self.invalidate_hkeys(subtree_root);
        info!(
            "Moved {} table(s) rooted at {} into group {}",
            subtree.len(),
            root_name,
            target_name
        );
        Ok(())
    }

    /// Take a childless table out of its group, together with its parent join
    pub fn remove_table_from_group(&mut self, group: GroupId, table: TableId) -> Result<()> {
        let group_name = self.ais.require_group(group)?.name.clone();
        let t = self.ais.require_table(table)?;
        let operation = format!("remove table {} from group {}", t.name, group_name);
        if t.group != Some(group) {
            return Err(illegal_grouping(operation, "the table is not in that group"));
        }
        if let Some(child) = self.ais.child_joins(table).first() {
            return Err(illegal_grouping(
                operation,
                format!("it still has child join `{}`", child.name),
            ));
        }
        self.invalidate_hkeys(table);
        self.on_table_dropped(table);
        if let Some(parent_join) = self.ais.parent_join(table).map(|j| j.id) {
            if let Some(edge) = self.ais.joins.get_mut(&parent_join) {
                edge.group = None;
            }
        }
        self.set_table_group(table, None);
        debug!("Removed table {} from group {}", self.ais.table_label(table), group_name);
        Ok(())
    }

    /// Delete an empty group
    pub fn delete_group(&mut self, group: GroupId) -> Result<()> {
        let g = self.ais.require_group(group)?;
        if !g.is_empty() {
            return Err(illegal_grouping(
                format!("delete group {}", g.name),
                format!("it still has {} member table(s)", g.tables.len()),
            ));
        }
        debug!("Deleting group {}", g.name);
        self.ais.groups.remove(&group);
        Ok(())
    }

    /// Detach every table and join from every group and delete the groups.
    /// Joins themselves are kept so the grouping can be rebuilt.
    pub fn clear_groupings(&mut self) {
        let lost: usize = self.ais.groups.values().map(|g| g.indexes.len()).sum();
        if lost > 0 {
            warn!("Clearing groupings drops {} group index(es)", lost);
        }
        for table in self.ais.tables.values_mut() {
            table.group = None;
        }
        for join in self.ais.joins.values_mut() {
            join.group = None;
        }
        self.ais.groups.clear();
        self.ais.hkeys.clear();
        info!("Cleared all groupings");
    }

    /// Split the child side of a grouped join into its own group, named after
    /// the child, and delete the join. Returns the new group.
    pub fn detach_child(&mut self, join: JoinId) -> Result<GroupId> {
        let j = self.ais.require_join(join)?.clone();
        let child_name = self.ais.require_table(j.child)?.name.clone();
        let group = self.create_group(&child_name.name, &child_name.schema)?;
        match j.group {
            Some(_) => self.move_tree_to_group(j.child, group, None)?,
            None => {
                if self.ais.table(j.child).and_then(|t| t.group).is_none() {
                    self.add_table_to_group(group, j.child)?;
                }
            }
        }
        self.drop_join(join)?;
        info!("Split {} off into group {}", child_name, child_name);
        Ok(group)
    }

    /// Collect every structural problem of the current grouping
    pub fn validate_grouping(&self) -> ValidationFailures {
        GroupingValidator::new(&self.ais, self.config()).validate()
    }

    /// Validate the grouping and, when it is sound, refresh every HKey
    pub fn grouping_is_complete(&mut self) -> Result<()> {
        let failures = self.validate_grouping();
        if !failures.is_empty() {
            warn!("Grouping is incomplete: {} failure(s)", failures.len());
            return Err(failures.into());
        }
        let tables: Vec<TableId> = self.ais.tables().map(|t| t.id).collect();
        for table in tables {
            self.hkey(table)?;
        }
        Ok(())
    }

    fn set_table_group(&mut self, table: TableId, group: Option<GroupId>) {
        let previous = self.ais.tables.get(&table).and_then(|t| t.group);
        if let Some(previous) = previous {
            if let Some(g) = self.ais.groups.get_mut(&previous) {
                g.tables.remove(&table);
            }
        }
        if let Some(group) = group {
            if let Some(g) = self.ais.groups.get_mut(&group) {
                g.tables.insert(table);
            }
        }
        if let Some(t) = self.ais.tables.get_mut(&table) {
            t.group = group;
        }
    }

    fn group_label(&self, group: GroupId) -> String {
        self.ais
            .group(group)
            .map(|g| g.name.to_string())
            .unwrap_or_else(|| group.to_string())
    }
}
