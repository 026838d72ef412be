//! Change-level classification
//!
//! Compares two definitions of one table plus the ALTER's column and index
//! change descriptors and returns the most disruptive [`ChangeLevel`] any of
//! the changes needs. The result tells the executor how much the storage
//! layer has to do: nothing, a constraint check, an index build, a table
//! rewrite, or a group reorganization.

use std::collections::{BTreeMap, BTreeSet};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::{illegal_grouping, AisError, Result};
use crate::models::{ColumnDefinition, ForeignKeyDefinition};
use crate::schema::{ChangeType, GroupingReference, TableChange, TableDefinition};

/// How disruptive a table change is, least to most
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChangeLevel {
    /// Nothing changed
    None,
    /// Catalog only
    Metadata,
    /// Catalog only, but existing rows must be checked against a new
    /// constraint
    MetadataConstraint,
    /// Table indexes must be built or dropped
    Index,
    /// Rows of the table must be rewritten
    Table,
    /// Rows of one or more groups must be reorganized
    Group,
}

impl ChangeLevel {
    /// Whether the storage layer has to look at existing data
    pub fn touches_data(self) -> bool {
        self >= ChangeLevel::MetadataConstraint
    }
}

struct Classifier<'a> {
    old: &'a TableDefinition,
    new: &'a TableDefinition,
    renames: BTreeMap<&'a str, &'a str>,
    key_columns: BTreeSet<&'a str>,
    level: ChangeLevel,
}

impl<'a> Classifier<'a> {
    fn new(old: &'a TableDefinition, new: &'a TableDefinition, column_changes: &'a [TableChange]) -> Self {
        let renames = column_changes
            .iter()
            .filter(|c| c.change_type == ChangeType::Modify)
            .filter_map(|c| Some((c.old_name.as_deref()?, c.new_name.as_deref()?)))
            .collect();

        let mut key_columns: BTreeSet<&str> = old.primary_key.iter().map(String::as_str).collect();
        if let Some(grouping) = &old.grouping {
            key_columns.extend(grouping.columns.iter().map(|c| c.child.as_str()));
        }
        for child in &old.children {
            key_columns.extend(child.parent_columns.iter().map(String::as_str));
        }

        Classifier {
            old,
            new,
            renames,
            key_columns,
            level: ChangeLevel::None,
        }
    }

    fn raise(&mut self, level: ChangeLevel, why: &str) {
        if level > self.level {
            debug!("{}: {} raises change level to {:?}", self.new.name, why, level);
            self.level = level;
        }
    }

    fn renamed<'s>(&self, old_name: &'s str) -> &'s str
    where
        'a: 's,
    {
        self.renames.get(old_name).copied().unwrap_or(old_name)
    }

    fn mapped(&self, columns: &'a [String]) -> Vec<&'a str> {
        columns.iter().map(|c| self.renamed(c.as_str())).collect()
    }

    fn check_primary_key(&mut self) {
        let old = self.mapped(&self.old.primary_key);
        let new: Vec<&str> = self.new.primary_key.iter().map(String::as_str).collect();
        if old != new {
            let why = match (old.is_empty(), new.is_empty()) {
                (true, false) => "primary key added",
                (false, true) => "primary key dropped",
                _ => "primary key redefined",
            };
            self.raise(ChangeLevel::Group, why);
        }
    }

    fn check_grouping(&mut self) {
        match (&self.old.grouping, &self.new.grouping) {
            (None, None) => {}
            (None, Some(_)) => self.raise(ChangeLevel::Group, "grouping foreign key added"),
            (Some(_), None) => self.raise(ChangeLevel::Group, "grouping foreign key dropped"),
            (Some(old), Some(new)) => {
                if !self.same_grouping(old, new) {
                    self.raise(ChangeLevel::Group, "grouping foreign key redefined");
                } else if old.name != new.name {
                    self.raise(ChangeLevel::Metadata, "grouping foreign key renamed");
                }
            }
        }
    }

    fn same_grouping(&self, old: &GroupingReference, new: &GroupingReference) -> bool {
        old.parent == new.parent
            && old.columns.len() == new.columns.len()
            && old.columns.iter().zip(new.columns.iter()).all(|(o, n)| {
                o.parent == n.parent && self.renamed(o.child.as_str()) == n.child
            })
    }

    fn check_column(&mut self, change: &TableChange) -> Result<()> {
        match change.change_type {
            ChangeType::Add => {
                let name = self.new_name(change)?;
                let column = self.new_column(name)?;
                if column.nullable {
                    self.raise(ChangeLevel::Metadata, "nullable column added");
                } else if column.default.is_some() || column.identity.is_some() {
                    self.raise(ChangeLevel::Table, "NOT NULL column with default added");
                } else {
                    self.raise(ChangeLevel::MetadataConstraint, "NOT NULL column added");
                }
            }
            ChangeType::Drop => {
                let name = self.old_name(change)?;
                self.old_column(name)?;
                if self.key_columns.contains(name) {
                    self.raise(ChangeLevel::Group, "key column dropped");
                } else {
                    self.raise(ChangeLevel::Table, "column dropped");
                }
            }
            ChangeType::Modify => {
                let old_name = self.old_name(change)?;
                let new_name = self.new_name(change)?;
                let old = self.old_column(old_name)?.clone();
                let new = self.new_column(new_name)?.clone();

                if old.data_type != new.data_type {
                    if self.key_columns.contains(old_name) {
                        self.raise(ChangeLevel::Group, "key column retyped");
                    } else if old.data_type.encoding_changes_to(&new.data_type) {
                        self.raise(ChangeLevel::Table, "column retyped");
                    } else {
                        self.raise(ChangeLevel::Metadata, "column retyped without re-encoding");
                    }
                }
                if old.nullable && !new.nullable {
                    self.raise(ChangeLevel::MetadataConstraint, "SET NOT NULL");
                } else if !old.nullable && new.nullable {
                    self.raise(ChangeLevel::Metadata, "DROP NOT NULL");
                }
                if old.name != new.name {
                    self.raise(ChangeLevel::Metadata, "column renamed");
                }
                if old.default != new.default || old.identity != new.identity {
                    self.raise(ChangeLevel::Metadata, "default changed");
                }
            }
        }
        Ok(())
    }

    fn check_index(&mut self, change: &TableChange) -> Result<()> {
        match change.change_type {
            ChangeType::Add => {
                let name = self.new_name(change)?;
                self.require_index(self.new, name)?;
            }
            ChangeType::Drop => {
                let name = self.old_name(change)?;
                self.require_index(self.old, name)?;
            }
            ChangeType::Modify => {
                let old_name = self.old_name(change)?;
                let new_name = self.new_name(change)?;
                self.require_index(self.old, old_name)?;
                self.require_index(self.new, new_name)?;
                let old = self.old.find_index(old_name);
                let new = self.new.find_index(new_name);
                let same_keys = match (old, new) {
                    (Some(o), Some(n)) => o.unique == n.unique && self.mapped(&o.columns) == n.columns.iter().map(String::as_str).collect::<Vec<_>>(),
                    _ => false,
                };
                if same_keys {
                    self.raise(ChangeLevel::Metadata, "index renamed");
                    return Ok(());
                }
            }
        }
        self.raise(ChangeLevel::Index, "table index changed");
        Ok(())
    }

    fn check_foreign_keys(&mut self) {
        let old: BTreeMap<&str, &ForeignKeyDefinition> =
            self.old.foreign_keys.iter().map(|fk| (fk.name.as_str(), fk)).collect();
        let new: BTreeMap<&str, &ForeignKeyDefinition> =
            self.new.foreign_keys.iter().map(|fk| (fk.name.as_str(), fk)).collect();

        for (name, fk) in &new {
            match old.get(name) {
                None => self.raise(ChangeLevel::MetadataConstraint, "foreign key added"),
                Some(previous) => {
                    let same = self.mapped(&previous.columns)
                        == fk.columns.iter().map(String::as_str).collect::<Vec<_>>()
                        && previous.referenced_table == fk.referenced_table
                        && previous.referenced_columns == fk.referenced_columns;
                    if !same {
                        self.raise(ChangeLevel::MetadataConstraint, "foreign key redefined");
                    }
                }
            }
        }
        if old.keys().any(|name| !new.contains_key(name)) {
            self.raise(ChangeLevel::Metadata, "foreign key dropped");
        }
    }

    fn old_name<'c>(&self, change: &'c TableChange) -> Result<&'c str> {
        change.old_name.as_deref().ok_or_else(|| {
            illegal_grouping(
                format!("classify {:?} change on {}", change.change_type, self.old.name),
                "the descriptor has no old name",
            )
        })
    }

    fn new_name<'c>(&self, change: &'c TableChange) -> Result<&'c str> {
        change.new_name.as_deref().ok_or_else(|| {
            illegal_grouping(
                format!("classify {:?} change on {}", change.change_type, self.new.name),
                "the descriptor has no new name",
            )
        })
    }

    fn old_column(&self, name: &str) -> Result<&'a ColumnDefinition> {
        self.old
            .find_column(name)
            .ok_or_else(|| AisError::NoSuchColumn(self.old.name.to_string(), name.to_string()))
    }

    fn new_column(&self, name: &str) -> Result<&'a ColumnDefinition> {
        self.new
            .find_column(name)
            .ok_or_else(|| AisError::NoSuchColumn(self.new.name.to_string(), name.to_string()))
    }

    fn require_index(&self, definition: &TableDefinition, name: &str) -> Result<()> {
        match definition.find_index(name) {
            Some(_) => Ok(()),
            None => Err(AisError::NoSuchIndex(definition.name.to_string(), name.to_string())),
        }
    }
}

/// Classify an ALTER of one table from `old` to `new`.
///
/// `column_changes` and `index_changes` describe what the statement did,
/// by name; a descriptor naming something absent from the definition it
/// refers to is a usage error. Several changes yield the most disruptive
/// level among them.
pub fn classify(
    old: &TableDefinition,
    new: &TableDefinition,
    column_changes: &[TableChange],
    index_changes: &[TableChange],
) -> Result<ChangeLevel> {
    let mut classifier = Classifier::new(old, new, column_changes);

    if old.name != new.name {
        classifier.raise(ChangeLevel::Metadata, "table renamed");
    }
    classifier.check_primary_key();
    classifier.check_grouping();
    for change in column_changes {
        classifier.check_column(change)?;
    }
    for change in index_changes {
        classifier.check_index(change)?;
    }
    classifier.check_foreign_keys();

    debug!("Classified change of {} as {:?}", old.name, classifier.level);
    Ok(classifier.level)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::models::{DataType, QualifiedName, TableName};
    use crate::schema::ChildReference;
    use proptest::prelude::*;
    use rstest::rstest;

    fn order() -> TableDefinition {
        let mut def = TableDefinition::new("s", "order")
            .column(ColumnDefinition::new("oid", DataType::Int, false))
            .column(ColumnDefinition::new("cid", DataType::Int, false))
            .column(ColumnDefinition::new("odate", DataType::Date, true))
            .column(ColumnDefinition::new("note", DataType::Varchar(32), true))
            .column(ColumnDefinition::new("memo", DataType::Varchar(32), true))
            .column(ColumnDefinition::new("qty", DataType::Int, true))
            .column(ColumnDefinition::new("status", DataType::Char(1), false))
            .primary_key(&["oid"])
            .index("by_date", false, &["odate"])
            .grouped_under("co", TableName::new("s", "customer"), &[("cid", "cid")]);
        def.children.push(ChildReference {
            child: TableName::new("s", "item"),
            parent_columns: vec!["oid".to_string()],
        });
        def
    }

    fn column_mut<'d>(def: &'d mut TableDefinition, name: &str) -> &'d mut ColumnDefinition {
        def.columns.iter_mut().find(|c| c.name == name).unwrap()
    }

    fn status_fk() -> ForeignKeyDefinition {
        ForeignKeyDefinition {
            name: "fk_status".into(),
            columns: vec!["status".into()],
            referenced_table: QualifiedName::new("s", "status"),
            referenced_columns: vec!["code".into()],
        }
    }

    /// Apply one named edit to `def`, recording its descriptors
    fn edit(name: &str, def: &mut TableDefinition, columns: &mut Vec<TableChange>, indexes: &mut Vec<TableChange>) {
        match name {
            "nothing" => {}
            "rename_table" => def.name = TableName::new("s", "orders"),
            "rename_column" => {
                column_mut(def, "note").name = "remark".into();
                columns.push(TableChange::modify("note", "remark"));
            }
            "rename_key_column" => {
                column_mut(def, "oid").name = "order_id".into();
                def.primary_key = vec!["order_id".into()];
                columns.push(TableChange::modify("oid", "order_id"));
            }
            "default" => {
                column_mut(def, "qty").default = Some("1".into());
                columns.push(TableChange::modify("qty", "qty"));
            }
            "add_nullable" => {
                def.columns.push(ColumnDefinition::new("extra", DataType::Text, true));
                columns.push(TableChange::add("extra"));
            }
            "widen_varchar" => {
                column_mut(def, "memo").data_type = DataType::Varchar(64);
                columns.push(TableChange::modify("memo", "memo"));
            }
            "drop_not_null" => {
                column_mut(def, "status").nullable = true;
                columns.push(TableChange::modify("status", "status"));
            }
            "set_not_null" => {
                column_mut(def, "odate").nullable = false;
                columns.push(TableChange::modify("odate", "odate"));
            }
            "add_not_null" => {
                def.columns.push(ColumnDefinition::new("flag", DataType::Boolean, false));
                columns.push(TableChange::add("flag"));
            }
            "add_foreign_key" => def.foreign_keys.push(status_fk()),
            "add_index" => {
                def.indexes.push(crate::schema::IndexDefinition {
                    name: "by_status".into(),
                    unique: false,
                    columns: vec!["status".into()],
                });
                indexes.push(TableChange::add("by_status"));
            }
            "drop_index" => {
                def.indexes.retain(|i| i.name != "by_date");
                indexes.push(TableChange::drop("by_date"));
            }
            "drop_column" => {
                def.columns.retain(|c| c.name != "qty");
                columns.push(TableChange::drop("qty"));
            }
            "retype_column" => {
                column_mut(def, "qty").data_type = DataType::BigInt;
                columns.push(TableChange::modify("qty", "qty"));
            }
            "add_not_null_default" => {
                def.columns
                    .push(ColumnDefinition::new("prio", DataType::Int, false).with_default("0"));
                columns.push(TableChange::add("prio"));
            }
            "drop_grouping_column" => {
                def.columns.retain(|c| c.name != "cid");
                def.grouping = None;
                columns.push(TableChange::drop("cid"));
            }
            "drop_grouping" => def.grouping = None,
            "retype_grouping_column" => {
                column_mut(def, "cid").data_type = DataType::BigInt;
                columns.push(TableChange::modify("cid", "cid"));
            }
            "retype_pk" => {
                column_mut(def, "oid").data_type = DataType::BigInt;
                columns.push(TableChange::modify("oid", "oid"));
            }
            "redefine_pk" => def.primary_key = vec!["oid".into(), "odate".into()],
            other => panic!("unknown edit {}", other),
        }
    }

    fn edited(names: &[&str]) -> (TableDefinition, Vec<TableChange>, Vec<TableChange>) {
        let mut def = order();
        let mut columns = Vec::new();
        let mut indexes = Vec::new();
        for name in names {
            edit(name, &mut def, &mut columns, &mut indexes);
        }
        (def, columns, indexes)
    }

    #[rstest]
    #[case("nothing", ChangeLevel::None)]
    #[case("rename_table", ChangeLevel::Metadata)]
    #[case("rename_column", ChangeLevel::Metadata)]
    #[case("rename_key_column", ChangeLevel::Metadata)]
    #[case("default", ChangeLevel::Metadata)]
    #[case("add_nullable", ChangeLevel::Metadata)]
    #[case("widen_varchar", ChangeLevel::Metadata)]
    #[case("drop_not_null", ChangeLevel::Metadata)]
    #[case("set_not_null", ChangeLevel::MetadataConstraint)]
    #[case("add_not_null", ChangeLevel::MetadataConstraint)]
    #[case("add_foreign_key", ChangeLevel::MetadataConstraint)]
    #[case("add_index", ChangeLevel::Index)]
    #[case("drop_index", ChangeLevel::Index)]
    #[case("drop_column", ChangeLevel::Table)]
    #[case("retype_column", ChangeLevel::Table)]
    #[case("add_not_null_default", ChangeLevel::Table)]
    #[case("drop_grouping_column", ChangeLevel::Group)]
    #[case("drop_grouping", ChangeLevel::Group)]
    #[case("retype_grouping_column", ChangeLevel::Group)]
    #[case("retype_pk", ChangeLevel::Group)]
    #[case("redefine_pk", ChangeLevel::Group)]
    fn test_classify(#[case] name: &str, #[case] expected: ChangeLevel) {
        let old = order();
        let (new, columns, indexes) = edited(&[name]);
        assert_eq!(classify(&old, &new, &columns, &indexes).unwrap(), expected);
    }

    #[test]
    fn test_several_changes_take_the_maximum() {
        let old = order();
        let (new, columns, indexes) = edited(&["rename_column", "add_index", "set_not_null"]);
        assert_eq!(classify(&old, &new, &columns, &indexes).unwrap(), ChangeLevel::Index);
    }

    #[test]
    fn test_unknown_names_are_usage_errors() {
        let old = order();
        let new = order();
        let err = classify(&old, &new, &[TableChange::drop("nope")], &[]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoSuchObject);

        let err = classify(&old, &new, &[], &[TableChange::add("nope")]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::NoSuchObject);

        let broken = TableChange {
            change_type: ChangeType::Drop,
            old_name: None,
            new_name: None,
        };
        let err = classify(&old, &new, &[broken], &[]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::IllegalGroupingOperation);
    }

    #[test]
    fn test_dropping_foreign_key_is_metadata() {
        let mut old = order();
        old.foreign_keys.push(status_fk());
        let new = order();
        assert_eq!(classify(&old, &new, &[], &[]).unwrap(), ChangeLevel::Metadata);
    }

    #[test]
    fn test_levels_are_ordered() {
        assert!(ChangeLevel::None < ChangeLevel::Metadata);
        assert!(ChangeLevel::Metadata < ChangeLevel::MetadataConstraint);
        assert!(ChangeLevel::MetadataConstraint < ChangeLevel::Index);
        assert!(ChangeLevel::Index < ChangeLevel::Table);
        assert!(ChangeLevel::Table < ChangeLevel::Group);
        assert!(!ChangeLevel::Metadata.touches_data());
        assert!(ChangeLevel::MetadataConstraint.touches_data());
    }

    // Edits of `order()` touching disjoint columns, so any subset composes
    const EDITS: [&str; 10] = [
        "rename_column",
        "drop_column",
        "set_not_null",
        "add_nullable",
        "widen_varchar",
        "add_index",
        "add_foreign_key",
        "add_not_null_default",
        "drop_grouping",
        "rename_table",
    ];

    fn selected(mask: &[bool]) -> Vec<&'static str> {
        EDITS
            .iter()
            .zip(mask)
            .filter(|(_, chosen)| **chosen)
            .map(|(name, _)| *name)
            .collect()
    }

    proptest! {
        #[test]
        fn prop_classify_union_is_max(
            a in prop::collection::vec(any::<bool>(), EDITS.len()),
            b in prop::collection::vec(any::<bool>(), EDITS.len()),
        ) {
            let old = order();
            let union: Vec<bool> = a.iter().zip(&b).map(|(x, y)| *x || *y).collect();
            let level = |mask: &[bool]| {
                let (new, columns, indexes) = edited(&selected(mask));
                classify(&old, &new, &columns, &indexes).unwrap()
            };
            prop_assert_eq!(level(&union), level(&a).max(level(&b)));
        }
    }
}
