//! Grouping validation
//!
//! The builder lets a catalog pass through states that are not a forest of
//! trees. This validator walks the whole catalog once and reports every
//! structural problem it finds instead of stopping at the first one.

use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::Ais;
use crate::config::GroupingConfig;
use crate::error::ErrorCode;
use crate::group_index::{covering_path, Coverage};
use crate::hkey::check_join_columns;
use crate::models::{Group, GroupName, Table, TableName};

/// Objects a failure is about
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureContext {
    /// Table involved
    pub table: Option<TableName>,
    /// Column name involved
    pub column: Option<String>,
    /// Group involved
    pub group: Option<GroupName>,
    /// Group index name involved
    pub index: Option<String>,
}

/// One structural problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationFailure {
    /// Stable code
    pub code: ErrorCode,
    /// Human readable message
    pub message: String,
    /// What the failure is about
    pub context: FailureContext,
}

impl Display for ValidationFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Every failure found by one validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{}", join_messages(.0))]
pub struct ValidationFailures(Vec<ValidationFailure>);

fn join_messages(failures: &[ValidationFailure]) -> String {
    failures
        .iter()
        .map(|f| f.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ValidationFailures {
    /// No failures
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of failures
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Failures in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &ValidationFailure> {
        self.0.iter()
    }

    /// First failure, if any
    pub fn first(&self) -> Option<&ValidationFailure> {
        self.0.first()
    }

    /// Record a failure
    pub fn push(&mut self, failure: ValidationFailure) {
        self.0.push(failure);
    }

    /// Codes of all failures in discovery order
    pub fn codes(&self) -> Vec<ErrorCode> {
        self.0.iter().map(|f| f.code).collect()
    }

    /// Number of failures with `code`
    pub fn count(&self, code: ErrorCode) -> usize {
        self.0.iter().filter(|f| f.code == code).count()
    }
}

/// Walks a catalog and collects grouping failures
#[derive(Debug)]
pub struct GroupingValidator<'a> {
    ais: &'a Ais,
    config: &'a GroupingConfig,
    failures: ValidationFailures,
}

impl<'a> GroupingValidator<'a> {
    /// Validator over `ais`
    pub fn new(ais: &'a Ais, config: &'a GroupingConfig) -> Self {
        GroupingValidator {
            ais,
            config,
            failures: ValidationFailures::default(),
        }
    }

    /// Run every check
    pub fn validate(mut self) -> ValidationFailures {
        let ais = self.ais;
        for table in ais.tables() {
            self.check_columns(table);
            self.check_membership(table);
        }
        self.check_joins();
        for group in ais.groups() {
            self.check_tree(group);
            self.check_group_indexes(group);
        }
        self.failures
    }

    fn fail(&mut self, code: ErrorCode, message: String, context: FailureContext) {
        self.failures.push(ValidationFailure { code, message, context });
    }

    fn check_columns(&mut self, table: &Table) {
        let ais = self.ais;
        let columns = ais.columns_of(table.id);
        for (expected, column) in columns.iter().enumerate() {
            if column.position != expected {
                self.fail(
                    ErrorCode::ColumnPositionGap,
                    format!(
                        "Column {} is at position {} but should be at {}",
                        table.name.column(&column.name),
                        column.position,
                        expected
                    ),
                    FailureContext {
                        table: Some(table.name.clone()),
                        column: Some(column.name.clone()),
                        ..Default::default()
                    },
                );
            }
        }
        for column in ais.primary_key_columns(table.id) {
            let Some(c) = ais.column(column) else { continue };
            if c.nullable {
                self.fail(
                    ErrorCode::PrimaryKeyNullColumn,
                    format!("Primary key column {} is nullable", table.name.column(&c.name)),
                    FailureContext {
                        table: Some(table.name.clone()),
                        column: Some(c.name.clone()),
                        ..Default::default()
                    },
                );
            }
        }
    }

    fn check_membership(&mut self, table: &Table) {
        let context = FailureContext {
            table: Some(table.name.clone()),
            ..Default::default()
        };
        if table.group.is_none() {
            self.fail(
                ErrorCode::TableNotInGroup,
                format!("Table {} is not in any group", table.name),
                context.clone(),
            );
        }
        let ais = self.ais;
        let parents = ais.parent_joins(table.id);
        if parents.len() > 1 {
            let names: Vec<String> = parents.iter().map(|j| format!("`{}`", j.name)).collect();
            self.fail(
                ErrorCode::MultipleParents,
                format!(
                    "Table {} has {} parent joins: {}",
                    table.name,
                    parents.len(),
                    names.join(", ")
                ),
                context,
            );
        }
    }

    fn check_joins(&mut self) {
        let ais = self.ais;
        for join in ais.joins().filter(|j| j.is_grouped()) {
            let child_name = ais.table(join.child).map(|t| t.name.clone());
            if let Err(err) = check_join_columns(ais, join) {
                self.fail(
                    err.code(),
                    err.to_string(),
                    FailureContext {
                        table: child_name.clone(),
                        ..Default::default()
                    },
                );
            }
            let parent_group = ais.table(join.parent).and_then(|t| t.group);
            let child_group = ais.table(join.child).and_then(|t| t.group);
            if parent_group != join.group || child_group != join.group {
                self.fail(
                    ErrorCode::JoinGroupMismatch,
                    format!(
                        "Join `{}` from {} to {} does not belong to the group of both tables",
                        join.name,
                        ais.table_label(join.parent),
                        ais.table_label(join.child)
                    ),
                    FailureContext {
                        table: child_name,
                        group: join.group.and_then(|g| ais.group(g)).map(|g| g.name.clone()),
                        ..Default::default()
                    },
                );
            }
        }
    }

    fn check_tree(&mut self, group: &Group) {
        let ais = self.ais;
        let context = FailureContext {
            group: Some(group.name.clone()),
            ..Default::default()
        };

        let in_cycle: BTreeSet<_> = group
            .tables
            .iter()
            .copied()
            .filter(|t| ais.ancestor_path(*t).is_none())
            .collect();
        if !in_cycle.is_empty() {
            let names: Vec<String> = in_cycle.iter().map(|t| ais.table_label(*t)).collect();
            self.fail(
                ErrorCode::GroupCycle,
                format!("Group {} has a join cycle through {}", group.name, names.join(", ")),
                context.clone(),
            );
            return;
        }

        let root = ais.group_root(group.id);
        for orphan in ais.parentless_members(group.id) {
            if Some(orphan) == root {
                continue;
            }
            self.fail(
                ErrorCode::OrphanTable,
                format!(
                    "Table {} is in group {} but has no parent join in it",
                    ais.table_label(orphan),
                    group.name
                ),
                FailureContext {
                    table: ais.table(orphan).map(|t| t.name.clone()),
                    ..context.clone()
                },
            );
        }

        let deepest = group
            .tables
            .iter()
            .filter_map(|t| ais.depth(*t))
            .max()
            .unwrap_or(0);
        if deepest + 1 > self.config.max_group_depth {
            self.fail(
                ErrorCode::GroupTooDeep,
                format!(
                    "Group {} is {} levels deep, the limit is {}",
                    group.name,
                    deepest + 1,
                    self.config.max_group_depth
                ),
                context,
            );
        }
    }

    fn check_group_indexes(&mut self, group: &Group) {
        let ais = self.ais;
        for index in group.indexes.values() {
            let context = FailureContext {
                group: Some(group.name.clone()),
                index: Some(index.name.clone()),
                ..Default::default()
            };
            let mut tables = BTreeSet::new();
            let mut outside = false;
            for key in &index.columns {
                let Some(table) = ais.column(key.column).map(|c| c.table) else {
                    continue;
                };
                if !group.tables.contains(&table) {
                    outside = true;
                    self.fail(
                        ErrorCode::GroupIndexTableNotInGroup,
                        format!(
                            "Group index `{}` uses column {} outside group {}",
                            index.name,
                            ais.column_label(key.column),
                            group.name
                        ),
                        context.clone(),
                    );
                }
                tables.insert(table);
            }
            if outside {
                continue;
            }
            if let Some(Coverage::Branching { at }) = covering_path(ais, &tables) {
                self.fail(
                    ErrorCode::BranchingGroupIndex,
                    format!(
                        "Group index `{}` branches at table {}",
                        index.name,
                        ais.table_label(at)
                    ),
                    context,
                );
            }
        }
    }
}
