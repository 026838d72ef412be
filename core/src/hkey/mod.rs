//! Hierarchical keys
//!
//! A table's HKey has one segment per table on the path from the group root
//! down to the table. The table starts from a copy of its parent's HKey in
//! which every column the parent join maps is replaced by the child's join
//! column, then appends the primary key columns not already present. With a
//! cascading primary key the inherited columns therefore appear once, in the
//! ancestor's segment.

mod equivalence;

pub use equivalence::equivalent_columns;

use std::fmt::Write as _;
use serde::{Serialize, Deserialize};

use crate::ais::Ais;
use crate::error::{illegal_grouping, AisError, Result};
use crate::models::{ColumnId, Join, TableId};

/// One column of an HKey segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HKeyColumn {
    /// Column supplying the value in the HKey's table or an ancestor
    pub column: ColumnId,

    /// Position within the whole HKey
    pub position: usize,

    /// Columns of the HKey's table and its descendants carrying the same
    /// value, starting with `column` itself
    pub equivalent_columns: Vec<ColumnId>,
}

/// Columns contributed by one table of the path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HKeySegment {
    /// Table the segment identifies rows of
    pub table: TableId,

    /// Key columns of the segment
    pub columns: Vec<HKeyColumn>,

    /// The table has no primary key; storage appends a generated row id
    pub row_id: bool,
}

/// Hierarchical key of a table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HKey {
    /// Table the key belongs to
    pub table: TableId,

    /// Segments from the group root down to `table`
    pub segments: Vec<HKeySegment>,
}

impl HKey {
    /// All columns in key order
    pub fn columns(&self) -> impl Iterator<Item = &HKeyColumn> {
        self.segments.iter().flat_map(|s| s.columns.iter())
    }

    /// Number of key columns
    pub fn column_count(&self) -> usize {
        self.segments.iter().map(|s| s.columns.len()).sum()
    }

    /// Segment of `table`, if it is on the path
    pub fn segment_for(&self, table: TableId) -> Option<&HKeySegment> {
        self.segments.iter().find(|s| s.table == table)
    }

    /// Readable form, e.g. ``[`s`.`customer`: `cid`][`s`.`order`: `oid`]``
    pub fn describe(&self, ais: &Ais) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            let columns: Vec<String> = segment
                .columns
                .iter()
                .map(|c| ais.column_label(c.column))
                .collect();
            let _ = write!(out, "[{}: {}", ais.table_label(segment.table), columns.join(", "));
            if segment.row_id {
                out.push_str(" +row_id");
            }
            out.push(']');
        }
        out
    }
}

/// Child-side join columns of a sibling branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiblingColumns {
    /// Child table off the path
    pub table: TableId,

    /// Its join columns in parent key order
    pub columns: Vec<ColumnId>,
}

/// Segment of a branch HKey
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSegment {
    /// Table of the segment
    pub table: TableId,

    /// Same columns as the HKey segment
    pub columns: Vec<HKeyColumn>,

    /// Columns of the segment table's other children carrying its key
    pub sibling_columns: Vec<SiblingColumns>,
}

/// HKey annotated with the columns other branches use for the same values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchHKey {
    /// Table the key belongs to
    pub table: TableId,

    /// Segments from the group root down to `table`
    pub segments: Vec<BranchSegment>,
}

/// Check that the join's columns line up, in order, with the parent's
/// primary key
pub fn check_join_columns(ais: &Ais, join: &Join) -> Result<()> {
    let parent_pk = ais.primary_key_columns(join.parent);
    if parent_pk.is_empty() {
        return Err(AisError::JoinToParentWithoutPk {
            child: ais.table_label(join.child),
            parent: ais.table_label(join.parent),
        });
    }
    let len = parent_pk.len().max(join.columns.len());
    for i in 0..len {
        let pair = join.columns.get(i);
        let pk_column = parent_pk.get(i);
        if pair.map(|jc| jc.parent) != pk_column.copied() {
            return Err(AisError::JoinToWrongColumns {
                child_table: ais.table_label(join.child),
                child_column: pair
                    .map(|jc| ais.column_name(jc.child))
                    .unwrap_or_else(|| "(none)".to_string()),
                parent_table: ais.table_label(join.parent),
                parent_column: pk_column
                    .map(|c| ais.column_name(*c))
                    .unwrap_or_else(|| "(none)".to_string()),
            });
        }
    }
    Ok(())
}

/// Compute the HKey of `table` from its primary key and parent joins
pub fn compute_hkey(ais: &Ais, table: TableId) -> Result<HKey> {
    ais.require_table(table)?;
    let path = ais.ancestor_path(table).ok_or_else(|| {
        illegal_grouping(
            format!("compute hkey of {}", ais.table_label(table)),
            "parent joins form a cycle",
        )
    })?;

    // Columns only; equivalences are filled in once the layout is fixed
    let mut segments: Vec<(TableId, Vec<ColumnId>, bool)> = Vec::new();
    for (depth, current) in path.iter().copied().enumerate() {
        if depth > 0 {
            let join = ais.parent_join(current).ok_or_else(|| {
                AisError::NoSuchJoin(format!("parent join of {}", ais.table_label(current)))
            })?;
            check_join_columns(ais, join)?;
            for (_, columns, _) in segments.iter_mut() {
                for column in columns.iter_mut() {
                    if let Some(child_column) = join.matching_child(*column) {
                        *column = child_column;
                    }
                }
            }
        }
        let used: Vec<ColumnId> = segments
            .iter()
            .flat_map(|(_, columns, _)| columns.iter().copied())
            .collect();
        let pk = ais.primary_key_columns(current);
        let own: Vec<ColumnId> = pk.iter().copied().filter(|c| !used.contains(c)).collect();
        segments.push((current, own, pk.is_empty()));
    }

    let mut position = 0;
    let segments = segments
        .into_iter()
        .map(|(segment_table, columns, row_id)| HKeySegment {
            table: segment_table,
            columns: columns
                .into_iter()
                .map(|column| {
                    let hkey_column = HKeyColumn {
                        column,
                        position,
                        equivalent_columns: equivalent_columns(ais, column, table),
                    };
                    position += 1;
                    hkey_column
                })
                .collect(),
            row_id,
        })
        .collect();

    Ok(HKey { table, segments })
}

/// Compute the branch HKey of `table`: its HKey with every ancestor segment
/// annotated with the join columns of that ancestor's children off the path
pub fn compute_branch_hkey(ais: &Ais, table: TableId) -> Result<BranchHKey> {
    let hkey = compute_hkey(ais, table)?;
    let path: Vec<TableId> = hkey.segments.iter().map(|s| s.table).collect();

    let segments = hkey
        .segments
        .into_iter()
        .enumerate()
        .map(|(i, segment)| {
            let next_on_path = path.get(i + 1).copied();
            let sibling_columns = match next_on_path {
                Some(next) => ais
                    .child_joins(segment.table)
                    .into_iter()
                    .filter(|j| j.child != next)
                    .map(|j| SiblingColumns {
                        table: j.child,
                        columns: j.columns.iter().map(|jc| jc.child).collect(),
                    })
                    .collect(),
                None => Vec::new(),
            };
            BranchSegment {
                table: segment.table,
                columns: segment.columns,
                sibling_columns,
            }
        })
        .collect();

    Ok(BranchHKey { table, segments })
}

#[cfg(test)]
mod tests;
