//! Equivalent columns of an HKey column
//!
//! Two columns are equivalent when a chain of grouped join pairs says they
//! carry the same value. The search stays inside the HKey's table and its
//! descendants (plus the starting column's own table), so storage can find
//! the physical column holding an ancestor's key in any descendant row.

use std::collections::{HashSet, VecDeque};

use crate::ais::Ais;
use crate::models::{ColumnId, TableId};

/// Columns equivalent to `column` within the subtree rooted at `scope`, in
/// breadth-first discovery order starting with `column`
pub fn equivalent_columns(ais: &Ais, column: ColumnId, scope: TableId) -> Vec<ColumnId> {
    let mut tables: HashSet<TableId> = ais.descendants(scope).into_iter().collect();
    tables.insert(scope);
    if let Some(c) = ais.column(column) {
        tables.insert(c.table);
    }

    let mut result = vec![column];
    let mut seen = HashSet::from([column]);
    let mut queue = VecDeque::from([column]);
    while let Some(current) = queue.pop_front() {
        let Some(owner) = ais.column(current).map(|c| c.table) else {
            continue;
        };
        let mut neighbours = Vec::new();
        if let Some(join) = ais.parent_join(owner) {
            if tables.contains(&join.parent) {
                neighbours.extend(join.matching_parent(current));
            }
        }
        for join in ais.child_joins(owner) {
            if tables.contains(&join.child) {
                neighbours.extend(join.matching_child(current));
            }
        }
        for next in neighbours {
            if seen.insert(next) {
                result.push(next);
                queue.push_back(next);
            }
        }
    }
    result
}
