use rstest::rstest;

use super::*;
use crate::error::ErrorCode;
use crate::models::DataType;
use crate::testing::{caoi, cascading_caoi, Caoi};

fn labels(ais: &Ais, columns: &[ColumnId]) -> Vec<String> {
    columns.iter().map(|c| ais.column_label(*c)).collect()
}

#[rstest]
fn test_non_cascading_hkeys(caoi: Caoi) {
    let Caoi { mut builder, customer, order, item, .. } = caoi;

    let key = builder.hkey(customer).unwrap();
    assert_eq!(key.describe(builder.ais()), "[`s`.`customer`: `s`.`customer`.`cid`]");

    let key = builder.hkey(order).unwrap();
    assert_eq!(
        key.describe(builder.ais()),
        "[`s`.`customer`: `s`.`order`.`cid`][`s`.`order`: `s`.`order`.`oid`]"
    );

    let key = builder.hkey(item).unwrap();
    assert_eq!(
        key.describe(builder.ais()),
        "[`s`.`customer`: `s`.`order`.`cid`][`s`.`order`: `s`.`item`.`oid`][`s`.`item`: `s`.`item`.`iid`]"
    );
    assert_eq!(key.column_count(), 3);
    let positions: Vec<usize> = key.columns().map(|c| c.position).collect();
    assert_eq!(positions, vec![0, 1, 2]);
}

#[rstest]
fn test_cascading_hkeys(cascading_caoi: Caoi) {
    let Caoi { mut builder, order, item, address, .. } = cascading_caoi;

    let key = builder.hkey(order).unwrap();
    assert_eq!(
        key.describe(builder.ais()),
        "[`s`.`customer`: `s`.`order`.`cid`][`s`.`order`: `s`.`order`.`oid`]"
    );

    let key = builder.hkey(item).unwrap();
    assert_eq!(
        key.describe(builder.ais()),
        "[`s`.`customer`: `s`.`item`.`cid`][`s`.`order`: `s`.`item`.`oid`][`s`.`item`: `s`.`item`.`iid`]"
    );

    let key = builder.hkey(address).unwrap();
    assert_eq!(
        key.describe(builder.ais()),
        "[`s`.`customer`: `s`.`address`.`cid`][`s`.`address`: `s`.`address`.`aid`]"
    );
}

#[rstest]
fn test_root_key_equivalences_follow_sibling_order(caoi: Caoi) {
    let Caoi { mut builder, customer, .. } = caoi;
    let key = builder.hkey(customer).unwrap();
    let ais = builder.ais();
    let first = key.columns().next().unwrap();
    assert_eq!(
        labels(ais, &first.equivalent_columns),
        vec!["`s`.`customer`.`cid`", "`s`.`order`.`cid`", "`s`.`address`.`cid`"]
    );
}

#[rstest]
fn test_equivalences_stay_inside_scope(caoi: Caoi) {
    let Caoi { mut builder, item, .. } = caoi;
    let key = builder.hkey(item).unwrap();
    let ais = builder.ais();
    let columns: Vec<&HKeyColumn> = key.columns().collect();
    assert_eq!(labels(ais, &columns[0].equivalent_columns), vec!["`s`.`order`.`cid`"]);
    assert_eq!(labels(ais, &columns[1].equivalent_columns), vec!["`s`.`item`.`oid`"]);
}

#[rstest]
fn test_equivalence_is_reflexive_and_symmetric(cascading_caoi: Caoi) {
    let Caoi { builder, customer, .. } = cascading_caoi;
    let ais = builder.ais();
    let all: Vec<ColumnId> = ais
        .tables()
        .flat_map(|t| ais.columns_of(t.id).into_iter().map(|c| c.id))
        .collect();
    for column in &all {
        let equivalent = equivalent_columns(ais, *column, customer);
        assert_eq!(equivalent.first(), Some(column));
        for other in &equivalent {
            assert!(
                equivalent_columns(ais, *other, customer).contains(column),
                "{} -> {} is not symmetric",
                ais.column_label(*column),
                ais.column_label(*other)
            );
        }
    }
}

#[rstest]
fn test_cascading_item_cid_is_equivalent_along_the_path(cascading_caoi: Caoi) {
    let Caoi { builder, customer, item, .. } = cascading_caoi;
    let ais = builder.ais();
    let cid = ais.column_id(item, "cid").unwrap();
    assert_eq!(
        labels(ais, &equivalent_columns(ais, cid, customer)),
        vec![
            "`s`.`item`.`cid`",
            "`s`.`order`.`cid`",
            "`s`.`customer`.`cid`",
            "`s`.`address`.`cid`"
        ]
    );
}

#[rstest]
fn test_branch_hkey_lists_off_path_children(caoi: Caoi) {
    let Caoi { builder, item, address, .. } = caoi;
    let ais = builder.ais();
    let branch = ais.branch_hkey(item).unwrap();
    assert_eq!(branch.segments.len(), 3);
    assert_eq!(branch.segments[0].sibling_columns.len(), 1);
    assert_eq!(branch.segments[0].sibling_columns[0].table, address);
    assert_eq!(
        labels(ais, &branch.segments[0].sibling_columns[0].columns),
        vec!["`s`.`address`.`cid`"]
    );
    assert!(branch.segments[1].sibling_columns.is_empty());
    assert!(branch.segments[2].sibling_columns.is_empty());
}

#[rstest]
fn test_table_without_pk_gets_row_id(caoi: Caoi) {
    let Caoi { mut builder, group, customer, .. } = caoi;
    let note = builder.table("s", "note").unwrap();
    builder.column(note, "cid", DataType::Int, false).unwrap();
    builder.column(note, "body", DataType::Text, true).unwrap();
    let join = builder.join("cn", customer, note, &[("cid", "cid")]).unwrap();
    builder.add_join_to_group(group, join, 2).unwrap();

    let key = builder.hkey(note).unwrap();
    assert_eq!(key.segments.len(), 2);
    assert!(key.segments[1].columns.is_empty());
    assert!(key.segments[1].row_id);
    assert_eq!(
        key.describe(builder.ais()),
        "[`s`.`customer`: `s`.`note`.`cid`][`s`.`note`:  +row_id]"
    );
}

#[rstest]
fn test_join_to_non_key_column(caoi: Caoi) {
    let Caoi { mut builder, group, customer, .. } = caoi;
    let child = builder.table("s", "child").unwrap();
    builder.column(child, "id", DataType::Int, false).unwrap();
    builder.column(child, "nk", DataType::Varchar(32), true).unwrap();
    builder.primary_key(child, &["id"]).unwrap();
    let join = builder.join("bad", customer, child, &[("name", "nk")]).unwrap();
    builder.add_join_to_group(group, join, 3).unwrap();

    let err = builder.hkey(child).unwrap_err();
    assert_eq!(err.code(), ErrorCode::JoinToWrongColumns);
    assert_eq!(
        err.to_string(),
        "Table `s`.`child` join reference part `nk` does not match `s`.`customer` primary key part `cid`"
    );
}

#[rstest]
fn test_join_to_parent_without_pk(caoi: Caoi) {
    let Caoi { mut builder, .. } = caoi;
    let parent = builder.table("s", "heap").unwrap();
    builder.column(parent, "x", DataType::Int, false).unwrap();
    let child = builder.table("s", "leaf").unwrap();
    builder.column(child, "x", DataType::Int, false).unwrap();
    let join = builder.join("hl", parent, child, &[("x", "x")]).unwrap();

    let err = check_join_columns(builder.ais(), builder.ais().join(join).unwrap()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::JoinToParentWithoutPk);
}

#[rstest]
fn test_cache_is_invalidated_by_key_change(caoi: Caoi) {
    let Caoi { mut builder, order, item, .. } = caoi;
    let before = builder.hkey(item).unwrap();

    builder.drop_primary_key(item).unwrap();
    builder.primary_key(item, &["iid", "sku"]).unwrap();
    let after = builder.hkey(item).unwrap();
    assert_ne!(before, after);
    assert_eq!(after.column_count(), 4);
    assert_eq!(builder.hkey(order).unwrap().column_count(), 2);
}
