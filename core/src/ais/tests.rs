use proptest::prelude::*;
use rstest::rstest;

use super::*;
use crate::config::GroupingConfig;
use crate::error::ErrorCode;
use crate::models::{DataType, GroupName, JoinType};
use crate::testing::{caoi, Caoi};

fn keyed_table(builder: &mut AisBuilder, name: &str) -> TableId {
    let table = builder.table("s", name).unwrap();
    builder.column(table, "id", DataType::Int, false).unwrap();
    builder.primary_key(table, &["id"]).unwrap();
    table
}

fn join_id(builder: &AisBuilder, name: &str) -> JoinId {
    builder.ais().join_by_name(name).unwrap().id
}

#[test]
fn test_ungrouped_tables_are_all_reported() {
    let mut builder = AisBuilder::new();
    for name in ["a", "b", "c"] {
        keyed_table(&mut builder, name);
    }

    let failures = builder.validate_grouping();
    assert_eq!(failures.count(ErrorCode::TableNotInGroup), 3);
    assert_eq!(failures.len(), 3);
    let first = failures.first().unwrap();
    assert_eq!(first.message, "Table `s`.`a` is not in any group");
    assert_eq!(first.to_string(), "[50010] Table `s`.`a` is not in any group");
    assert_eq!(first.context.table, Some(TableName::new("s", "a")));

    let err = builder.grouping_is_complete().unwrap_err();
    assert_eq!(err.code(), ErrorCode::TableNotInGroup);
    assert_eq!(
        err.to_string(),
        "Table `s`.`a` is not in any group; Table `s`.`b` is not in any group; Table `s`.`c` is not in any group"
    );
}

#[rstest]
fn test_second_parent_join(caoi: Caoi) {
    let Caoi { mut builder, group, address, item, .. } = caoi;
    let ai = builder.join("ai", address, item, &[("aid", "iid")]).unwrap();
    builder.add_join_to_group(group, ai, 0).unwrap();

    let failures = builder.validate_grouping();
    assert_eq!(failures.codes(), vec![ErrorCode::MultipleParents]);
    assert_eq!(
        failures.first().unwrap().message,
        "Table `s`.`item` has 2 parent joins: `oi`, `ai`"
    );
}

#[test]
fn test_cycle_is_reported_once() {
    let mut builder = AisBuilder::new();
    let a = keyed_table(&mut builder, "a");
    let b = keyed_table(&mut builder, "b");
    let group = builder.create_group("a", "s").unwrap();
    builder.add_table_to_group(group, a).unwrap();
    let ab = builder.join("ab", a, b, &[("id", "id")]).unwrap();
    let ba = builder.join("ba", b, a, &[("id", "id")]).unwrap();
    builder.add_join_to_group(group, ab, 0).unwrap();
    builder.add_join_to_group(group, ba, 0).unwrap();

    let failures = builder.validate_grouping();
    assert_eq!(failures.codes(), vec![ErrorCode::GroupCycle]);
    assert_eq!(builder.ais().ancestor_path(a), None);
}

#[rstest]
fn test_member_without_parent_join(caoi: Caoi) {
    let Caoi { mut builder, group, customer, .. } = caoi;
    let loose = keyed_table(&mut builder, "loose");
    builder.add_table_to_group(group, loose).unwrap();

    let failures = builder.validate_grouping();
    assert_eq!(failures.codes(), vec![ErrorCode::OrphanTable]);
    assert_eq!(failures.first().unwrap().context.table, Some(TableName::new("s", "loose")));
    assert_eq!(builder.ais().group_root(group), Some(customer));
}

#[rstest]
fn test_depth_limit(caoi: Caoi) {
    let Caoi { builder, .. } = caoi;
    let config = GroupingConfig { max_group_depth: 2, ..Default::default() };

    let failures = GroupingValidator::new(builder.ais(), &config).validate();
    assert_eq!(failures.codes(), vec![ErrorCode::GroupTooDeep]);
    assert_eq!(
        failures.first().unwrap().message,
        "Group `s`.`customer` is 3 levels deep, the limit is 2"
    );

    let config = GroupingConfig { max_group_depth: 3, ..Default::default() };
    assert!(GroupingValidator::new(builder.ais(), &config).validate().is_empty());
}

#[test]
fn test_nullable_primary_key() {
    let mut builder = AisBuilder::new();
    let table = builder.table("s", "t").unwrap();
    builder.column(table, "id", DataType::Int, true).unwrap();
    builder.primary_key(table, &["id"]).unwrap();
    let group = builder.create_group("t", "s").unwrap();
    builder.add_table_to_group(group, table).unwrap();

    let failures = builder.validate_grouping();
    assert_eq!(failures.codes(), vec![ErrorCode::PrimaryKeyNullColumn]);
    assert_eq!(failures.first().unwrap().context.column.as_deref(), Some("id"));
}

#[rstest]
fn test_removed_join_takes_subtree_along(caoi: Caoi) {
    let Caoi { mut builder, group, order, item, .. } = caoi;
    let co = join_id(&builder, "co");
    builder.remove_join_from_group(group, co).unwrap();

    let ais = builder.ais();
    assert_eq!(ais.table(order).unwrap().group, None);
    assert_eq!(ais.table(item).unwrap().group, None);
    assert!(!ais.join(join_id(&builder, "oi")).unwrap().is_grouped());
    assert_eq!(builder.validate_grouping().count(ErrorCode::TableNotInGroup), 2);

    let err = builder.remove_join_from_group(group, co).unwrap_err();
    assert_eq!(err.code(), ErrorCode::IllegalGroupingOperation);

    builder.add_join_to_group(group, co, 0).unwrap();
    let oi = join_id(&builder, "oi");
    builder.add_join_to_group(group, oi, 0).unwrap();
    assert!(builder.validate_grouping().is_empty());
}

#[rstest]
fn test_detach_and_move_back(caoi: Caoi) {
    let Caoi { mut builder, group, customer, address, .. } = caoi;
    let split = builder.detach_child(join_id(&builder, "ca")).unwrap();
    assert_eq!(builder.ais().group(split).unwrap().name, GroupName::new("s", "address"));
    assert!(builder.ais().join_by_name("ca").is_none());
    assert!(builder.validate_grouping().is_empty());

    let back = builder.join("ca2", customer, address, &[("cid", "cid")]).unwrap();
    let err = builder.add_join_to_group(group, back, 1).unwrap_err();
    assert_eq!(err.code(), ErrorCode::IllegalGroupingOperation);

    let co = join_id(&builder, "co");
    let err = builder.move_tree_to_group(address, group, Some(co)).unwrap_err();
    assert_eq!(err.code(), ErrorCode::IllegalGroupingOperation);

    builder.move_tree_to_group(address, group, Some(back)).unwrap();
    assert!(builder.ais().group(split).unwrap().is_empty());
    builder.delete_group(split).unwrap();
    assert_eq!(builder.ais().parent_of(address), Some(customer));
    assert!(builder.validate_grouping().is_empty());
}

#[rstest]
fn test_usage_errors(caoi: Caoi) {
    let Caoi { mut builder, group, order, item, .. } = caoi;

    let err = builder.delete_group(group).unwrap_err();
    assert_eq!(err.code(), ErrorCode::IllegalGroupingOperation);

    let err = builder.drop_column(item, "oid").unwrap_err();
    assert_eq!(err.code(), ErrorCode::IllegalGroupingOperation);

    let err = builder.remove_table_from_group(group, order).unwrap_err();
    assert_eq!(err.code(), ErrorCode::IllegalGroupingOperation);

    let err = builder.create_group("customer", "s").unwrap_err();
    assert_eq!(err.code(), ErrorCode::DuplicateObject);

    let err = builder.join("bad", order, item, &[("odate", "sku")]).unwrap_err();
    assert_eq!(err.code(), ErrorCode::JoinColumnTypesMismatch);

    builder.remove_table_from_group(group, item).unwrap();
    assert_eq!(builder.ais().table(item).unwrap().group, None);
}

#[rstest]
fn test_published_generation_round_trips(caoi: Caoi) {
    let Caoi { builder, item, .. } = caoi;
    let ais = builder.freeze().unwrap();
    assert_eq!(ais.generation(), 1);

    let restored = Ais::from_bytes(&ais.to_bytes().unwrap()).unwrap();
    assert_eq!(restored.generation(), 1);
    assert_eq!(restored.hkey(item), ais.hkey(item));
    assert_eq!(
        restored.grouping_fingerprint().unwrap(),
        ais.grouping_fingerprint().unwrap()
    );
    assert_eq!(restored.group_tables_in_order(restored.groups().next().unwrap().id).len(), 4);
}

#[rstest]
fn test_clear_groupings(caoi: Caoi) {
    let Caoi { mut builder, group, customer, item, .. } = caoi;
    builder
        .create_group_index(group, "name_sku", JoinType::Left, &[(customer, "name"), (item, "sku")])
        .unwrap();

    builder.clear_groupings();
    let ais = builder.ais();
    assert_eq!(ais.groups().count(), 0);
    assert!(ais.joins().all(|j| !j.is_grouped()));
    assert_eq!(ais.joins().count(), 3);
    assert_eq!(builder.validate_grouping().count(ErrorCode::TableNotInGroup), 4);
}

proptest! {
    #[test]
    fn prop_regrouping_order_does_not_matter(order in Just(vec![0usize, 1, 2]).prop_shuffle()) {
        let Caoi { mut builder, customer, .. } = caoi();
        let before = builder.ais().grouping_fingerprint().unwrap();

        builder.clear_groupings();
        let group = builder.create_group("customer", "s").unwrap();
        builder.add_table_to_group(group, customer).unwrap();
        let joins = [("co", 0), ("oi", 0), ("ca", 1)];
        for i in order {
            let (name, position) = joins[i];
            let join = join_id(&builder, name);
            builder.add_join_to_group(group, join, position).unwrap();
        }

        prop_assert!(builder.validate_grouping().is_empty());
        prop_assert_eq!(builder.ais().grouping_fingerprint().unwrap(), before);
    }
}
