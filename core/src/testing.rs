//! Shared test fixtures

use rstest::fixture;

use crate::ais::AisBuilder;
use crate::models::{DataType, GroupId, TableId};

/// customer -> order -> item, customer -> address, all grouped under
/// `s`.`customer`, with non-cascading keys
pub(crate) struct Caoi {
    pub builder: AisBuilder,
    pub group: GroupId,
    pub customer: TableId,
    pub order: TableId,
    pub item: TableId,
    pub address: TableId,
}

#[fixture]
pub(crate) fn caoi() -> Caoi {
    let mut builder = AisBuilder::new();

    let customer = builder.table("s", "customer").unwrap();
    builder.column(customer, "cid", DataType::Int, false).unwrap();
    builder.column(customer, "name", DataType::Varchar(32), true).unwrap();
    builder.primary_key(customer, &["cid"]).unwrap();

    let order = builder.table("s", "order").unwrap();
    builder.column(order, "oid", DataType::Int, false).unwrap();
    builder.column(order, "cid", DataType::Int, false).unwrap();
    builder.column(order, "odate", DataType::Date, true).unwrap();
    builder.primary_key(order, &["oid"]).unwrap();

    let item = builder.table("s", "item").unwrap();
    builder.column(item, "iid", DataType::Int, false).unwrap();
    builder.column(item, "oid", DataType::Int, false).unwrap();
    builder.column(item, "sku", DataType::Varchar(16), true).unwrap();
    builder.primary_key(item, &["iid"]).unwrap();

    let address = builder.table("s", "address").unwrap();
    builder.column(address, "aid", DataType::Int, false).unwrap();
    builder.column(address, "cid", DataType::Int, false).unwrap();
    builder.column(address, "street", DataType::Varchar(64), true).unwrap();
    builder.primary_key(address, &["aid"]).unwrap();

    let co = builder.join("co", customer, order, &[("cid", "cid")]).unwrap();
    let oi = builder.join("oi", order, item, &[("oid", "oid")]).unwrap();
    let ca = builder.join("ca", customer, address, &[("cid", "cid")]).unwrap();

    let group = builder.create_group("customer", "s").unwrap();
    builder.add_table_to_group(group, customer).unwrap();
    builder.add_join_to_group(group, co, 0).unwrap();
    builder.add_join_to_group(group, oi, 0).unwrap();
    builder.add_join_to_group(group, ca, 1).unwrap();

    Caoi { builder, group, customer, order, item, address }
}

/// Same tree with cascading keys: order is keyed (cid, oid) and item
/// (cid, oid, iid)
#[fixture]
pub(crate) fn cascading_caoi() -> Caoi {
    let mut builder = AisBuilder::new();

    let customer = builder.table("s", "customer").unwrap();
    builder.column(customer, "cid", DataType::Int, false).unwrap();
    builder.column(customer, "name", DataType::Varchar(32), true).unwrap();
    builder.primary_key(customer, &["cid"]).unwrap();

    let order = builder.table("s", "order").unwrap();
    builder.column(order, "cid", DataType::Int, false).unwrap();
    builder.column(order, "oid", DataType::Int, false).unwrap();
    builder.column(order, "odate", DataType::Date, true).unwrap();
    builder.primary_key(order, &["cid", "oid"]).unwrap();

    let item = builder.table("s", "item").unwrap();
    builder.column(item, "cid", DataType::Int, false).unwrap();
    builder.column(item, "oid", DataType::Int, false).unwrap();
    builder.column(item, "iid", DataType::Int, false).unwrap();
    builder.column(item, "sku", DataType::Varchar(16), true).unwrap();
    builder.primary_key(item, &["cid", "oid", "iid"]).unwrap();

    let address = builder.table("s", "address").unwrap();
    builder.column(address, "cid", DataType::Int, false).unwrap();
    builder.column(address, "aid", DataType::Int, false).unwrap();
    builder.column(address, "street", DataType::Varchar(64), true).unwrap();
    builder.primary_key(address, &["cid", "aid"]).unwrap();

    let co = builder.join("co", customer, order, &[("cid", "cid")]).unwrap();
    let oi = builder
        .join("oi", order, item, &[("cid", "cid"), ("oid", "oid")])
        .unwrap();
    let ca = builder.join("ca", customer, address, &[("cid", "cid")]).unwrap();

    let group = builder.create_group("customer", "s").unwrap();
    builder.add_table_to_group(group, customer).unwrap();
    builder.add_join_to_group(group, co, 0).unwrap();
    builder.add_join_to_group(group, oi, 0).unwrap();
    builder.add_join_to_group(group, ca, 1).unwrap();

    Caoi { builder, group, customer, order, item, address }
}
