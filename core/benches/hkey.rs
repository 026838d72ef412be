//! Benchmarks for HKey derivation over wide and deep groups.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use groupdb_core::ais::{Ais, AisBuilder};
use groupdb_core::hkey::compute_hkey;
use groupdb_core::models::{DataType, TableId};

/// Root with `width` children, each the top of a chain `depth` tables deep.
/// Every table carries its ancestors' key columns (cascading keys).
fn build_group(width: usize, depth: usize) -> (Ais, Vec<TableId>) {
    let mut builder = AisBuilder::new();
    let root = builder.table("bench", "root").unwrap();
    builder.column(root, "k0", DataType::BigInt, false).unwrap();
    builder.primary_key(root, &["k0"]).unwrap();
    let group = builder.create_group("root", "bench").unwrap();
    builder.add_table_to_group(group, root).unwrap();

    let mut leaves = Vec::with_capacity(width);
    for branch in 0..width {
        let mut parent = root;
        for level in 1..=depth {
            let table = builder.table("bench", &format!("t{}_{}", branch, level)).unwrap();
            let key: Vec<String> = (0..=level).map(|k| format!("k{}", k)).collect();
            for column in &key {
                builder.column(table, column, DataType::BigInt, false).unwrap();
            }
            builder.primary_key(table, &key).unwrap();

            let pairs: Vec<(String, String)> = key[..level].iter().map(|c| (c.clone(), c.clone())).collect();
            let join = builder
                .join(&format!("j{}_{}", branch, level), parent, table, &pairs)
                .unwrap();
            builder.add_join_to_group(group, join, branch as u32).unwrap();
            parent = table;
        }
        leaves.push(parent);
    }
    (builder.freeze().unwrap(), leaves)
}

fn hkey_derivation(c: &mut Criterion) {
    let mut group = c.benchmark_group("hkey_derivation");

    for width in [4usize, 16, 64] {
        let (ais, leaves) = build_group(width, 4);
        group.bench_with_input(BenchmarkId::new("leaf_of_wide_group", width), &width, |b, _| {
            b.iter(|| compute_hkey(black_box(&ais), black_box(leaves[0])).unwrap())
        });
    }

    for depth in [2usize, 8, 15] {
        let (ais, leaves) = build_group(4, depth);
        group.bench_with_input(BenchmarkId::new("leaf_of_deep_group", depth), &depth, |b, _| {
            b.iter(|| compute_hkey(black_box(&ais), black_box(leaves[0])).unwrap())
        });
    }

    group.finish();
}

fn branch_hkey(c: &mut Criterion) {
    let (ais, leaves) = build_group(32, 4);
    c.bench_function("branch_hkey_wide_group", |b| {
        b.iter(|| ais.branch_hkey(black_box(leaves[0])).unwrap())
    });
}

criterion_group!(benches, hkey_derivation, branch_hkey);
criterion_main!(benches);
