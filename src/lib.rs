/// GroupDB - table grouping and hierarchical keys for a relational catalog
///
/// This is the root crate that provides workspace-level documentation.
/// Actual implementation is in the subcrates:
/// - `groupdb-core`: schema catalog, group builder, HKey derivation,
///   group indexes and change classification
pub use groupdb_core::*;

/// Returns the version of the package.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
