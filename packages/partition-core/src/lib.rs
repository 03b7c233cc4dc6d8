//! Partition core -- trigger fingerprinting, consistent-hash placement, and
//! bucket table construction.
//!
//! This crate has no I/O and no async: it is the pure domain layer consumed
//! by `partition-manager` to decide which node owns a trigger at any given
//! moment.
//!
//! - **Types** ([`types`]): [`types::NodeId`], [`types::TriggerKey`], [`types::BucketTable`]
//! - **Hash** ([`hash`]): FNV-1a primitives used for fingerprinting and node-id derivation
//! - **Placement** ([`placement`]): Jump Consistent Hash, `placeOf`
//! - **Buckets** ([`buckets`]): bucket table construction and low-churn rebuilds
//! - **Error** ([`error`]): [`error::PlacementError`]

pub mod buckets;
pub mod error;
pub mod hash;
pub mod placement;
pub mod types;

pub use buckets::{build_initial, rebuild_buckets};
pub use error::PlacementError;
pub use hash::{combine_hashes, fnv1a_hash, stable_hash32};
pub use placement::{bucket_of, jump_consistent_hash, place_of};
pub use types::{BucketTable, NodeId, TriggerKey};

#[cfg(test)]
mod properties;
