//! Synchronous, typed errors for the placement and bucket-rebuild contracts.
//!
//! These cover the `InvalidArgument` branch of the error taxonomy only: C1 and
//! C2 are pure functions and the only way they fail is a caller violating
//! their preconditions. Every other failure mode in the system (substrate,
//! definitions store, listener callbacks) is async orchestration code and is
//! logged rather than returned — see `partition_manager::error`.

use thiserror::Error;

/// Errors returned by the consistent-hash placer and bucket table builder.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("bucket table is empty")]
    EmptyBucketTable,

    #[error("trigger key has an empty tenant_id or trigger_id")]
    EmptyTriggerKey,

    #[error("member list is empty")]
    EmptyMembers,

    #[error("bucket count {bucket_count} does not match member count {member_count}")]
    BucketMemberCountMismatch { bucket_count: usize, member_count: usize },
}
