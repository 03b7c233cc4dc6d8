//! Error taxonomy for the partition manager's public API.
//!
//! `InvalidArgument` is the only variant C1/C2 (via `partition_core`) can
//! produce, and it is returned synchronously. Every other variant names a
//! failure mode of an external collaborator (substrate, definitions store,
//! a registered listener callback) and is never propagated out of the public
//! API -- those call sites log it via `tracing` and continue, per the
//! at-least-once delivery contract described alongside the public API.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PartitionError {
    #[error("invalid argument: {0}")]
    InvalidArgument(#[from] partition_core::PlacementError),

    #[error("cluster substrate unavailable: {0}")]
    SubstrateUnavailable(String),

    #[error("definitions store unavailable: {0}")]
    DefinitionsUnavailable(String),

    #[error("listener callback failed: {0}")]
    ListenerFault(#[source] anyhow::Error),
}
