//! External collaborator contracts.
//!
//! The Definitions Store, Alert Engine, and Cluster Substrate are external
//! systems this crate never implements. Per the DESIGN NOTES, rather than
//! reach for global singletons, `PartitionManager` is an explicitly
//! constructed value taking implementations of these traits -- plus a
//! `Clock` -- as constructor dependencies. `sim` provides in-memory
//! implementations of all four for tests.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use thiserror::Error;

use partition_core::{NodeId, TriggerKey};

/// A stream of items, boxed so the trait methods below can return `impl
/// Stream`-shaped values from trait objects.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

#[derive(Debug, Error)]
pub enum DefinitionsError {
    #[error("definitions store unreachable: {0}")]
    Unreachable(String),
}

/// Current cluster membership, as seen by the local node.
#[async_trait]
pub trait MembershipProvider: Send + Sync {
    /// All live members, in canonical (ascending `NodeId`) order.
    fn current_members(&self) -> Vec<NodeId>;

    /// `true` if the local node is the coordinator responsible for driving
    /// reconciliation (spec §4.5 step 1).
    fn is_coordinator(&self) -> bool;

    /// The local node's own identity.
    fn local_node(&self) -> NodeId;

    /// Resolves once the membership view has changed from whatever it was
    /// when this call was made. Used by the reconciler's background loop.
    async fn view_changed(&self);
}

/// Read access to the full set of trigger definitions, used only for the
/// cold-start full rebuild (spec §4.5 step 4, §6.2).
#[async_trait]
pub trait DefinitionsStore: Send + Sync {
    /// A stream of `(tenantId, triggerId)` results; an `Err` item is logged
    /// and the cold-start listing is treated as empty (spec §4.5 step 4).
    async fn list_all_triggers(&self) -> BoxStream<'static, Result<TriggerKey, DefinitionsError>>;
}

/// A replicated key-value cell with change notification, the shared shape
/// behind both the Trigger Event Bus (C5) and the Data Event Bus (C6).
#[async_trait]
pub trait ReplicatedCell<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Send + Sync,
{
    async fn insert(&self, key: K, value: V);
    async fn remove(&self, key: &K);
    async fn get(&self, key: &K) -> Option<V>;

    /// A stream of values inserted into the cell, including insertions made
    /// by other nodes and replicated in. Each registered listener gets its
    /// own independent stream.
    fn subscribe(&self) -> BoxStream<'static, V>;
}

/// Injectable time source, following the teacher's `ClockSource`/`SystemClock`
/// split -- lets tests and the simulated substrate control time explicitly.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// `Clock` backed by the OS wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::SystemTime::UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64
    }
}
