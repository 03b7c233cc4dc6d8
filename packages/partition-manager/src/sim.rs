//! In-memory simulated substrate.
//!
//! Implements [`MembershipProvider`], [`DefinitionsStore`], and [`Clock`]
//! entirely in memory, with no network transport, so the integration test
//! suite can exercise multi-node scenarios (spec §8 scenarios S1-S6)
//! deterministically and without a real cluster.

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream;
use parking_lot::RwLock;
use tokio::sync::watch;

use partition_core::{NodeId, TriggerKey};

use crate::bus::{DataBus, TriggerBus};
use crate::manager::SharedDataCell;
use crate::reconciler::SharedTriggerCell;
use crate::substrate::{BoxStream, Clock, DefinitionsError, DefinitionsStore, MembershipProvider};

/// Builds one trigger/data bus pair for a simulated cluster. Every node's
/// `PartitionManager` in that cluster is handed a clone of this same pair, so
/// a notification published on one node's manager is observable by every
/// other node's dispatch loop.
#[must_use]
pub fn shared_buses(capacity: usize) -> (SharedTriggerCell, SharedDataCell) {
    (Arc::new(TriggerBus::new(capacity)), Arc::new(DataBus::new(capacity)))
}

/// Shared membership state for a simulated cluster. Each node holds its own
/// [`SimMembership`] handle constructed from this. Mutations go through a
/// `watch` channel rather than a bare `Notify` so a handle that hasn't
/// polled `view_changed` yet still observes the latest value instead of
/// missing it (the same reason the teacher's `ClusterChannels` uses
/// `watch::Sender<Arc<MembersView>>` for membership).
pub struct SimCluster {
    members: Arc<RwLock<Vec<NodeId>>>,
    tx: watch::Sender<u64>,
}

impl SimCluster {
    #[must_use]
    pub fn new(initial: Vec<NodeId>) -> Self {
        let mut members = initial;
        members.sort_unstable();
        members.dedup();
        let (tx, _) = watch::channel(0);
        Self { members: Arc::new(RwLock::new(members)), tx }
    }

    /// Returns a membership handle for `local`, a member of this cluster.
    #[must_use]
    pub fn handle(&self, local: NodeId) -> Arc<SimMembership> {
        Arc::new(SimMembership {
            members: self.members.clone(),
            rx: tokio::sync::Mutex::new(self.tx.subscribe()),
            local,
        })
    }

    pub fn add_member(&self, id: NodeId) {
        let mut members = self.members.write();
        if !members.contains(&id) {
            members.push(id);
            members.sort_unstable();
        }
        drop(members);
        self.tx.send_modify(|generation| *generation += 1);
    }

    pub fn remove_member(&self, id: NodeId) {
        self.members.write().retain(|m| *m != id);
        self.tx.send_modify(|generation| *generation += 1);
    }

    #[must_use]
    pub fn members(&self) -> Vec<NodeId> {
        self.members.read().clone()
    }
}

pub struct SimMembership {
    members: Arc<RwLock<Vec<NodeId>>>,
    rx: tokio::sync::Mutex<watch::Receiver<u64>>,
    local: NodeId,
}

#[async_trait]
impl MembershipProvider for SimMembership {
    fn current_members(&self) -> Vec<NodeId> {
        self.members.read().clone()
    }

    /// The member with the lowest `NodeId` is coordinator, matching the
    /// teacher's `MembersView::master()` "lowest join marker wins" style of
    /// tie-free leader selection without an election protocol.
    fn is_coordinator(&self) -> bool {
        self.members.read().iter().min().copied() == Some(self.local)
    }

    fn local_node(&self) -> NodeId {
        self.local
    }

    async fn view_changed(&self) {
        let mut rx = self.rx.lock().await;
        let _ = rx.changed().await;
    }
}

/// In-memory definitions store, pre-seeded or mutated directly by tests.
pub struct SimDefinitions {
    triggers: RwLock<Vec<TriggerKey>>,
}

impl SimDefinitions {
    #[must_use]
    pub fn new(triggers: Vec<TriggerKey>) -> Self {
        Self { triggers: RwLock::new(triggers) }
    }

    pub fn add(&self, key: TriggerKey) {
        self.triggers.write().push(key);
    }
}

#[async_trait]
impl DefinitionsStore for SimDefinitions {
    async fn list_all_triggers(&self) -> BoxStream<'static, Result<TriggerKey, DefinitionsError>> {
        let triggers = self.triggers.read().clone();
        Box::pin(stream::iter(triggers.into_iter().map(Ok)))
    }
}

/// A clock fixed to a given millisecond value, for deterministic tests.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub u64);

impl Clock for FixedClock {
    fn now_ms(&self) -> u64 {
        self.0
    }
}
