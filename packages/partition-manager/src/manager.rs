//! The public `PartitionManager` API (spec §6.1).

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{FutureExt, StreamExt};
use parking_lot::RwLock;

use partition_core::{build_initial, NodeId, TriggerKey};

use crate::config::PartitionManagerConfig;
use crate::delta::{PartitionChange, TenantTriggerMap};
use crate::error::PartitionError;
use crate::listener::{DataListener, TriggerListener};
use crate::reconciler::{ReconcileOutcome, SharedTriggerCell, TopologyReconciler};
use crate::store::PartitionStateStore;
use crate::substrate::{Clock, DefinitionsStore, MembershipProvider, ReplicatedCell};
use crate::types::{NotifySample, NotifyTrigger, SamplePayload, TriggerOp};

/// The Data Event Bus as seen from outside `bus::EventBus`. Keyed by a
/// per-publish sequence number rather than `TriggerKey` -- samples fan out
/// to every node, not to whoever owns a trigger, so there is no trigger key
/// to route by (spec §4.7).
pub type SharedDataCell = Arc<dyn ReplicatedCell<u64, NotifySample>>;

/// Places triggers on owner nodes, reconciles the partition map on
/// membership change, and fans trigger lifecycle / runtime sample events out
/// to registered listeners.
///
/// Constructed with explicit collaborator dependencies rather than reached
/// for as a global singleton, per the DESIGN NOTES. Every method is safe to
/// call concurrently (spec §5).
pub struct PartitionManager {
    membership: Arc<dyn MembershipProvider>,
    store: Arc<PartitionStateStore>,
    trigger_bus: SharedTriggerCell,
    data_bus: SharedDataCell,
    trigger_listeners: Arc<RwLock<Vec<Arc<dyn TriggerListener>>>>,
    data_listeners: Arc<RwLock<Vec<Arc<dyn DataListener>>>>,
    sample_seq: AtomicU64,
    #[allow(dead_code)]
    clock: Arc<dyn Clock>,
}

impl PartitionManager {
    /// Builds the manager, performs the first reconciliation (which includes
    /// the cold-start definitions bootstrap if this node is coordinator), and
    /// spawns the background tasks that keep the bucket table current and
    /// fan bus events out to listeners.
    ///
    /// `trigger_bus` and `data_bus` are cluster-wide replicated cells, shared
    /// across every node's manager rather than created per node -- a bus
    /// private to one manager would never see events published by another
    /// node. Callers standing up a multi-node cluster construct one bus pair
    /// and hand clones of it to each node's `PartitionManager::new`.
    #[must_use]
    pub fn new(
        membership: Arc<dyn MembershipProvider>,
        definitions: Arc<dyn DefinitionsStore>,
        trigger_bus: SharedTriggerCell,
        data_bus: SharedDataCell,
        clock: Arc<dyn Clock>,
        config: PartitionManagerConfig,
    ) -> Arc<Self> {
        let initial_members = membership.current_members();
        let initial_table = build_initial(&initial_members)
            .unwrap_or_else(|_| build_initial(&[membership.local_node()]).expect("local node is a valid singleton member"));
        let store = Arc::new(PartitionStateStore::new(initial_table));

        let manager = Arc::new(Self {
            membership: membership.clone(),
            store: store.clone(),
            trigger_bus: trigger_bus.clone(),
            data_bus: data_bus.clone(),
            trigger_listeners: Arc::new(RwLock::new(Vec::new())),
            data_listeners: Arc::new(RwLock::new(Vec::new())),
            sample_seq: AtomicU64::new(0),
            clock,
        });

        let reconciler = Arc::new(TopologyReconciler::new(membership, definitions, store, trigger_bus.clone(), config));
        tokio::spawn(reconciliation_loop(manager.clone(), reconciler));
        tokio::spawn(trigger_dispatch_loop(manager.clone(), trigger_bus));
        tokio::spawn(sample_dispatch_loop(manager.clone(), data_bus));

        manager
    }

    /// `true` once the cluster has more than one member -- below that there
    /// is nothing to distribute and every trigger/sample is local by
    /// definition (spec §6.1, §5 "single-node mode").
    #[must_use]
    pub fn is_distributed(&self) -> bool {
        self.membership.current_members().len() > 1
    }

    /// Registers a listener invoked for every trigger lifecycle event this
    /// node owns and every partition change that follows from it, for as
    /// long as the manager lives.
    pub fn register_trigger_listener(&self, listener: Arc<dyn TriggerListener>) {
        self.trigger_listeners.write().push(listener);
    }

    /// Registers a listener invoked for every runtime sample observed from
    /// another node.
    pub fn register_data_listener(&self, listener: Arc<dyn DataListener>) {
        self.data_listeners.write().push(listener);
    }

    /// Announces a trigger lifecycle change. Delivery is routed to whichever
    /// node currently owns `key`, which may be the local node. In
    /// single-node (non-distributed) mode this is a no-op (spec §5):
    /// nothing is published and no listener fires.
    pub async fn notify_trigger(&self, key: TriggerKey, op: TriggerOp) -> Result<(), PartitionError> {
        if !self.is_distributed() {
            return Ok(());
        }
        let event = NotifyTrigger { key: key.clone(), op };
        self.trigger_bus.insert(key, event).await;
        Ok(())
    }

    /// `notifyData(sample)` (spec §6.1): broadcasts an opaque data sample to
    /// every other node (spec §4.7). No-op in single-node mode.
    pub async fn notify_data(&self, payload: Vec<u8>) -> Result<(), PartitionError> {
        self.publish_sample(SamplePayload::Data { bytes: payload }).await
    }

    /// `notifyEvent(sample)` (spec §6.1): broadcasts an opaque event sample
    /// to every other node. No-op in single-node mode.
    pub async fn notify_event(&self, payload: Vec<u8>) -> Result<(), PartitionError> {
        self.publish_sample(SamplePayload::Event { bytes: payload }).await
    }

    async fn publish_sample(&self, payload: SamplePayload) -> Result<(), PartitionError> {
        if !self.is_distributed() {
            return Ok(());
        }
        let entry_id = self.sample_seq.fetch_add(1, Ordering::Relaxed);
        let sample = NotifySample { from_node: self.membership.local_node(), entry_id, payload };
        self.data_bus.insert(entry_id, sample).await;
        Ok(())
    }

    /// Returns `true` if the local node currently owns `key`. Exposed so a
    /// caller can short-circuit expensive work for keys it doesn't own,
    /// without going through the bus at all.
    #[must_use]
    pub fn owns(&self, key: &TriggerKey) -> bool {
        self.store.place_of(key).map(|owner| owner == self.membership.local_node()).unwrap_or(false)
    }

    async fn dispatch_partition_change(&self, change: PartitionChange) {
        if change.is_empty() {
            return;
        }
        let listeners = self.trigger_listeners.read().clone();
        for listener in listeners {
            if let Err(err) = invoke_partition_change(&listener, change.local.clone(), change.added.clone(), change.removed.clone()).await {
                tracing::warn!(error = %err, "partition-change listener fault");
            }
        }
        metrics::counter!("partition_manager.partition_changes_delivered").increment(1);
    }
}

async fn invoke_trigger(listener: &Arc<dyn TriggerListener>, event: NotifyTrigger) -> Result<(), PartitionError> {
    std::panic::AssertUnwindSafe(listener.on_trigger(event))
        .catch_unwind()
        .await
        .map_err(|_| PartitionError::ListenerFault(anyhow::anyhow!("trigger listener panicked")))
}

async fn invoke_partition_change(
    listener: &Arc<dyn TriggerListener>,
    local: TenantTriggerMap,
    added: Vec<TriggerKey>,
    removed: Vec<TriggerKey>,
) -> Result<(), PartitionError> {
    std::panic::AssertUnwindSafe(listener.on_partition_change(local, added, removed))
        .catch_unwind()
        .await
        .map_err(|_| PartitionError::ListenerFault(anyhow::anyhow!("partition-change listener panicked")))
}

async fn invoke_new_data(listener: &Arc<dyn DataListener>, payload: Vec<u8>) -> Result<(), PartitionError> {
    std::panic::AssertUnwindSafe(listener.on_new_data(payload))
        .catch_unwind()
        .await
        .map_err(|_| PartitionError::ListenerFault(anyhow::anyhow!("data listener panicked")))
}

async fn invoke_new_event(listener: &Arc<dyn DataListener>, payload: Vec<u8>) -> Result<(), PartitionError> {
    std::panic::AssertUnwindSafe(listener.on_new_event(payload))
        .catch_unwind()
        .await
        .map_err(|_| PartitionError::ListenerFault(anyhow::anyhow!("event listener panicked")))
}

async fn reconciliation_loop(manager: Arc<PartitionManager>, reconciler: Arc<TopologyReconciler>) {
    loop {
        if manager.is_distributed() {
            match reconciler.reconcile().await {
                Ok(ReconcileOutcome { partition_change, .. }) => {
                    manager.dispatch_partition_change(partition_change).await;
                }
                Err(err) => {
                    tracing::warn!(error = %err, "reconciliation failed");
                    metrics::counter!("partition_manager.reconciliation_failures").increment(1);
                }
            }
        }
        manager.membership.view_changed().await;
    }
}

async fn trigger_dispatch_loop(manager: Arc<PartitionManager>, bus: SharedTriggerCell) {
    let mut stream = bus.subscribe();
    while let Some(event) = stream.next().await {
        let local = manager.membership.local_node();
        if !manager.owns(&event.key) {
            continue;
        }

        // Step 2a (spec §4.6): reclaim bus space before anything else runs.
        bus.remove(&event.key).await;

        if let Some(snapshot) = manager.store.apply_trigger_op(&event.key, event.op, local) {
            let change = crate::delta::compute_partition_change(snapshot.previous_partition.as_ref(), &snapshot.partition, local);
            manager.dispatch_partition_change(change).await;
        }

        let listeners = manager.trigger_listeners.read().clone();
        for listener in listeners {
            if let Err(err) = invoke_trigger(&listener, event.clone()).await {
                tracing::warn!(error = %err, "trigger listener fault");
            }
        }
        metrics::counter!("partition_manager.triggers_delivered").increment(1);
    }
}

async fn sample_dispatch_loop(manager: Arc<PartitionManager>, bus: SharedDataCell) {
    let mut stream = bus.subscribe();
    while let Some(event) = stream.next().await {
        let local = manager.membership.local_node();
        if event.from_node == local {
            // Spec §4.7: the sender GCs its own broadcast and does nothing
            // else -- it already evaluated the sample locally before
            // publishing it.
            bus.remove(&event.entry_id).await;
            continue;
        }

        let listeners = manager.data_listeners.read().clone();
        for listener in listeners {
            let result = match &event.payload {
                SamplePayload::Data { bytes } => invoke_new_data(&listener, bytes.clone()).await,
                SamplePayload::Event { bytes } => invoke_new_event(&listener, bytes.clone()).await,
            };
            if let Err(err) = result {
                tracing::warn!(error = %err, "data listener fault");
            }
        }
        metrics::counter!("partition_manager.samples_delivered").increment(1);
    }
}
