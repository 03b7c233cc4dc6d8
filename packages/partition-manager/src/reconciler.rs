//! Topology Reconciler (C4, spec §4.5).
//!
//! Rebuilds the bucket table whenever membership changes, re-places the
//! known trigger set under it to produce the new Partition (CURRENT), and
//! publishes both the resulting bucket-ownership deltas and the local
//! node's trigger-level partition change. The very first reconciliation
//! additionally performs the cold-start bootstrap: the coordinator lists
//! every known trigger from the definitions store and seeds the Trigger
//! Event Bus with `Created` notifications, and those same keys become the
//! entries CURRENT tracks from then on (spec §4.5 step 4).
//!
//! Only the coordinator performs the cold-start listing -- letting every
//! node hit the definitions store on startup would multiply load with
//! cluster size for no benefit, since the listing result is identical for
//! all of them. This is a reconciler-level decision, not part of the
//! `MembershipProvider` contract itself.

use std::sync::Arc;

use futures_util::StreamExt;

use partition_core::{rebuild_buckets, TriggerKey};

use crate::config::PartitionManagerConfig;
use crate::delta::{compute_deltas, compute_partition_change, publish_deltas, PartitionChange, PartitionDelta};
use crate::error::PartitionError;
use crate::store::PartitionStateStore;
use crate::substrate::{DefinitionsStore, MembershipProvider, ReplicatedCell};
use crate::types::{NotifyTrigger, TriggerOp};

/// The Trigger Event Bus as seen from outside `bus::EventBus` -- a
/// cluster-wide replicated cell, so the reconciler and the manager can be
/// handed a real substrate's implementation just as easily as the in-memory
/// one in `sim`.
pub type SharedTriggerCell = Arc<dyn ReplicatedCell<TriggerKey, NotifyTrigger>>;

/// The outcome of one reconciliation pass: the bucket-index deltas (for
/// logging/metrics) and the local node's trigger-level partition change
/// (for `onPartitionChange`).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ReconcileOutcome {
    pub bucket_deltas: Vec<PartitionDelta>,
    pub partition_change: PartitionChange,
}

pub struct TopologyReconciler {
    membership: Arc<dyn MembershipProvider>,
    definitions: Arc<dyn DefinitionsStore>,
    store: Arc<PartitionStateStore>,
    trigger_bus: SharedTriggerCell,
    config: PartitionManagerConfig,
}

impl TopologyReconciler {
    #[must_use]
    pub fn new(
        membership: Arc<dyn MembershipProvider>,
        definitions: Arc<dyn DefinitionsStore>,
        store: Arc<PartitionStateStore>,
        trigger_bus: SharedTriggerCell,
        config: PartitionManagerConfig,
    ) -> Self {
        Self { membership, definitions, store, trigger_bus, config }
    }

    /// Runs one reconciliation pass: rebuild the bucket table from the
    /// current membership view, re-place the known trigger set under it
    /// (spec §4.5 steps 4-5), and publish the resulting deltas -- on the
    /// very first pass, if this node is coordinator, the known trigger set
    /// is seeded from the definitions store rather than reused from an
    /// empty CURRENT.
    ///
    /// # Errors
    ///
    /// Returns [`PartitionError::SubstrateUnavailable`] if the membership
    /// view is currently empty (no node to own any bucket). Definitions
    /// store failures are logged and treated as an empty listing rather than
    /// propagated, per spec §4.5 step 4 / §7.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome, PartitionError> {
        let members = self.membership.current_members();
        if members.is_empty() {
            return Err(PartitionError::SubstrateUnavailable("membership view is empty".to_string()));
        }

        let before = self.store.current();
        let is_cold_start = before.generation == 0 && before.previous.is_none();

        let new_table = rebuild_buckets(Some(&before.buckets), &members)?;

        let cold_start_entries = if is_cold_start && self.membership.is_coordinator() {
            let triggers = self.bootstrap_triggers().await;
            for key in &triggers {
                let event = NotifyTrigger { key: key.clone(), op: TriggerOp::Created };
                self.trigger_bus.insert(key.clone(), event).await;
            }
            Some(triggers)
        } else if is_cold_start {
            Some(Vec::new())
        } else {
            None
        };

        let after = self.store.advance(new_table, cold_start_entries.as_deref())?;

        let bucket_deltas = compute_deltas(Some(&before.buckets), &after.buckets);
        publish_deltas(&bucket_deltas);

        let partition_change = compute_partition_change(after.previous_partition.as_ref(), &after.partition, self.membership.local_node());

        Ok(ReconcileOutcome { bucket_deltas, partition_change })
    }

    /// Lists every known trigger from the definitions store, bounded by
    /// `definitions_timeout`. A timeout, a stream error, or any `Err` item
    /// is logged at `warn` and treated as an empty listing (spec §4.5 step
    /// 4, §7 `DefinitionsUnavailable`).
    async fn bootstrap_triggers(&self) -> Vec<TriggerKey> {
        let collect = async {
            let mut stream = self.definitions.list_all_triggers().await;
            let mut triggers = Vec::new();
            while let Some(item) = stream.next().await {
                match item {
                    Ok(key) => triggers.push(key),
                    Err(err) => {
                        tracing::warn!(error = %err, "definitions store returned an error during cold-start listing");
                        return Vec::new();
                    }
                }
            }
            triggers
        };

        match tokio::time::timeout(self.config.definitions_timeout, collect).await {
            Ok(triggers) => triggers,
            Err(_) => {
                tracing::warn!(
                    timeout_ms = self.config.definitions_timeout.as_millis() as u64,
                    "definitions store listing timed out during cold-start"
                );
                Vec::new()
            }
        }
    }
}
