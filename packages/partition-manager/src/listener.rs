//! Listener contracts for the public API's `registerTriggerListener` /
//! `registerDataListener` (spec §6.1), covering the four external-listener
//! callbacks spec §4.1 names: `onTriggerChange`, `onPartitionChange`,
//! `onNewData`, and `onNewEvent`. The first two are bundled onto
//! `TriggerListener` and the last two onto `DataListener`, since both pairs
//! are driven by the same bus and the public API registers only two
//! listener kinds, not four.

use async_trait::async_trait;

use partition_core::TriggerKey;

use crate::delta::TenantTriggerMap;
use crate::types::NotifyTrigger;

/// Invoked for every trigger lifecycle event the local node owns, at least
/// once (spec §5), and for every partition change (add/remove) that follows
/// from it or from a reconciliation.
#[async_trait]
pub trait TriggerListener: Send + Sync {
    async fn on_trigger(&self, event: NotifyTrigger);

    /// `onPartitionChange(local, added, removed)` (spec §4.1, §4.8): `local`
    /// is every trigger the local node now owns, grouped by tenant; `added`
    /// and `removed` are the keys that joined or left that set since the
    /// previous partition (spec §8 Property 6).
    async fn on_partition_change(&self, local: TenantTriggerMap, added: Vec<TriggerKey>, removed: Vec<TriggerKey>);
}

/// Invoked for every runtime sample observed from another node, at least
/// once, dispatched to `on_new_data` or `on_new_event` by the sample's tag
/// (spec §4.1, §4.7).
#[async_trait]
pub trait DataListener: Send + Sync {
    async fn on_new_data(&self, payload: Vec<u8>);
    async fn on_new_event(&self, payload: Vec<u8>);
}
