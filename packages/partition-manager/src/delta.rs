//! Delta Publisher (C7).
//!
//! Runs synchronously inside reconciliation and the single-trigger-write
//! paths -- never spawned -- so that it always happens-before the
//! notification it is computing deltas for (spec §5 ordering guarantee).

use std::collections::{HashMap, HashSet};

use partition_core::{BucketTable, NodeId, TriggerKey};

use crate::types::PartitionMap;

/// `tenantId -> [triggerId]`, the shape `onPartitionChange`'s `local`
/// argument groups the local node's owned triggers into (spec §4.1).
pub type TenantTriggerMap = HashMap<String, Vec<String>>;

/// The trigger-level counterpart of [`PartitionDelta`]: what changed about
/// the *local* node's ownership between two Partition maps (spec §4.1,
/// §4.8, Property 6), as opposed to `PartitionDelta`'s per-bucket view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PartitionChange {
    pub local: TenantTriggerMap,
    pub added: Vec<TriggerKey>,
    pub removed: Vec<TriggerKey>,
}

impl PartitionChange {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Computes `onPartitionChange`'s `(local, added, removed)` for `node`,
/// diffing `previous` (PREVIOUS) against `current` (CURRENT). `previous ==
/// None` reports every key `node` owns in `current` as newly added.
#[must_use]
pub fn compute_partition_change(previous: Option<&PartitionMap>, current: &PartitionMap, node: NodeId) -> PartitionChange {
    let empty = PartitionMap::default();
    let previous = previous.unwrap_or(&empty);

    let current_keys: HashSet<&TriggerKey> = current.0.iter().filter(|(_, &owner)| owner == node).map(|(key, _)| key).collect();
    let previous_keys: HashSet<&TriggerKey> = previous.0.iter().filter(|(_, &owner)| owner == node).map(|(key, _)| key).collect();

    let mut added: Vec<TriggerKey> = current_keys.difference(&previous_keys).map(|k| (*k).clone()).collect();
    let mut removed: Vec<TriggerKey> = previous_keys.difference(&current_keys).map(|k| (*k).clone()).collect();
    added.sort();
    removed.sort();

    PartitionChange { local: group_by_tenant(current_keys.into_iter().cloned()), added, removed }
}

fn group_by_tenant(keys: impl Iterator<Item = TriggerKey>) -> TenantTriggerMap {
    let mut grouped: TenantTriggerMap = HashMap::new();
    for key in keys {
        grouped.entry(key.tenant_id).or_default().push(key.trigger_id);
    }
    for triggers in grouped.values_mut() {
        triggers.sort();
    }
    grouped
}

/// A single bucket's ownership change between two bucket tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionDelta {
    pub bucket: usize,
    pub old_owner: Option<NodeId>,
    pub new_owner: NodeId,
}

/// Computes which buckets changed owner between `previous` and `current`.
/// `previous == None` reports every bucket as newly arrived (the first
/// table has no predecessor to diff against).
#[must_use]
pub fn compute_deltas(previous: Option<&BucketTable>, current: &BucketTable) -> Vec<PartitionDelta> {
    let mut deltas = Vec::new();
    for (bucket, &new_owner) in current.buckets.iter().enumerate() {
        let old_owner = previous.and_then(|p| p.owner_of_bucket(bucket));
        if old_owner != Some(new_owner) {
            deltas.push(PartitionDelta { bucket, old_owner, new_owner });
        }
    }
    deltas
}

/// Publishes the ownership deltas produced by a rebuild: logs each one at
/// `info` and records the `metrics` counters a host dashboard would chart.
pub fn publish_deltas(deltas: &[PartitionDelta]) {
    for delta in deltas {
        tracing::info!(
            bucket = delta.bucket,
            old_owner = delta.old_owner.map(|o| o.to_string()),
            new_owner = %delta.new_owner,
            "bucket ownership changed"
        );
    }
    metrics::counter!("partition_manager.reconciliations_run").increment(1);
    if !deltas.is_empty() {
        metrics::counter!("partition_manager.buckets_moved").increment(deltas.len() as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_previous_table_reports_every_bucket_as_arrived() {
        let current = BucketTable::new(vec![NodeId(1), NodeId(2)]);
        let deltas = compute_deltas(None, &current);
        assert_eq!(deltas.len(), 2);
        assert!(deltas.iter().all(|d| d.old_owner.is_none()));
    }

    #[test]
    fn unchanged_buckets_produce_no_delta() {
        let table = BucketTable::new(vec![NodeId(1), NodeId(2), NodeId(3)]);
        let deltas = compute_deltas(Some(&table), &table);
        assert!(deltas.is_empty());
    }

    #[test]
    fn only_reassigned_buckets_are_reported() {
        let previous = BucketTable::new(vec![NodeId(1), NodeId(2), NodeId(3)]);
        let current = BucketTable::new(vec![NodeId(1), NodeId(9), NodeId(3)]);
        let deltas = compute_deltas(Some(&previous), &current);
        assert_eq!(deltas, vec![PartitionDelta { bucket: 1, old_owner: Some(NodeId(2)), new_owner: NodeId(9) }]);
    }

    fn key(tenant: &str, trigger: &str) -> TriggerKey {
        TriggerKey::new(tenant, trigger)
    }

    #[test]
    fn cold_start_partition_change_reports_everything_as_added() {
        let mut current = PartitionMap::default();
        current.0.insert(key("tenant-a", "trigger-1"), NodeId(1));
        current.0.insert(key("tenant-a", "trigger-2"), NodeId(2));

        let change = compute_partition_change(None, &current, NodeId(1));
        assert_eq!(change.added, vec![key("tenant-a", "trigger-1")]);
        assert!(change.removed.is_empty());
        assert_eq!(change.local.get("tenant-a"), Some(&vec!["trigger-1".to_string()]));
    }

    #[test]
    fn partition_change_reports_added_and_removed_for_local_node() {
        let mut previous = PartitionMap::default();
        previous.0.insert(key("tenant-a", "trigger-1"), NodeId(1));
        previous.0.insert(key("tenant-a", "trigger-2"), NodeId(2));

        let mut current = PartitionMap::default();
        current.0.insert(key("tenant-a", "trigger-2"), NodeId(1));

        let change = compute_partition_change(Some(&previous), &current, NodeId(1));
        assert_eq!(change.added, vec![key("tenant-a", "trigger-2")]);
        assert_eq!(change.removed, vec![key("tenant-a", "trigger-1")]);
        assert_eq!(change.local.get("tenant-a"), Some(&vec!["trigger-2".to_string()]));
    }

    #[test]
    fn partition_change_ignores_other_nodes_churn() {
        let mut previous = PartitionMap::default();
        previous.0.insert(key("tenant-a", "trigger-1"), NodeId(2));

        let mut current = PartitionMap::default();
        current.0.insert(key("tenant-a", "trigger-1"), NodeId(3));

        let change = compute_partition_change(Some(&previous), &current, NodeId(1));
        assert!(change.is_empty());
    }
}
