//! Partition State Store (C3).
//!
//! Holds BUCKETS/CURRENT and the PREVIOUS pair they replaced behind a single
//! `ArcSwap<PartitionSnapshot>`. A rebuild is one atomic `store` of a freshly
//! built snapshot -- readers via `load_full` always see either the state
//! before or after a rebuild, never a partially-updated mix, mirroring the
//! teacher's `ClusterState::membership: ArcSwap<MembersView>` pattern
//! generalized to the two pairs this store needs (spec §4.4).

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use partition_core::{place_of, BucketTable, NodeId, PlacementError, TriggerKey};

use crate::types::{PartitionMap, PartitionSnapshot, TriggerOp};

pub struct PartitionStateStore {
    snapshot: ArcSwap<PartitionSnapshot>,
}

impl PartitionStateStore {
    #[must_use]
    pub fn new(initial: BucketTable) -> Self {
        Self { snapshot: ArcSwap::new(Arc::new(PartitionSnapshot::initial(initial))) }
    }

    /// Lock-free read of the current snapshot.
    #[must_use]
    pub fn current(&self) -> Arc<PartitionSnapshot> {
        self.snapshot.load_full()
    }

    /// Atomically replaces the snapshot with one built from `new_buckets`,
    /// re-placing `entries` (spec §4.5 steps 4-5) under the new table to
    /// produce the new CURRENT, and preserving the outgoing BUCKETS/CURRENT
    /// as PREVIOUS. `entries` is `None` to keep reconciling the trigger set
    /// already tracked in CURRENT (the common case), or `Some(keys)` to
    /// replace it outright -- used for the cold-start bootstrap, where
    /// CURRENT has no prior entries to reuse.
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError`] if any entry key is invalid or the new
    /// table is empty.
    pub fn advance(&self, new_buckets: BucketTable, entries: Option<&[TriggerKey]>) -> Result<Arc<PartitionSnapshot>, PlacementError> {
        let current = self.snapshot.load();
        let keys: Vec<TriggerKey> = match entries {
            Some(explicit) => explicit.to_vec(),
            None => current.partition.keys(),
        };

        let mut new_map = HashMap::with_capacity(keys.len());
        for key in &keys {
            new_map.insert(key.clone(), place_of(key, &new_buckets)?);
        }

        let next = Arc::new(current.advance(new_buckets, PartitionMap(new_map)));
        self.snapshot.store(next.clone());
        Ok(next)
    }

    /// Applies a single trigger lifecycle op to CURRENT (spec §4.6 steps
    /// 2b-2c): `Created` adds the entry if absent, `Deleted` removes it if
    /// present, `Updated` never touches the partition. Returns the new
    /// snapshot if CURRENT actually changed, `None` otherwise (so the caller
    /// knows whether a partition-change dispatch is warranted).
    #[must_use]
    pub fn apply_trigger_op(&self, key: &TriggerKey, op: TriggerOp, owner: NodeId) -> Option<Arc<PartitionSnapshot>> {
        let current = self.snapshot.load();
        let already_present = current.partition.contains(key);

        let mut new_map = current.partition.0.clone();
        let changed = match op {
            TriggerOp::Created if !already_present => {
                new_map.insert(key.clone(), owner);
                true
            }
            TriggerOp::Deleted if already_present => {
                new_map.remove(key);
                true
            }
            _ => false,
        };
        if !changed {
            return None;
        }

        let next = Arc::new(PartitionSnapshot {
            buckets: current.buckets.clone(),
            generation: current.generation,
            previous: current.previous.clone(),
            previous_partition: Some(current.partition.clone()),
            partition: PartitionMap(new_map),
        });
        self.snapshot.store(next.clone());
        Some(next)
    }

    /// `placeOf(key)` against the current table (spec §4.2).
    ///
    /// # Errors
    ///
    /// Returns [`PlacementError`] if `key` is invalid, or if the bucket
    /// table is empty, which cannot happen once the store has been
    /// constructed with a non-empty initial table and every rebuild
    /// preserves that invariant.
    pub fn place_of(&self, key: &TriggerKey) -> Result<NodeId, PlacementError> {
        place_of(key, &self.current().buckets)
    }

    #[must_use]
    pub fn members(&self) -> Vec<NodeId> {
        self.current().members()
    }
}
