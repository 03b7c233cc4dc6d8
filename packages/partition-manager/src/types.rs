//! Wire types exchanged between nodes: trigger lifecycle notifications,
//! runtime sample notifications, and the partition snapshot held by the
//! state store.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use partition_core::{BucketTable, NodeId, TriggerKey};

/// What happened to a trigger definition (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TriggerOp {
    Created,
    Updated,
    Deleted,
}

/// A trigger lifecycle event broadcast on the Trigger Event Bus (C5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifyTrigger {
    pub key: TriggerKey,
    pub op: TriggerOp,
}

/// An opaque runtime sample payload, tagged as either a data sample or an
/// event sample -- the two halves of the tagged union spec §3 describes.
/// The Data Event Bus (C6) never interprets the bytes, only the tag that
/// selects which listener callback receives them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum SamplePayload {
    Data { bytes: Vec<u8> },
    Event { bytes: Vec<u8> },
}

/// A runtime sample broadcast on the Data Event Bus (C6): `(fromNode,
/// payload)` per spec §3. Fanned out to every node other than `from_node`
/// (spec §4.7), never routed by trigger ownership the way `NotifyTrigger` is.
/// `entry_id` is this bus's `ReplicatedCell` key -- the sender uses it to
/// reclaim its own broadcast once every node has observed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifySample {
    pub from_node: NodeId,
    pub entry_id: u64,
    pub payload: SamplePayload,
}

/// A Partition: the mapping from trigger key to owning node tracked across
/// reconciliations (spec §3), as opposed to `BucketTable`'s per-bucket
/// ownership. Stored as CURRENT/PREVIOUS inside [`PartitionSnapshot`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionMap(pub HashMap<TriggerKey, NodeId>);

impl PartitionMap {
    #[must_use]
    pub fn owner_of(&self, key: &TriggerKey) -> Option<NodeId> {
        self.0.get(key).copied()
    }

    #[must_use]
    pub fn contains(&self, key: &TriggerKey) -> bool {
        self.0.contains_key(key)
    }

    #[must_use]
    pub fn keys(&self) -> Vec<TriggerKey> {
        self.0.keys().cloned().collect()
    }
}

/// The state the Partition State Store (C3) holds together: the current
/// bucket table and Partition (CURRENT), and the bucket table and Partition
/// that preceded them (PREVIOUS), plus a generation counter bumped on every
/// bucket rebuild (spec §3, §4.4).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionSnapshot {
    pub buckets: BucketTable,
    pub generation: u64,
    pub previous: Option<BucketTable>,
    pub partition: PartitionMap,
    pub previous_partition: Option<PartitionMap>,
}

impl PartitionSnapshot {
    #[must_use]
    pub fn initial(buckets: BucketTable) -> Self {
        Self { buckets, generation: 0, previous: None, partition: PartitionMap::default(), previous_partition: None }
    }

    /// Advances BUCKETS/PREVIOUS and CURRENT/PREVIOUS together, as one
    /// atomic value (spec §4.4's "batched write").
    #[must_use]
    pub fn advance(&self, new_buckets: BucketTable, new_partition: PartitionMap) -> Self {
        Self {
            previous: Some(self.buckets.clone()),
            generation: self.generation + 1,
            buckets: new_buckets,
            previous_partition: Some(self.partition.clone()),
            partition: new_partition,
        }
    }

    #[must_use]
    pub fn members(&self) -> Vec<NodeId> {
        let mut members = self.buckets.buckets.clone();
        members.sort_unstable();
        members.dedup();
        members
    }
}
