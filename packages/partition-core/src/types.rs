//! Core domain types: node identity, trigger keys, and the bucket table.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::hash::{combine_hashes, fnv1a_hash, stable_hash32};

/// Identifies a cluster node. Derived from the node's canonical address via
/// FNV-1a (spec §6.3), so it is stable across restarts as long as the address
/// doesn't change and requires no coordination to assign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u32);

impl NodeId {
    /// Derives a `NodeId` from a node's canonical address string (host:port or
    /// similar), per spec §6.3.
    #[must_use]
    pub fn from_address(address: &str) -> Self {
        Self(fnv1a_hash(address.as_bytes()))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08x}", self.0)
    }
}

/// Identifies a trigger definition within a tenant.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerKey {
    pub tenant_id: String,
    pub trigger_id: String,
}

impl TriggerKey {
    #[must_use]
    pub fn new(tenant_id: impl Into<String>, trigger_id: impl Into<String>) -> Self {
        Self { tenant_id: tenant_id.into(), trigger_id: trigger_id.into() }
    }

    /// `fp(TriggerKey)`: a 32-bit fingerprint combining the tenant and trigger
    /// ids without allocating a concatenated string (spec §3).
    #[must_use]
    pub fn fingerprint(&self) -> u32 {
        let tenant_hash = fnv1a_hash(self.tenant_id.as_bytes());
        let trigger_hash = fnv1a_hash(self.trigger_id.as_bytes());
        combine_hashes(tenant_hash, trigger_hash)
    }

    /// `stableHash32(fp(key))` — the two-stage hash consumed by the placer
    /// (spec §4.2 step 1).
    #[must_use]
    pub fn placement_hash(&self) -> u32 {
        stable_hash32(self.fingerprint())
    }
}

impl fmt::Display for TriggerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tenant_id, self.trigger_id)
    }
}

/// A rendezvous between buckets and the live membership: `buckets[i]` names
/// the node owning bucket `i`. The number of buckets always equals
/// `members.len()` at the time the table was built (spec §3, §4.3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketTable {
    pub buckets: Vec<NodeId>,
}

impl BucketTable {
    #[must_use]
    pub fn new(buckets: Vec<NodeId>) -> Self {
        Self { buckets }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    #[must_use]
    pub fn owner_of_bucket(&self, bucket: usize) -> Option<NodeId> {
        self.buckets.get(bucket).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_from_address_is_deterministic() {
        assert_eq!(NodeId::from_address("10.0.0.1:9000"), NodeId::from_address("10.0.0.1:9000"));
        assert_ne!(NodeId::from_address("10.0.0.1:9000"), NodeId::from_address("10.0.0.2:9000"));
    }

    #[test]
    fn trigger_key_fingerprint_is_deterministic() {
        let k = TriggerKey::new("tenant-a", "trigger-1");
        assert_eq!(k.fingerprint(), k.fingerprint());
    }

    #[test]
    fn trigger_key_fingerprint_distinguishes_tenant_and_trigger() {
        let a = TriggerKey::new("tenant-a", "trigger-1");
        let b = TriggerKey::new("tenant-b", "trigger-1");
        let c = TriggerKey::new("tenant-a", "trigger-2");
        assert_ne!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
    }

    #[test]
    fn trigger_key_msgpack_roundtrip() {
        let k = TriggerKey::new("tenant-a", "trigger-1");
        let bytes = rmp_serde::to_vec_named(&k).expect("serialize TriggerKey");
        let decoded: TriggerKey = rmp_serde::from_slice(&bytes).expect("deserialize TriggerKey");
        assert_eq!(k, decoded);
    }

    #[test]
    fn bucket_table_msgpack_roundtrip() {
        let table = BucketTable::new(vec![NodeId(1), NodeId(2), NodeId(3)]);
        let bytes = rmp_serde::to_vec_named(&table).expect("serialize BucketTable");
        let decoded: BucketTable = rmp_serde::from_slice(&bytes).expect("deserialize BucketTable");
        assert_eq!(table, decoded);
    }
}
