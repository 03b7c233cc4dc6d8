//! Bucket table construction and rebuilds on membership change (spec §4.3).
//!
//! Rebuilding the table on every membership change from scratch would remap
//! every key; instead a rebuild starts from the previous table and keeps a
//! surviving node in its old slot wherever possible, only reassigning the
//! slots whose former owner left the cluster.

use std::collections::HashSet;

use crate::error::PlacementError;
use crate::types::{BucketTable, NodeId};

/// Builds a fresh bucket table with one bucket per member, in canonical
/// (ascending `NodeId`) order. Used for the very first table, before any
/// membership change has happened.
///
/// # Errors
///
/// Returns [`PlacementError::EmptyMembers`] if `members` is empty.
pub fn build_initial(members: &[NodeId]) -> Result<BucketTable, PlacementError> {
    if members.is_empty() {
        return Err(PlacementError::EmptyMembers);
    }
    let mut sorted = members.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    Ok(BucketTable::new(sorted))
}

/// Rebuilds the bucket table for a new membership view, preserving as many
/// existing bucket assignments as possible.
///
/// For each slot `b` in the new table (`b` in `0..members.len()`), the
/// previous owner of slot `b` is kept if it is still a member and has not
/// already been placed in an earlier slot during this rebuild. Slots that
/// can't keep their previous owner — either because that node left, or
/// because the new table is larger than the old one — are filled with the
/// lowest-indexed (in canonical order) member not yet placed anywhere in the
/// new table. Filling with `members[b]` unconditionally would double-place a
/// member already kept at a lower surviving index and leave another member
/// with no bucket at all, breaking the bijection property; walking the
/// canonical order for the first free member avoids that.
///
/// # Errors
///
/// Returns [`PlacementError::EmptyMembers`] if `members` is empty.
pub fn rebuild_buckets(old: Option<&BucketTable>, members: &[NodeId]) -> Result<BucketTable, PlacementError> {
    if members.is_empty() {
        return Err(PlacementError::EmptyMembers);
    }
    let mut canonical = members.to_vec();
    canonical.sort_unstable();
    canonical.dedup();
    let n = canonical.len();
    let member_set: HashSet<NodeId> = canonical.iter().copied().collect();

    let mut new_buckets: Vec<Option<NodeId>> = vec![None; n];
    let mut placed: HashSet<NodeId> = HashSet::with_capacity(n);

    if let Some(old_table) = old {
        for b in 0..n.min(old_table.len()) {
            let candidate = old_table.buckets[b];
            if member_set.contains(&candidate) && placed.insert(candidate) {
                new_buckets[b] = Some(candidate);
            }
        }
    }

    let mut next_unplaced = canonical.iter().copied().filter(|m| !placed.contains(m));
    for slot in &mut new_buckets {
        if slot.is_none() {
            let member = next_unplaced.next().expect("canonical member list and bucket count both have len n");
            placed.insert(member);
            *slot = Some(member);
        }
    }

    Ok(BucketTable::new(new_buckets.into_iter().map(|m| m.expect("every slot filled")).collect()))
}
