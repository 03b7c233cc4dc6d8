//! Property-based tests for the placement and bucket-rebuild invariants.

use proptest::collection::hash_set;
use proptest::prelude::*;
use proptest::sample::Index;

use crate::buckets::{build_initial, rebuild_buckets};
use crate::placement::place_of;
use crate::types::{NodeId, TriggerKey};

fn node_ids(min: usize, max: usize) -> impl Strategy<Value = Vec<NodeId>> {
    hash_set(any::<u32>(), min..=max).prop_map(|set| set.into_iter().map(NodeId).collect())
}

fn trigger_key() -> impl Strategy<Value = TriggerKey> {
    ("[a-z]{1,12}", "[a-z]{1,12}").prop_map(|(t, k)| TriggerKey::new(t, k))
}

proptest! {
    /// Invariant 1: a bucket table is always a bijection onto the member set
    /// it was built from -- every member appears in exactly one bucket.
    #[test]
    fn bucket_table_is_a_bijection(members in node_ids(1, 50)) {
        let table = build_initial(&members).unwrap();
        let mut seen = std::collections::HashSet::new();
        for node in &table.buckets {
            prop_assert!(seen.insert(*node), "node {:?} appeared in more than one bucket", node);
        }
        prop_assert_eq!(seen.len(), table.len());
    }

    /// Invariant 1 (rebuild variant): rebuilding from any previous table still
    /// produces a bijection over the new member set, regardless of growth,
    /// shrinkage, or disjoint membership.
    #[test]
    fn rebuild_is_always_a_bijection(
        before in node_ids(1, 30),
        after in node_ids(1, 30),
    ) {
        let old_table = build_initial(&before).unwrap();
        let new_table = rebuild_buckets(Some(&old_table), &after).unwrap();

        let mut expected: Vec<NodeId> = after.clone();
        expected.sort_unstable();
        expected.dedup();
        prop_assert_eq!(new_table.len(), expected.len());

        let mut actual = new_table.buckets.clone();
        actual.sort_unstable();
        prop_assert_eq!(actual, expected);
    }

    /// Invariant 2: a surviving member's slot never changes unless the new
    /// table is smaller than its old slot index or another survivor already
    /// claimed that slot from an even lower index.
    #[test]
    fn survivors_keep_their_slot_when_uncontested(
        before in node_ids(2, 30),
        leaving_idx in any::<Index>(),
    ) {
        let old_table = build_initial(&before).unwrap();
        let leaver = old_table.buckets[leaving_idx.index(old_table.len())];
        let after: Vec<NodeId> = old_table.buckets.iter().copied().filter(|n| *n != leaver).collect();
        prop_assume!(!after.is_empty());

        let new_table = rebuild_buckets(Some(&old_table), &after).unwrap();

        for (slot, node) in old_table.buckets.iter().enumerate() {
            if *node == leaver {
                continue;
            }
            if slot < new_table.len() {
                prop_assert_eq!(
                    new_table.buckets[slot], *node,
                    "survivor at slot {} should keep its slot when only one member departs",
                    slot
                );
            }
        }
    }

    /// Invariant 3: placement is a pure function of the key and the table --
    /// calling it twice with the same inputs gives the same answer.
    #[test]
    fn placement_is_deterministic(members in node_ids(1, 40), key in trigger_key()) {
        let table = build_initial(&members).unwrap();
        let a = place_of(&key, &table);
        let b = place_of(&key, &table);
        prop_assert_eq!(a, b);
    }

    /// Invariant 6: `placeOf` only ever returns a node that is actually present
    /// in the bucket table -- it never invents an owner.
    #[test]
    fn placement_returns_only_table_members(members in node_ids(1, 40), key in trigger_key()) {
        let table = build_initial(&members).unwrap();
        let owner = place_of(&key, &table).unwrap();
        prop_assert!(table.buckets.contains(&owner));
    }

    /// Invariant 4: growing the membership by exactly one node remaps no more
    /// than roughly `2/n` of keys (jump consistent hash guarantees ~`1/n`;
    /// the rebuild's slot-stealing for contested indices can double that in
    /// the worst case, so this is a loose upper bound, not the tight
    /// jump-hash bound exercised directly in `placement::tests`).
    #[test]
    fn adding_one_member_causes_low_churn(members in node_ids(5, 60), new_id in any::<u32>()) {
        let before = build_initial(&members).unwrap();
        prop_assume!(!members.contains(&NodeId(new_id)));

        let mut after_members = members.clone();
        after_members.push(NodeId(new_id));
        let after = rebuild_buckets(Some(&before), &after_members).unwrap();

        let sample_keys: Vec<TriggerKey> = (0..500).map(|i| TriggerKey::new("tenant", format!("trigger-{i}"))).collect();
        let mut moved = 0;
        for key in &sample_keys {
            let owner_before = place_of(key, &before).unwrap();
            let owner_after = place_of(key, &after).unwrap();
            if owner_before != owner_after {
                moved += 1;
            }
        }
        let n = after.len() as f64;
        let fraction = f64::from(moved) / sample_keys.len() as f64;
        prop_assert!(
            fraction < (2.5 / n).max(0.2),
            "expected low churn growing from {} to {} members, got {fraction}",
            members.len(),
            after.len()
        );
    }
}
