//! Keyed last-write-wins merge of entity collections.
//!
//! Replacement is whole-entity: there is no field-level reconciliation, and
//! two entities are only ever considered the same when their keys match.

use std::collections::HashMap;
use std::hash::Hash;

use rune_runtime::{ActivityLogEntry, EntryKey, ExchangeRequest, InventoryEntry, Member, MemberId};

use crate::activity;
use crate::state::RegistryState;

/// Merges `incoming` over `base`.
///
/// Entities only in `base` keep their position; an incoming entity whose key
/// is already present replaces it in place; new keys are appended in
/// `incoming` order.
pub fn merge_by_key<T, K, F>(base: &[T], incoming: &[T], key_fn: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    let mut merged: Vec<T> = base.to_vec();
    let mut index: HashMap<K, usize> = HashMap::with_capacity(merged.len() + incoming.len());
    for (position, entity) in merged.iter().enumerate() {
        index.entry(key_fn(entity)).or_insert(position);
    }

    for entity in incoming {
        let key = key_fn(entity);
        match index.get(&key) {
            Some(&position) => merged[position] = entity.clone(),
            None => {
                index.insert(key, merged.len());
                merged.push(entity.clone());
            }
        }
    }

    merged
}

/// Collapses duplicate keys, keeping the first position and the last content.
pub fn dedupe_by_key<T, K, F>(items: &[T], key_fn: F) -> Vec<T>
where
    T: Clone,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    merge_by_key(&[], items, key_fn)
}

pub fn member_key(member: &Member) -> MemberId {
    member.id
}

pub fn entry_key(entry: &InventoryEntry) -> EntryKey {
    entry.key()
}

pub fn request_key(request: &ExchangeRequest) -> u64 {
    request.id
}

pub fn log_key(entry: &ActivityLogEntry) -> u64 {
    entry.id
}

/// Reconciles local state with a freshly read persisted state, the persisted
/// side winning every key both hold.
pub fn merge_states(
    local: &RegistryState,
    incoming: &RegistryState,
    log_capacity: usize,
) -> RegistryState {
    RegistryState {
        members: merge_by_key(&local.members, &incoming.members, member_key),
        activity_logs: activity::merge_logs(
            &local.activity_logs,
            &incoming.activity_logs,
            log_capacity,
        ),
        corps_stock: merge_by_key(&local.corps_stock, &incoming.corps_stock, entry_key),
        exchange_requests: merge_by_key(
            &local.exchange_requests,
            &incoming.exchange_requests,
            request_key,
        ),
        last_update: incoming
            .last_update
            .clone()
            .or_else(|| local.last_update.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rune_runtime::FragmentTally;

    #[derive(Debug, Clone, PartialEq)]
    struct Versioned {
        id: u32,
        value: &'static str,
    }

    fn v(id: u32, value: &'static str) -> Versioned {
        Versioned { id, value }
    }

    #[test]
    fn incoming_replaces_same_key() {
        let merged = merge_by_key(&[v(1, "a")], &[v(1, "b")], |e| e.id);
        assert_eq!(merged, vec![v(1, "b")]);
    }

    #[test]
    fn positions_follow_base_then_incoming() {
        let base = [v(1, "a"), v(2, "b"), v(3, "c")];
        let incoming = [v(4, "d"), v(2, "B"), v(5, "e")];
        let merged = merge_by_key(&base, &incoming, |e| e.id);
        assert_eq!(
            merged,
            vec![v(1, "a"), v(2, "B"), v(3, "c"), v(4, "d"), v(5, "e")]
        );
    }

    #[test]
    fn equal_content_under_different_keys_is_kept() {
        let merged = merge_by_key(&[v(1, "same")], &[v(2, "same")], |e| e.id);
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn empty_sides() {
        let empty: [Versioned; 0] = [];
        assert_eq!(merge_by_key(&empty, &[v(1, "a")], |e| e.id), vec![v(1, "a")]);
        assert_eq!(merge_by_key(&[v(1, "a")], &empty, |e| e.id), vec![v(1, "a")]);
    }

    #[test]
    fn stock_merges_on_composite_key() {
        let base = vec![
            InventoryEntry::with_fragments("Vie", "Rare", FragmentTally::from_counts([1, 1, 1, 1])),
            InventoryEntry::with_fragments("Vie", "Épique", FragmentTally::from_counts([2, 0, 0, 0])),
        ];
        let incoming = vec![InventoryEntry::with_fragments(
            "Vie",
            "Épique",
            FragmentTally::from_counts([3, 3, 3, 3]),
        )];
        let merged = merge_by_key(&base, &incoming, entry_key);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].complete_sets(), 3);
        assert_eq!(merged[0], base[0]);
    }

    #[test]
    fn dedupe_keeps_first_position_last_content() {
        let items = [v(1, "a"), v(2, "b"), v(1, "c")];
        assert_eq!(dedupe_by_key(&items, |e| e.id), vec![v(1, "c"), v(2, "b")]);
    }

    fn unique_collection() -> impl Strategy<Value = Vec<(u8, u16)>> {
        proptest::collection::btree_map(any::<u8>(), any::<u16>(), 0..24)
            .prop_map(|map| map.into_iter().collect())
    }

    proptest! {
        #[test]
        fn merge_is_idempotent(items in unique_collection()) {
            let merged = merge_by_key(&items, &items, |item| item.0);
            prop_assert_eq!(merged, items);
        }

        #[test]
        fn merge_never_loses_a_key(
            base in unique_collection(),
            incoming in unique_collection(),
        ) {
            let merged = merge_by_key(&base, &incoming, |item| item.0);
            for item in &incoming {
                prop_assert!(merged.contains(item));
            }
            for item in &base {
                prop_assert!(merged.iter().any(|m| m.0 == item.0));
            }
            let distinct: std::collections::BTreeSet<u8> =
                base.iter().chain(incoming.iter()).map(|item| item.0).collect();
            prop_assert_eq!(merged.len(), distinct.len());
        }
    }
}
