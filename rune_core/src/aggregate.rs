//! Public, anonymized view of the whole registry: every member's fragments
//! folded into one entry per (type, rarity).

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use rune_runtime::{EntryKey, FragmentTally, InventoryEntry};

use crate::catalog::Catalog;
use crate::config::InventoryView;

#[derive(Debug, Clone, Copy)]
pub enum AggregateMode<'a> {
    /// One row per catalog type x display tier, zero rows included. Keys
    /// outside that grid are ignored.
    Complete(&'a Catalog),
    /// One row per key actually held, zero totals omitted, key order.
    Sparse,
}

impl<'a> AggregateMode<'a> {
    pub fn for_view(view: InventoryView, catalog: &'a Catalog) -> Self {
        match view {
            InventoryView::Complete => AggregateMode::Complete(catalog),
            InventoryView::Sparse => AggregateMode::Sparse,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateEntry {
    pub entry: InventoryEntry,
    /// Number of inventories that contributed at least one fragment.
    pub holders: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateInventory {
    entries: Vec<AggregateEntry>,
}

impl AggregateInventory {
    pub fn entries(&self) -> &[AggregateEntry] {
        &self.entries
    }

    pub fn get(&self, key: &EntryKey) -> Option<&AggregateEntry> {
        self.entries.iter().find(|row| row.entry.matches(key))
    }

    pub fn total_fragments(&self) -> u64 {
        self.entries.iter().map(|row| row.entry.total_fragments()).sum()
    }

    pub fn total_complete_sets(&self) -> u64 {
        self.entries
            .iter()
            .map(|row| u64::from(row.entry.complete_sets()))
            .sum()
    }

    pub fn filtered<'s>(
        &'s self,
        filter: &'s InventoryFilter,
    ) -> impl Iterator<Item = &'s AggregateEntry> + 's {
        self.entries.iter().filter(move |row| filter.matches(&row.entry))
    }
}

/// Exact-match type and rarity filter. `None` matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryFilter {
    pub rune_type: Option<String>,
    pub rarity: Option<String>,
}

impl InventoryFilter {
    pub fn matches(&self, entry: &InventoryEntry) -> bool {
        let type_ok = self
            .rune_type
            .as_deref()
            .map_or(true, |wanted| entry.rune_type() == wanted);
        let rarity_ok = self
            .rarity
            .as_deref()
            .map_or(true, |wanted| entry.rarity() == wanted);
        type_ok && rarity_ok
    }
}

struct Slot {
    key: EntryKey,
    tally: FragmentTally,
    holders: u32,
}

impl Slot {
    fn new(key: EntryKey) -> Self {
        Self {
            key,
            tally: FragmentTally::zero(),
            holders: 0,
        }
    }

    fn finish(self) -> AggregateEntry {
        AggregateEntry {
            entry: InventoryEntry::with_fragments(self.key.rune_type, self.key.rarity, self.tally),
            holders: self.holders,
        }
    }
}

/// Folds every inventory into one aggregate. Part counts are summed and set
/// counts recomputed from the sums, so the result does not depend on the
/// order inventories are visited in.
pub fn aggregate<'e, I, O>(inventories: I, mode: AggregateMode<'_>) -> AggregateInventory
where
    I: IntoIterator<Item = (O, &'e [InventoryEntry])>,
    O: fmt::Display,
{
    match mode {
        AggregateMode::Complete(catalog) => aggregate_complete(inventories, catalog),
        AggregateMode::Sparse => aggregate_sparse(inventories),
    }
}

fn aggregate_complete<'e, I, O>(inventories: I, catalog: &Catalog) -> AggregateInventory
where
    I: IntoIterator<Item = (O, &'e [InventoryEntry])>,
    O: fmt::Display,
{
    let mut slots = Vec::with_capacity(catalog.rune_types().len() * catalog.display_order().len());
    let mut index = HashMap::new();
    for rune_type in catalog.rune_types() {
        for rarity in catalog.display_order() {
            let key = EntryKey::new(rune_type.clone(), rarity.clone());
            index.insert(key.clone(), slots.len());
            slots.push(Slot::new(key));
        }
    }

    for (owner, entries) in inventories {
        for entry in entries {
            match index.get(&entry.key()) {
                Some(&position) => contribute(&mut slots[position], entry),
                None => tracing::trace!(
                    target: "rune_registry::aggregate",
                    owner = %owner,
                    key = %entry.key(),
                    "aggregate.skipped_unlisted_key"
                ),
            }
        }
    }

    AggregateInventory {
        entries: slots.into_iter().map(Slot::finish).collect(),
    }
}

fn aggregate_sparse<'e, I, O>(inventories: I) -> AggregateInventory
where
    I: IntoIterator<Item = (O, &'e [InventoryEntry])>,
    O: fmt::Display,
{
    let mut slots: BTreeMap<EntryKey, Slot> = BTreeMap::new();
    for (_owner, entries) in inventories {
        for entry in entries {
            let key = entry.key();
            let slot = slots
                .entry(key.clone())
                .or_insert_with(|| Slot::new(key));
            contribute(slot, entry);
        }
    }

    AggregateInventory {
        entries: slots
            .into_values()
            .filter(|slot| !slot.tally.is_empty())
            .map(Slot::finish)
            .collect(),
    }
}

fn contribute(slot: &mut Slot, entry: &InventoryEntry) {
    if entry.total_fragments() > 0 {
        slot.holders += 1;
    }
    slot.tally.absorb(entry.fragments());
}
