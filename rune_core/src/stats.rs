use rune_runtime::{ExchangeStatus, Member};

use crate::{catalog::Catalog, state::RegistryState};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub members: usize,
    pub total_fragments: u64,
    pub total_points: u64,
    /// Rounded half up.
    pub average_points: u64,
    /// Fragment totals per declarable tier, in catalog order.
    pub fragments_by_rarity: Vec<(String, u64)>,
    pub pending_exchanges: usize,
    pub corps_complete_sets: u64,
}

/// Stored points when present, otherwise scored from the catalog.
pub fn member_points(catalog: &Catalog, member: &Member) -> u64 {
    member
        .points
        .unwrap_or_else(|| catalog.points_for(&member.inventory))
}

pub fn compute_stats(state: &RegistryState, catalog: &Catalog) -> RegistryStats {
    let members = state.members.len();
    let total_fragments = state.members.iter().map(Member::total_fragments).sum();
    let total_points: u64 = state
        .members
        .iter()
        .map(|member| member_points(catalog, member))
        .sum();
    let average_points = match members as u64 {
        0 => 0,
        count => (2 * total_points + count) / (2 * count),
    };

    let fragments_by_rarity = catalog
        .declarable_tiers()
        .map(|tier| {
            let held = state
                .members
                .iter()
                .flat_map(|member| member.inventory.iter())
                .filter(|entry| entry.rarity() == tier.id)
                .map(|entry| entry.total_fragments())
                .sum();
            (tier.id.clone(), held)
        })
        .collect();

    RegistryStats {
        members,
        total_fragments,
        total_points,
        average_points,
        fragments_by_rarity,
        pending_exchanges: state
            .exchange_requests
            .iter()
            .filter(|request| request.status == ExchangeStatus::Pending)
            .count(),
        corps_complete_sets: state
            .corps_stock
            .iter()
            .map(|entry| u64::from(entry.complete_sets()))
            .sum(),
    }
}
