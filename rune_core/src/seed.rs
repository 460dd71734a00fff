//! Demo members for an empty deployment.

use rune_runtime::{ActivityAction, FragmentTally, InventoryEntry, Member, MemberId, SchemaFeatures};

use crate::{
    catalog::Catalog,
    state::{MutationContext, RegistryState},
};

pub fn sample_members(catalog: &Catalog, features: SchemaFeatures) -> Vec<Member> {
    let scored = |inventory: &[InventoryEntry]| {
        features
            .contains(SchemaFeatures::MEMBER_POINTS)
            .then(|| catalog.points_for(inventory))
    };

    let tanjiro = vec![
        InventoryEntry::with_fragments("Dégât", "Épique", FragmentTally::from_counts([2, 1, 2, 1])),
        InventoryEntry::with_fragments("Vitesse", "Rare", FragmentTally::from_counts([3, 2, 1, 2])),
    ];
    let zenitsu = vec![InventoryEntry::with_fragments(
        "Vitesse",
        "Légendaire",
        FragmentTally::from_counts([1, 0, 1, 1]),
    )];

    vec![
        Member {
            id: MemberId(1),
            first_name: "Tanjiro".into(),
            last_name: "Kamado".into(),
            points: scored(&tanjiro),
            inventory: tanjiro,
        },
        Member {
            id: MemberId(2),
            first_name: "Zenitsu".into(),
            last_name: "Agatsuma".into(),
            points: scored(&zenitsu),
            inventory: zenitsu,
        },
    ]
}

/// Seeds the sample members into a registry that has none. Returns whether
/// anything was added.
pub fn seed_if_empty(state: &mut RegistryState, ctx: &mut MutationContext<'_>) -> bool {
    if !state.members.is_empty() {
        return false;
    }
    state.members = sample_members(ctx.catalog, ctx.features());
    ctx.log(
        state,
        ActivityAction::System,
        "registry initialized with sample members".to_string(),
    );
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::IdAllocator, config::RegistryConfig};
    use chrono::{TimeZone, Utc};

    #[test]
    fn sample_points_follow_the_catalog() {
        let catalog = Catalog::builtin();
        let members = sample_members(&catalog, SchemaFeatures::LEDGER);
        assert_eq!(members[0].points, Some(320));
        assert_eq!(members[1].points, Some(300));
        assert_eq!(members[0].inventory[0].complete_sets(), 1);
        assert_eq!(members[1].inventory[0].complete_sets(), 0);
    }

    #[test]
    fn seeding_only_touches_empty_registries() {
        let catalog = Catalog::builtin();
        let config = RegistryConfig::default();
        let mut ids = IdAllocator::default();
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap();
        let mut ctx = MutationContext::new(&catalog, &config, now, &mut ids);

        let mut state = RegistryState::default();
        assert!(seed_if_empty(&mut state, &mut ctx));
        assert_eq!(state.members.len(), 2);
        assert_eq!(state.activity_logs[0].action, ActivityAction::System);

        assert!(!seed_if_empty(&mut state, &mut ctx));
        assert_eq!(state.activity_logs.len(), 1);
    }
}
