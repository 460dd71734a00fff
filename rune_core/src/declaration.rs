//! Member self-declaration of fragment holdings.

use std::collections::HashMap;

use rune_runtime::{
    ActivityAction, DeclarationLine, EntryKey, InventoryEntry, Member, MemberId,
};

use crate::{
    catalog::Catalog,
    error::RegistryError,
    state::{MutationContext, RegistryState},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclarationOutcome {
    pub member: Member,
    /// `false` when an existing member's inventory was replaced.
    pub created: bool,
}

/// Running preview of a declaration form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeclarationSummary {
    pub fragments: u64,
    pub points: u64,
}

/// Folds declaration lines into inventory entries, one per key in first-seen
/// order.
///
/// Every line's rarity must be declarable and every line's type known,
/// whatever its quantity. Lines with a non-positive quantity are then
/// dropped; if none remain the declaration is empty.
pub fn build_inventory(
    catalog: &Catalog,
    lines: &[DeclarationLine],
) -> Result<Vec<InventoryEntry>, RegistryError> {
    for line in lines {
        if !catalog.is_declarable(&line.rarity) {
            return Err(RegistryError::NonDeclarableRarity(line.rarity.clone()));
        }
        if !catalog.is_known_type(&line.rune_type) {
            return Err(RegistryError::UnknownRuneType(line.rune_type.clone()));
        }
    }

    let mut inventory: Vec<InventoryEntry> = Vec::new();
    let mut index: HashMap<EntryKey, usize> = HashMap::new();
    for line in lines.iter().filter(|line| line.quantity > 0) {
        let amount = u32::try_from(line.quantity).unwrap_or(u32::MAX);
        let key = line.key();
        let position = *index.entry(key.clone()).or_insert_with(|| {
            inventory.push(InventoryEntry::empty(key.rune_type, key.rarity));
            inventory.len() - 1
        });
        inventory[position].update_fragments(|tally| tally.add(line.part, amount));
    }

    if inventory.is_empty() {
        return Err(RegistryError::EmptyDeclaration);
    }
    Ok(inventory)
}

/// Records a declaration. A member whose first and last names both match
/// exactly has their whole inventory replaced; anyone else is added.
pub fn declare(
    state: &mut RegistryState,
    ctx: &mut MutationContext<'_>,
    first_name: &str,
    last_name: &str,
    lines: &[DeclarationLine],
) -> Result<DeclarationOutcome, RegistryError> {
    let first_name = first_name.trim();
    let last_name = last_name.trim();
    if first_name.is_empty() || last_name.is_empty() {
        return Err(RegistryError::MissingIdentity);
    }

    let inventory = build_inventory(ctx.catalog, lines)?;
    let points = ctx.points_for(&inventory);

    let (member, created) = match state.member_by_name_mut(first_name, last_name) {
        Some(existing) => {
            existing.inventory = inventory;
            existing.points = points;
            (existing.clone(), false)
        }
        None => {
            let member = Member {
                id: MemberId(ctx.next_id()),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                inventory,
                points,
            };
            state.members.push(member.clone());
            (member, true)
        }
    };

    let (action, verb) = if created {
        (ActivityAction::Declaration, "new declaration")
    } else {
        (ActivityAction::Update, "declaration updated")
    };
    let details = match member.points {
        Some(points) => format!("{verb}: {} ({points} pts)", member.display_name()),
        None => format!("{verb}: {}", member.display_name()),
    };
    ctx.log(state, action, details);

    tracing::info!(
        target: "rune_registry::session",
        member = %member.id,
        entries = member.inventory.len(),
        created,
        "declaration.recorded"
    );
    Ok(DeclarationOutcome { member, created })
}

/// Fragment and point totals of a form in progress. Lines with an unknown
/// rarity or a non-positive quantity do not count.
pub fn summarize_lines(catalog: &Catalog, lines: &[DeclarationLine]) -> DeclarationSummary {
    lines
        .iter()
        .filter(|line| line.quantity > 0 && catalog.tier(&line.rarity).is_some())
        .fold(DeclarationSummary::default(), |mut summary, line| {
            let quantity = line.quantity.unsigned_abs();
            summary.fragments += quantity;
            summary.points += catalog.fragment_value(&line.rarity) * quantity;
            summary
        })
}
