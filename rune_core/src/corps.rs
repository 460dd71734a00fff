//! Shared corps stock and the exchange-request board.

use rune_runtime::{
    ActivityAction, EntryKey, ExchangeRequest, ExchangeStatus, FragmentPart, InventoryEntry,
    SchemaFeatures,
};

use crate::{
    admin::AdminSession,
    error::RegistryError,
    state::{MutationContext, RegistryState},
};

fn require(
    ctx: &MutationContext<'_>,
    feature: SchemaFeatures,
    name: &'static str,
) -> Result<(), RegistryError> {
    if ctx.features().contains(feature) {
        Ok(())
    } else {
        Err(RegistryError::FeatureDisabled(name))
    }
}

fn require_catalog_key(ctx: &MutationContext<'_>, key: &EntryKey) -> Result<(), RegistryError> {
    if !ctx.catalog.is_known_type(&key.rune_type) {
        return Err(RegistryError::UnknownRuneType(key.rune_type.clone()));
    }
    if ctx.catalog.tier(&key.rarity).is_none() {
        return Err(RegistryError::UnknownRarity(key.rarity.clone()));
    }
    Ok(())
}

/// Adds donated fragments to the stock. Any tier may be donated, including
/// ones members cannot declare. Returns the stock entry afterwards, or
/// `None` if it holds nothing.
pub fn record_donation(
    _session: &AdminSession,
    state: &mut RegistryState,
    ctx: &mut MutationContext<'_>,
    key: &EntryKey,
    part: FragmentPart,
    quantity: u32,
) -> Result<Option<InventoryEntry>, RegistryError> {
    require(ctx, SchemaFeatures::CORPS_STOCK, "CORPS_STOCK")?;
    require_catalog_key(ctx, key)?;

    let position = match state.corps_stock.iter().position(|entry| entry.matches(key)) {
        Some(position) => position,
        None => {
            state
                .corps_stock
                .push(InventoryEntry::empty(key.rune_type.clone(), key.rarity.clone()));
            state.corps_stock.len() - 1
        }
    };
    state.corps_stock[position].update_fragments(|tally| tally.add(part, quantity));

    let entry = state.corps_stock[position].clone();
    if entry.fragments().is_empty() {
        state.corps_stock.remove(position);
        return Ok(None);
    }

    ctx.log(
        state,
        ActivityAction::Donation,
        format!("{quantity} x {key} {part} donated to the corps"),
    );
    Ok(Some(entry))
}

/// Takes one of each part out of the stock, saturating at zero. An entry
/// emptied by the withdrawal is removed.
pub fn withdraw_set(
    _session: &AdminSession,
    state: &mut RegistryState,
    ctx: &mut MutationContext<'_>,
    key: &EntryKey,
) -> Result<Option<InventoryEntry>, RegistryError> {
    require(ctx, SchemaFeatures::CORPS_STOCK, "CORPS_STOCK")?;

    let position = state
        .corps_stock
        .iter()
        .position(|entry| entry.matches(key))
        .ok_or_else(|| RegistryError::UnknownEntry(key.clone()))?;
    state.corps_stock[position].update_fragments(|tally| tally.withdraw_one_each());
    let remaining = if state.corps_stock[position].fragments().is_empty() {
        state.corps_stock.remove(position);
        None
    } else {
        Some(state.corps_stock[position].clone())
    };

    ctx.log(
        state,
        ActivityAction::Withdrawal,
        format!("one {key} rune withdrawn from the corps stock"),
    );
    Ok(remaining)
}

/// Files a member's request for a missing part. Open to anyone.
pub fn request_exchange(
    state: &mut RegistryState,
    ctx: &mut MutationContext<'_>,
    key: &EntryKey,
    part: FragmentPart,
    offer: u32,
    message: &str,
) -> Result<ExchangeRequest, RegistryError> {
    require(ctx, SchemaFeatures::EXCHANGE_BOARD, "EXCHANGE_BOARD")?;
    require_catalog_key(ctx, key)?;

    let request = ExchangeRequest {
        id: ctx.next_id(),
        rune_type: key.rune_type.clone(),
        rarity: key.rarity.clone(),
        part,
        offer,
        message: message.trim().to_string(),
        status: ExchangeStatus::Pending,
        date: ctx.timestamp(),
    };
    state.exchange_requests.push(request.clone());

    ctx.log(
        state,
        ActivityAction::Exchange,
        format!("request {} opened for {key} {part}", request.id),
    );
    Ok(request)
}

pub fn transition_request(
    _session: &AdminSession,
    state: &mut RegistryState,
    ctx: &mut MutationContext<'_>,
    id: u64,
    status: ExchangeStatus,
) -> Result<ExchangeRequest, RegistryError> {
    require(ctx, SchemaFeatures::EXCHANGE_BOARD, "EXCHANGE_BOARD")?;

    let request = state
        .request_mut(id)
        .ok_or(RegistryError::UnknownRequest(id))?;
    request.status = status;
    let request = request.clone();

    ctx.log(
        state,
        ActivityAction::Exchange,
        format!("request {id} marked {status}"),
    );
    Ok(request)
}

pub fn delete_request(
    _session: &AdminSession,
    state: &mut RegistryState,
    ctx: &mut MutationContext<'_>,
    id: u64,
) -> Result<(), RegistryError> {
    require(ctx, SchemaFeatures::EXCHANGE_BOARD, "EXCHANGE_BOARD")?;

    let before = state.exchange_requests.len();
    state.exchange_requests.retain(|request| request.id != id);
    if state.exchange_requests.len() == before {
        return Err(RegistryError::UnknownRequest(id));
    }

    ctx.log(state, ActivityAction::Exchange, format!("request {id} deleted"));
    Ok(())
}

/// Requests not yet processed, oldest first.
pub fn open_requests(requests: &[ExchangeRequest]) -> impl Iterator<Item = &ExchangeRequest> {
    requests
        .iter()
        .filter(|request| request.status != ExchangeStatus::Processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{admin::test_session, catalog::Catalog, clock::IdAllocator, config::RegistryConfig};
    use chrono::{TimeZone, Utc};
    use rune_runtime::FragmentTally;

    fn with_ctx<T>(
        features: SchemaFeatures,
        state: &mut RegistryState,
        op: impl FnOnce(&mut RegistryState, &mut MutationContext<'_>) -> T,
    ) -> T {
        let catalog = Catalog::builtin();
        let config = RegistryConfig::default().with_features(features);
        let mut ids = IdAllocator::default();
        let now = Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap();
        let mut ctx = MutationContext::new(&catalog, &config, now, &mut ids);
        op(state, &mut ctx)
    }

    fn all() -> SchemaFeatures {
        SchemaFeatures::all()
    }

    #[test]
    fn donations_accumulate_and_accept_lowest_tier() {
        let session = test_session();
        let mut state = RegistryState::default();
        let key = EntryKey::new("Vie", "Commune");
        for part in FragmentPart::ALL {
            with_ctx(all(), &mut state, |state, ctx| {
                record_donation(&session, state, ctx, &key, part, 2)
            })
            .unwrap();
        }
        assert_eq!(state.corps_stock.len(), 1);
        assert_eq!(state.corps_stock[0].complete_sets(), 2);
        assert_eq!(state.activity_logs.len(), 4);
    }

    #[test]
    fn zero_donation_leaves_no_empty_entry() {
        let session = test_session();
        let mut state = RegistryState::default();
        let key = EntryKey::new("Vie", "Rare");
        let entry = with_ctx(all(), &mut state, |state, ctx| {
            record_donation(&session, state, ctx, &key, FragmentPart::First, 0)
        })
        .unwrap();
        assert!(entry.is_none());
        assert!(state.corps_stock.is_empty());
    }

    #[test]
    fn withdrawal_takes_one_of_each_and_prunes() {
        let session = test_session();
        let key = EntryKey::new("Vie", "Rare");
        let mut state = RegistryState {
            corps_stock: vec![InventoryEntry::with_fragments(
                "Vie",
                "Rare",
                FragmentTally::from_counts([1, 1, 1, 1]),
            )],
            ..RegistryState::default()
        };
        let remaining = with_ctx(all(), &mut state, |state, ctx| {
            withdraw_set(&session, state, ctx, &key)
        })
        .unwrap();
        assert!(remaining.is_none());
        assert!(state.corps_stock.is_empty());

        let again = with_ctx(all(), &mut state, |state, ctx| {
            withdraw_set(&session, state, ctx, &key)
        });
        assert_eq!(again, Err(RegistryError::UnknownEntry(key)));
    }

    #[test]
    fn partial_withdrawal_saturates_at_zero() {
        let session = test_session();
        let key = EntryKey::new("Vie", "Rare");
        let mut state = RegistryState {
            corps_stock: vec![InventoryEntry::with_fragments(
                "Vie",
                "Rare",
                FragmentTally::from_counts([3, 0, 1, 1]),
            )],
            ..RegistryState::default()
        };
        let remaining = with_ctx(all(), &mut state, |state, ctx| {
            withdraw_set(&session, state, ctx, &key)
        })
        .unwrap()
        .unwrap();
        assert_eq!(remaining.fragments(), &FragmentTally::from_counts([2, 0, 0, 0]));
        assert_eq!(state.corps_stock[0].fragments().total(), 2);
    }

    #[test]
    fn stock_requires_the_feature() {
        let session = test_session();
        let mut state = RegistryState::default();
        let result = with_ctx(SchemaFeatures::LEDGER, &mut state, |state, ctx| {
            record_donation(&session, state, ctx, &EntryKey::new("Vie", "Rare"), FragmentPart::First, 1)
        });
        assert_eq!(result, Err(RegistryError::FeatureDisabled("CORPS_STOCK")));
    }

    #[test]
    fn request_lifecycle() {
        let session = test_session();
        let mut state = RegistryState::default();
        let key = EntryKey::new("Vol de vie", "Épique");
        let request = with_ctx(all(), &mut state, |state, ctx| {
            request_exchange(state, ctx, &key, FragmentPart::Third, 2, " need 3/4 ")
        })
        .unwrap();
        assert_eq!(request.status, ExchangeStatus::Pending);
        assert_eq!(request.message, "need 3/4");
        assert_eq!(open_requests(&state.exchange_requests).count(), 1);

        let updated = with_ctx(all(), &mut state, |state, ctx| {
            transition_request(&session, state, ctx, request.id, ExchangeStatus::Processed)
        })
        .unwrap();
        assert_eq!(updated.status, ExchangeStatus::Processed);
        assert_eq!(open_requests(&state.exchange_requests).count(), 0);

        with_ctx(all(), &mut state, |state, ctx| {
            delete_request(&session, state, ctx, request.id)
        })
        .unwrap();
        assert!(state.exchange_requests.is_empty());

        let missing = with_ctx(all(), &mut state, |state, ctx| {
            delete_request(&session, state, ctx, request.id)
        });
        assert_eq!(missing, Err(RegistryError::UnknownRequest(request.id)));
    }
}
