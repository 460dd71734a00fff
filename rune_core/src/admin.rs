//! Admin gate and the member-editing operations behind it.
//!
//! Every operation here takes an [`AdminSession`], which can only be obtained
//! from [`AdminGate::authorize`].

use chrono::{DateTime, Utc};
use rune_runtime::{ActivityAction, EntryKey, FragmentPart, InventoryEntry, Member, MemberId};

use crate::{
    error::RegistryError,
    state::{MutationContext, RegistryState},
};

/// Checks the shared admin passphrase.
#[derive(Debug, Clone)]
pub struct AdminGate {
    passphrase: String,
}

/// Proof that the passphrase was presented in this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSession {
    granted_at: DateTime<Utc>,
}

impl AdminSession {
    pub fn granted_at(&self) -> DateTime<Utc> {
        self.granted_at
    }
}

impl AdminGate {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self {
            passphrase: passphrase.into(),
        }
    }

    pub fn authorize(
        &self,
        attempt: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminSession, RegistryError> {
        if attempt == self.passphrase {
            Ok(AdminSession { granted_at: now })
        } else {
            tracing::warn!(target: "rune_registry::session", "admin.denied");
            Err(RegistryError::NotAuthorized)
        }
    }
}

fn clamp_count(value: i64) -> u32 {
    u32::try_from(value.max(0)).unwrap_or(u32::MAX)
}

fn member_mut(state: &mut RegistryState, id: MemberId) -> Result<&mut Member, RegistryError> {
    state.member_mut(id).ok_or(RegistryError::UnknownMember(id))
}

/// Applies `edit` to one member, then refreshes the member's points and logs
/// the change.
fn edit_member<T, F>(
    state: &mut RegistryState,
    ctx: &mut MutationContext<'_>,
    id: MemberId,
    describe: &str,
    edit: F,
) -> Result<(Member, T), RegistryError>
where
    F: FnOnce(&mut Member) -> Result<T, RegistryError>,
{
    let member = member_mut(state, id)?;
    let value = edit(member)?;
    member.points = ctx.points_for(&member.inventory);
    let member = member.clone();

    ctx.log(
        state,
        ActivityAction::AdminEdit,
        format!("{describe} for {}", member.display_name()),
    );
    Ok((member, value))
}

/// Sets one part count, clamping negatives to zero.
pub fn set_fragment_count(
    _session: &AdminSession,
    state: &mut RegistryState,
    ctx: &mut MutationContext<'_>,
    id: MemberId,
    key: &EntryKey,
    part: FragmentPart,
    value: i64,
) -> Result<Member, RegistryError> {
    let count = clamp_count(value);
    edit_member(state, ctx, id, &format!("{key} {part} set to {count}"), |member| {
        let entry = member
            .entry_mut(key)
            .ok_or_else(|| RegistryError::UnknownEntry(key.clone()))?;
        entry.update_fragments(|tally| tally.set(part, count));
        Ok(())
    })
    .map(|(member, ())| member)
}

/// Moves one part count by `delta`, never below zero.
pub fn adjust_fragment_count(
    session: &AdminSession,
    state: &mut RegistryState,
    ctx: &mut MutationContext<'_>,
    id: MemberId,
    key: &EntryKey,
    part: FragmentPart,
    delta: i64,
) -> Result<Member, RegistryError> {
    let current = state
        .member(id)
        .ok_or(RegistryError::UnknownMember(id))?
        .entry(key)
        .ok_or_else(|| RegistryError::UnknownEntry(key.clone()))?
        .fragments()
        .get(part);
    let target = i64::from(current).saturating_add(delta);
    set_fragment_count(session, state, ctx, id, key, part, target)
}

pub fn add_inventory_entry(
    _session: &AdminSession,
    state: &mut RegistryState,
    ctx: &mut MutationContext<'_>,
    id: MemberId,
    key: &EntryKey,
) -> Result<Member, RegistryError> {
    if !ctx.catalog.is_known_type(&key.rune_type) {
        return Err(RegistryError::UnknownRuneType(key.rune_type.clone()));
    }
    if ctx.catalog.tier(&key.rarity).is_none() {
        return Err(RegistryError::UnknownRarity(key.rarity.clone()));
    }

    edit_member(state, ctx, id, &format!("{key} added"), |member| {
        if member.entry(key).is_some() {
            return Err(RegistryError::DuplicateEntry(key.clone()));
        }
        member
            .inventory
            .push(InventoryEntry::empty(key.rune_type.clone(), key.rarity.clone()));
        Ok(())
    })
    .map(|(member, ())| member)
}

pub fn remove_inventory_entry(
    _session: &AdminSession,
    state: &mut RegistryState,
    ctx: &mut MutationContext<'_>,
    id: MemberId,
    key: &EntryKey,
) -> Result<Member, RegistryError> {
    edit_member(state, ctx, id, &format!("{key} removed"), |member| {
        let before = member.inventory.len();
        member.inventory.retain(|entry| !entry.matches(key));
        if member.inventory.len() == before {
            return Err(RegistryError::UnknownEntry(key.clone()));
        }
        Ok(())
    })
    .map(|(member, ())| member)
}

#[cfg(test)]
pub(crate) fn test_session() -> AdminSession {
    AdminSession {
        granted_at: DateTime::<Utc>::default(),
    }
}
