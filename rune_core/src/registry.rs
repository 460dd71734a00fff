//! The registry session: one in-memory copy of the registry synchronized
//! with a [`SnapshotStore`] on every command.

use std::fmt;
use std::sync::Arc;

use rune_runtime::{
    hash_snapshot, ActivityAction, ActivityLogEntry, EntryKey, ExchangeRequest, ExportDocument,
    InventoryEntry, Member, MemberId, RegistryCommand, SchemaFeatures,
};

use crate::{
    admin::{self, AdminGate, AdminSession},
    aggregate::{aggregate, AggregateInventory, AggregateMode},
    catalog::Catalog,
    clock::{Clock, IdAllocator},
    config::{InventoryView, RegistryConfig},
    corps,
    declaration::{self, DeclarationOutcome},
    error::RegistryError,
    export,
    merge::merge_states,
    seed,
    snapshot::{read_snapshot, write_snapshot, SnapshotRead},
    state::{MutationContext, RegistryState},
    stats::{compute_stats, RegistryStats},
    store::SnapshotStore,
};

/// Non-fatal condition met while talking to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    PersistenceUnavailable(String),
    PersistenceCorrupt(String),
    FeatureMismatch {
        persisted: SchemaFeatures,
        configured: SchemaFeatures,
    },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::PersistenceUnavailable(reason) => {
                write!(f, "storage unavailable, keeping changes in memory: {reason}")
            }
            Notice::PersistenceCorrupt(reason) => {
                write!(f, "stored registry could not be read and was ignored: {reason}")
            }
            Notice::FeatureMismatch {
                persisted,
                configured,
            } => write!(
                f,
                "stored registry was written with features {persisted:?}, this deployment uses {configured:?}"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandEffect {
    Declared(DeclarationOutcome),
    LoggedIn,
    LoggedOut,
    MemberEdited(Member),
    StockUpdated {
        key: EntryKey,
        entry: Option<InventoryEntry>,
    },
    RequestOpened(ExchangeRequest),
    RequestUpdated(ExchangeRequest),
    RequestDeleted(u64),
    Refreshed {
        changed: bool,
    },
    Exported(ExportDocument),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub effect: CommandEffect,
    pub notices: Vec<Notice>,
}

impl CommandOutcome {
    fn new(effect: CommandEffect, notices: Vec<Notice>) -> Self {
        Self { effect, notices }
    }
}

pub struct Registry<S: SnapshotStore> {
    store: S,
    catalog: Arc<Catalog>,
    config: Arc<RegistryConfig>,
    clock: Arc<dyn Clock>,
    gate: AdminGate,
    admin: Option<AdminSession>,
    state: RegistryState,
    ids: IdAllocator,
    last_hash: Option<u64>,
}

impl<S: SnapshotStore> Registry<S> {
    /// Loads the persisted registry, seeding sample members if configured.
    pub fn open(
        store: S,
        catalog: Arc<Catalog>,
        config: Arc<RegistryConfig>,
        clock: Arc<dyn Clock>,
    ) -> (Self, Vec<Notice>) {
        let gate = AdminGate::new(config.admin_passphrase());
        let mut registry = Self {
            store,
            catalog,
            config,
            clock,
            gate,
            admin: None,
            state: RegistryState::default(),
            ids: IdAllocator::default(),
            last_hash: None,
        };

        let (_, mut notices) = registry.pull();
        if registry.config.seed_sample_members() && registry.state.members.is_empty() {
            match registry.transact(|state, ctx| Ok(seed::seed_if_empty(state, ctx))) {
                Ok((_, seeded_notices)) => notices.extend(seeded_notices),
                Err(err) => tracing::warn!(
                    target: "rune_registry::session",
                    error = %err,
                    "seed.failed"
                ),
            }
        }

        tracing::info!(
            target: "rune_registry::session",
            key = registry.config.storage_key(),
            members = registry.state.members.len(),
            notices = notices.len(),
            "registry.opened"
        );
        (registry, notices)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn state(&self) -> &RegistryState {
        &self.state
    }

    pub fn is_admin(&self) -> bool {
        self.admin.is_some()
    }

    pub fn execute(&mut self, command: RegistryCommand) -> Result<CommandOutcome, RegistryError> {
        tracing::debug!(
            target: "rune_registry::session",
            command = command.name(),
            mutates = command.mutates(),
            "command.received"
        );
        if command.requires_admin() && self.admin.is_none() {
            tracing::warn!(
                target: "rune_registry::session",
                command = command.name(),
                "command.rejected=not_authorized"
            );
            return Err(RegistryError::NotAuthorized);
        }
        let session = self.admin.clone();

        match command {
            RegistryCommand::Declare {
                first_name,
                last_name,
                lines,
            } => self
                .transact(|state, ctx| {
                    declaration::declare(state, ctx, &first_name, &last_name, &lines)
                })
                .map(|(outcome, notices)| {
                    CommandOutcome::new(CommandEffect::Declared(outcome), notices)
                }),
            RegistryCommand::Login { passphrase } => self.login(&passphrase),
            RegistryCommand::Logout => {
                self.admin = None;
                tracing::info!(target: "rune_registry::session", "admin.logged_out");
                Ok(CommandOutcome::new(CommandEffect::LoggedOut, Vec::new()))
            }
            RegistryCommand::SetFragmentCount {
                member,
                key,
                part,
                value,
            } => {
                let session = authorized(&session)?;
                self.edit(|state, ctx| {
                    admin::set_fragment_count(session, state, ctx, member, &key, part, value)
                })
            }
            RegistryCommand::AdjustFragmentCount {
                member,
                key,
                part,
                delta,
            } => {
                let session = authorized(&session)?;
                self.edit(|state, ctx| {
                    admin::adjust_fragment_count(session, state, ctx, member, &key, part, delta)
                })
            }
            RegistryCommand::AddInventoryEntry { member, key } => {
                let session = authorized(&session)?;
                self.edit(|state, ctx| admin::add_inventory_entry(session, state, ctx, member, &key))
            }
            RegistryCommand::RemoveInventoryEntry { member, key } => {
                let session = authorized(&session)?;
                self.edit(|state, ctx| {
                    admin::remove_inventory_entry(session, state, ctx, member, &key)
                })
            }
            RegistryCommand::RecordDonation {
                key,
                part,
                quantity,
            } => {
                let session = authorized(&session)?;
                self.transact(|state, ctx| {
                    corps::record_donation(session, state, ctx, &key, part, quantity)
                })
                .map(|(entry, notices)| {
                    CommandOutcome::new(CommandEffect::StockUpdated { key, entry }, notices)
                })
            }
            RegistryCommand::WithdrawSet { key } => {
                let session = authorized(&session)?;
                self.transact(|state, ctx| corps::withdraw_set(session, state, ctx, &key))
                    .map(|(entry, notices)| {
                        CommandOutcome::new(CommandEffect::StockUpdated { key, entry }, notices)
                    })
            }
            RegistryCommand::RequestExchange {
                key,
                part,
                offer,
                message,
            } => self
                .transact(|state, ctx| {
                    corps::request_exchange(state, ctx, &key, part, offer, &message)
                })
                .map(|(request, notices)| {
                    CommandOutcome::new(CommandEffect::RequestOpened(request), notices)
                }),
            RegistryCommand::TransitionRequest { id, status } => {
                let session = authorized(&session)?;
                self.transact(|state, ctx| corps::transition_request(session, state, ctx, id, status))
                    .map(|(request, notices)| {
                        CommandOutcome::new(CommandEffect::RequestUpdated(request), notices)
                    })
            }
            RegistryCommand::DeleteRequest { id } => {
                let session = authorized(&session)?;
                self.transact(|state, ctx| corps::delete_request(session, state, ctx, id))
                    .map(|((), notices)| {
                        CommandOutcome::new(CommandEffect::RequestDeleted(id), notices)
                    })
            }
            RegistryCommand::Refresh => {
                let (changed, notices) = self.refresh();
                Ok(CommandOutcome::new(
                    CommandEffect::Refreshed { changed },
                    notices,
                ))
            }
            RegistryCommand::Export => self.export(),
        }
    }

    /// Re-reads the store and merges it into local state. Reports whether the
    /// persisted content changed since the last read or write.
    pub fn refresh(&mut self) -> (bool, Vec<Notice>) {
        self.pull()
    }

    /// Public inventory view in the configured mode.
    pub fn public_inventory(&self) -> AggregateInventory {
        self.public_inventory_as(self.config.inventory_view())
    }

    pub fn public_inventory_as(&self, view: InventoryView) -> AggregateInventory {
        let mode = AggregateMode::for_view(view, &self.catalog);
        aggregate(
            self.state
                .members
                .iter()
                .map(|member| (member.id, member.inventory.as_slice())),
            mode,
        )
    }

    pub fn stats(&self) -> RegistryStats {
        compute_stats(&self.state, &self.catalog)
    }

    pub fn corps_stock(&self) -> &[InventoryEntry] {
        &self.state.corps_stock
    }

    pub fn exchange_requests(&self) -> &[ExchangeRequest] {
        &self.state.exchange_requests
    }

    pub fn members(&self) -> Result<&[Member], RegistryError> {
        self.require_admin()?;
        Ok(&self.state.members)
    }

    pub fn member_details(&self, id: MemberId) -> Result<&Member, RegistryError> {
        self.require_admin()?;
        self.state.member(id).ok_or(RegistryError::UnknownMember(id))
    }

    pub fn activity_logs(&self) -> Result<&[ActivityLogEntry], RegistryError> {
        self.require_admin()?;
        Ok(&self.state.activity_logs)
    }

    fn require_admin(&self) -> Result<&AdminSession, RegistryError> {
        self.admin.as_ref().ok_or(RegistryError::NotAuthorized)
    }

    fn login(&mut self, passphrase: &str) -> Result<CommandOutcome, RegistryError> {
        let session = self.gate.authorize(passphrase, self.clock.now())?;
        self.admin = Some(session);
        tracing::info!(target: "rune_registry::session", "admin.logged_in");

        let notices = if self.config.features().contains(SchemaFeatures::ACTIVITY_LOG) {
            let ((), notices) = self.transact(|state, ctx| {
                ctx.log(state, ActivityAction::Admin, "admin access granted".to_string());
                Ok(())
            })?;
            notices
        } else {
            Vec::new()
        };
        Ok(CommandOutcome::new(CommandEffect::LoggedIn, notices))
    }

    fn export(&mut self) -> Result<CommandOutcome, RegistryError> {
        self.transact(|state, ctx| {
            let document = export::export_document(state, ctx.now);
            ctx.log(state, ActivityAction::Export, "registry exported".to_string());
            Ok(document)
        })
        .map(|(document, notices)| CommandOutcome::new(CommandEffect::Exported(document), notices))
    }

    fn edit<F>(&mut self, op: F) -> Result<CommandOutcome, RegistryError>
    where
        F: FnOnce(&mut RegistryState, &mut MutationContext<'_>) -> Result<Member, RegistryError>,
    {
        self.transact(op)
            .map(|(member, notices)| CommandOutcome::new(CommandEffect::MemberEdited(member), notices))
    }

    /// Read, merge, mutate, write. The mutation runs on a copy, so a failed
    /// operation leaves the session untouched apart from the merge.
    fn transact<T, F>(&mut self, op: F) -> Result<(T, Vec<Notice>), RegistryError>
    where
        F: FnOnce(&mut RegistryState, &mut MutationContext<'_>) -> Result<T, RegistryError>,
    {
        let (_, mut notices) = self.pull();

        let now = self.clock.now();
        let mut next = self.state.clone();
        let value = {
            let mut ctx = MutationContext::new(&self.catalog, &self.config, now, &mut self.ids);
            op(&mut next, &mut ctx)?
        };
        next.last_update = Some(crate::clock::timestamp(now));
        self.state = next;

        if let Some(notice) = self.push() {
            notices.push(notice);
        }
        Ok((value, notices))
    }

    fn pull(&mut self) -> (bool, Vec<Notice>) {
        let mut notices = Vec::new();
        let key = self.config.storage_key();
        match read_snapshot(&self.store, key) {
            Ok(SnapshotRead::Absent) => (false, notices),
            Ok(SnapshotRead::Loaded(snapshot)) => {
                let hash = hash_snapshot(&snapshot);
                let changed = self.last_hash != Some(hash);
                let configured = self.config.features();
                if changed && !snapshot.features.is_empty() && snapshot.features != configured {
                    tracing::warn!(
                        target: "rune_registry::store",
                        persisted = ?snapshot.features,
                        configured = ?configured,
                        "snapshot.feature_mismatch"
                    );
                    notices.push(Notice::FeatureMismatch {
                        persisted: snapshot.features,
                        configured,
                    });
                }

                let persisted = RegistryState::from_snapshot(snapshot);
                self.ids.observe(persisted.max_id());
                self.state = merge_states(
                    &self.state,
                    &persisted,
                    self.config.activity_log_capacity(),
                );
                self.last_hash = Some(hash);
                (changed, notices)
            }
            Ok(SnapshotRead::Corrupt(reason)) => {
                tracing::warn!(
                    target: "rune_registry::store",
                    key,
                    error = %reason,
                    "snapshot.corrupt"
                );
                notices.push(Notice::PersistenceCorrupt(reason));
                (false, notices)
            }
            Err(err) => {
                tracing::warn!(
                    target: "rune_registry::store",
                    key,
                    error = %err,
                    "snapshot.read_failed"
                );
                notices.push(Notice::PersistenceUnavailable(err.to_string()));
                (false, notices)
            }
        }
    }

    fn push(&mut self) -> Option<Notice> {
        let snapshot = self.state.to_snapshot(self.config.features());
        match write_snapshot(&self.store, self.config.storage_key(), &snapshot) {
            Ok(()) => {
                self.last_hash = Some(hash_snapshot(&snapshot));
                None
            }
            Err(err) => {
                tracing::warn!(
                    target: "rune_registry::store",
                    key = self.config.storage_key(),
                    error = %err,
                    "snapshot.write_failed"
                );
                Some(Notice::PersistenceUnavailable(err.to_string()))
            }
        }
    }
}

fn authorized(session: &Option<AdminSession>) -> Result<&AdminSession, RegistryError> {
    session.as_ref().ok_or(RegistryError::NotAuthorized)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{clock::ManualClock, store::MemoryStore};
    use chrono::{Duration, TimeZone, Utc};
    use rune_runtime::{parse_command_line, ExchangeStatus, FragmentPart};

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2026, 5, 4, 10, 0, 0).unwrap(),
        ))
    }

    fn open(store: MemoryStore, config: RegistryConfig) -> (Registry<MemoryStore>, Vec<Notice>) {
        Registry::open(store, Catalog::builtin(), Arc::new(config), clock())
    }

    fn run(registry: &mut Registry<MemoryStore>, line: &str) -> Result<CommandOutcome, RegistryError> {
        registry.execute(parse_command_line(line).expect("command parses"))
    }

    #[test]
    fn fresh_store_opens_empty_without_notices() {
        let (registry, notices) = open(MemoryStore::new(), RegistryConfig::default());
        assert!(notices.is_empty());
        assert!(registry.state().members.is_empty());
    }

    #[test]
    fn seeding_writes_sample_members() {
        let store = MemoryStore::new();
        let (registry, _) = open(store.clone(), RegistryConfig::default().with_sample_members(true));
        assert_eq!(registry.state().members.len(), 2);
        assert!(store.raw("anonymousRuneRegistry").is_some());

        let (reopened, _) = open(store, RegistryConfig::default().with_sample_members(true));
        assert_eq!(reopened.state().members.len(), 2);
    }

    #[test]
    fn declaration_persists_and_aggregates() {
        let store = MemoryStore::new();
        let (mut registry, _) = open(store.clone(), RegistryConfig::default());
        let outcome = run(
            &mut registry,
            "declare Jean Dupont Dégât:Épique:1/4:2 Dégât:Épique:2/4:1 Dégât:Épique:3/4:2 Dégât:Épique:4/4:1",
        )
        .unwrap();
        assert!(matches!(outcome.effect, CommandEffect::Declared(_)));
        assert!(outcome.notices.is_empty());

        let inventory = registry.public_inventory();
        let row = inventory.get(&EntryKey::new("Dégât", "Épique")).unwrap();
        assert_eq!(row.entry.complete_sets(), 1);

        let blob = store.raw("anonymousRuneRegistry").unwrap();
        assert!(blob.contains("\"firstName\":\"Jean\""));
        assert!(blob.contains("\"lastUpdate\""));
    }

    #[test]
    fn admin_commands_need_login_and_leave_store_untouched() {
        let store = MemoryStore::new();
        let (mut registry, _) = open(store.clone(), RegistryConfig::default().with_sample_members(true));
        let before = store.raw("anonymousRuneRegistry");

        assert_eq!(
            run(&mut registry, "set 1 Dégât:Épique 1/4 9"),
            Err(RegistryError::NotAuthorized)
        );
        assert_eq!(registry.members(), Err(RegistryError::NotAuthorized));
        assert_eq!(store.raw("anonymousRuneRegistry"), before);

        assert_eq!(run(&mut registry, "login nope"), Err(RegistryError::NotAuthorized));
        assert!(!registry.is_admin());

        run(&mut registry, "login 0711").unwrap();
        let outcome = run(&mut registry, "set 1 Dégât:Épique 1/4 9").unwrap();
        match outcome.effect {
            CommandEffect::MemberEdited(member) => {
                let entry = member.entry(&EntryKey::new("Dégât", "Épique")).unwrap();
                assert_eq!(entry.fragments().get(FragmentPart::First), 9);
            }
            other => panic!("unexpected effect {other:?}"),
        }
        assert_eq!(
            registry.activity_logs().unwrap()[0].action,
            ActivityAction::AdminEdit
        );

        run(&mut registry, "logout").unwrap();
        assert_eq!(
            run(&mut registry, "remove_entry 1 Dégât:Épique"),
            Err(RegistryError::NotAuthorized)
        );
    }

    #[test]
    fn failed_operation_changes_nothing() {
        let (mut registry, _) = open(MemoryStore::new(), RegistryConfig::default());
        let before = registry.state().clone();
        assert_eq!(
            run(&mut registry, "declare Jean Dupont Vie:Commune:1/4:3"),
            Err(RegistryError::NonDeclarableRarity("Commune".into()))
        );
        assert_eq!(registry.state(), &before);
    }

    #[test]
    fn corrupt_blob_keeps_local_state_and_writes_continue() {
        let store = MemoryStore::new();
        let (mut registry, _) = open(store.clone(), RegistryConfig::default());
        run(&mut registry, "declare Jean Dupont Vie:Rare:1/4:1").unwrap();

        store.save("anonymousRuneRegistry", "{ definitely not json").unwrap();
        let (changed, notices) = registry.refresh();
        assert!(!changed);
        assert!(matches!(notices.as_slice(), [Notice::PersistenceCorrupt(_)]));
        assert_eq!(registry.state().members.len(), 1);

        let outcome = run(&mut registry, "declare Ana Silva Vie:Rare:2/4:1").unwrap();
        assert!(matches!(outcome.notices.as_slice(), [Notice::PersistenceCorrupt(_)]));
        let blob = store.raw("anonymousRuneRegistry").unwrap();
        assert!(blob.contains("Jean") && blob.contains("Ana"));
    }

    #[test]
    fn two_sessions_keep_each_others_members() {
        let store = MemoryStore::new();
        let clock = clock();
        let catalog = Catalog::builtin();
        let config = Arc::new(RegistryConfig::default());
        let (mut left, _) = Registry::open(store.clone(), catalog.clone(), config.clone(), clock.clone());
        let (mut right, _) = Registry::open(store.clone(), catalog, config, clock.clone());

        run(&mut left, "declare Jean Dupont Vie:Rare:1/4:1").unwrap();
        clock.advance(Duration::milliseconds(5));
        run(&mut right, "declare Ana Silva Vie:Rare:2/4:1").unwrap();
        clock.advance(Duration::milliseconds(5));

        let (changed, _) = left.refresh();
        assert!(changed);
        assert_eq!(left.state().members.len(), 2);
        assert_eq!(right.state().members.len(), 2);
        assert_ne!(left.state().members[0].id, left.state().members[1].id);

        let (changed, _) = left.refresh();
        assert!(!changed);
    }

    #[test]
    fn feature_mismatch_is_reported_once() {
        let store = MemoryStore::new();
        let (mut corps, _) = open(store.clone(), RegistryConfig::default().with_features(SchemaFeatures::all()));
        run(&mut corps, "request Vie:Rare 3/4 2 need a third part").unwrap();

        let (mut ledger, notices) = open(store.clone(), RegistryConfig::default());
        assert!(matches!(notices.as_slice(), [Notice::FeatureMismatch { .. }]));
        let (_, notices) = ledger.refresh();
        assert!(notices.is_empty());

        // A ledger-only deployment still carries the board it found.
        run(&mut ledger, "declare Jean Dupont Vie:Rare:1/4:1").unwrap();
        let blob = store.raw("anonymousRuneRegistry").unwrap();
        assert!(blob.contains("exchangeRequests"));
    }

    #[test]
    fn exchange_board_round_trip() {
        let store = MemoryStore::new();
        let (mut registry, _) = open(store, RegistryConfig::default().with_features(SchemaFeatures::all()));
        let outcome = run(&mut registry, "request \"Vol de vie\":Épique 2/4 3 \"any offer\"").unwrap();
        let CommandEffect::RequestOpened(request) = outcome.effect else {
            panic!("expected an opened request");
        };
        assert_eq!(request.message, "any offer");

        run(&mut registry, "login 0711").unwrap();
        run(&mut registry, &format!("transition {} in_progress", request.id)).unwrap();
        assert_eq!(registry.exchange_requests()[0].status, ExchangeStatus::InProgress);
        assert_eq!(registry.stats().pending_exchanges, 0);
    }

    #[test]
    fn export_logs_after_projecting() {
        let (mut registry, _) = open(MemoryStore::new(), RegistryConfig::default().with_sample_members(true));
        assert_eq!(run(&mut registry, "export"), Err(RegistryError::NotAuthorized));

        run(&mut registry, "login 0711").unwrap();
        let outcome = run(&mut registry, "export").unwrap();
        let CommandEffect::Exported(document) = outcome.effect else {
            panic!("expected an export");
        };
        assert_eq!(document.members.len(), 2);
        assert!(document.logs.iter().all(|entry| entry.action != ActivityAction::Export));
        assert!(registry
            .activity_logs()
            .unwrap()
            .iter()
            .any(|entry| entry.action == ActivityAction::Export));
    }
}
