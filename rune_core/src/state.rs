use chrono::{DateTime, Utc};
use rune_runtime::{
    ActivityAction, ActivityLogEntry, ExchangeRequest, InventoryEntry, Member, MemberId,
    RegistrySnapshot, SchemaFeatures, SNAPSHOT_SCHEMA_VERSION,
};

use crate::{
    activity,
    catalog::Catalog,
    clock::{timestamp, IdAllocator},
    config::RegistryConfig,
    merge::{dedupe_by_key, entry_key, log_key, member_key, request_key},
};

/// In-memory registry contents held by one session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryState {
    pub members: Vec<Member>,
    pub activity_logs: Vec<ActivityLogEntry>,
    pub corps_stock: Vec<InventoryEntry>,
    pub exchange_requests: Vec<ExchangeRequest>,
    pub last_update: Option<String>,
}

impl RegistryState {
    /// Lifts a decoded snapshot into state, collapsing duplicate keys and
    /// recomputing every derived set count.
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Self {
        let mut members = dedupe_by_key(&snapshot.members, member_key);
        for member in &mut members {
            member.inventory = normalize_entries(&member.inventory);
        }

        let mut activity_logs = dedupe_by_key(
            snapshot.activity_logs.as_deref().unwrap_or_default(),
            log_key,
        );
        activity::sort_newest_first(&mut activity_logs);

        Self {
            members,
            activity_logs,
            corps_stock: normalize_entries(snapshot.corps_stock.as_deref().unwrap_or_default()),
            exchange_requests: dedupe_by_key(
                snapshot.exchange_requests.as_deref().unwrap_or_default(),
                request_key,
            ),
            last_update: snapshot.last_update,
        }
    }

    /// Builds the persisted form. Collections of disabled features are still
    /// written when they hold data so nothing is silently dropped.
    pub fn to_snapshot(&self, features: SchemaFeatures) -> RegistrySnapshot {
        let keep = |feature: SchemaFeatures, empty: bool| features.contains(feature) || !empty;
        RegistrySnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            features,
            members: self.members.clone(),
            activity_logs: keep(SchemaFeatures::ACTIVITY_LOG, self.activity_logs.is_empty())
                .then(|| self.activity_logs.clone()),
            corps_stock: keep(SchemaFeatures::CORPS_STOCK, self.corps_stock.is_empty())
                .then(|| self.corps_stock.clone()),
            exchange_requests: keep(
                SchemaFeatures::EXCHANGE_BOARD,
                self.exchange_requests.is_empty(),
            )
            .then(|| self.exchange_requests.clone()),
            last_update: self.last_update.clone(),
        }
    }

    pub fn member(&self, id: MemberId) -> Option<&Member> {
        self.members.iter().find(|member| member.id == id)
    }

    pub fn member_mut(&mut self, id: MemberId) -> Option<&mut Member> {
        self.members.iter_mut().find(|member| member.id == id)
    }

    /// Exact, case-sensitive match on the name pair.
    pub fn member_by_name_mut(&mut self, first_name: &str, last_name: &str) -> Option<&mut Member> {
        self.members
            .iter_mut()
            .find(|member| member.first_name == first_name && member.last_name == last_name)
    }

    pub fn request_mut(&mut self, id: u64) -> Option<&mut ExchangeRequest> {
        self.exchange_requests
            .iter_mut()
            .find(|request| request.id == id)
    }

    /// Largest identifier in use across every collection.
    pub fn max_id(&self) -> u64 {
        let members = self.members.iter().map(|member| member.id.0);
        let logs = self.activity_logs.iter().map(|entry| entry.id);
        let requests = self.exchange_requests.iter().map(|request| request.id);
        members.chain(logs).chain(requests).max().unwrap_or(0)
    }
}

fn normalize_entries(entries: &[InventoryEntry]) -> Vec<InventoryEntry> {
    let mut entries = dedupe_by_key(entries, entry_key);
    for entry in &mut entries {
        entry.refresh();
    }
    entries
}

/// Everything an operation needs besides the state it mutates.
pub struct MutationContext<'a> {
    pub catalog: &'a Catalog,
    pub config: &'a RegistryConfig,
    pub now: DateTime<Utc>,
    ids: &'a mut IdAllocator,
}

impl<'a> MutationContext<'a> {
    pub fn new(
        catalog: &'a Catalog,
        config: &'a RegistryConfig,
        now: DateTime<Utc>,
        ids: &'a mut IdAllocator,
    ) -> Self {
        Self {
            catalog,
            config,
            now,
            ids,
        }
    }

    pub fn features(&self) -> SchemaFeatures {
        self.config.features()
    }

    pub fn next_id(&mut self) -> u64 {
        self.ids.next(self.now)
    }

    pub fn timestamp(&self) -> String {
        timestamp(self.now)
    }

    /// Point score for an inventory, when the deployment tracks points.
    pub fn points_for(&self, inventory: &[InventoryEntry]) -> Option<u64> {
        self.features()
            .contains(SchemaFeatures::MEMBER_POINTS)
            .then(|| self.catalog.points_for(inventory))
    }

    /// Appends an activity entry when the deployment keeps a log.
    pub fn log(&mut self, state: &mut RegistryState, action: ActivityAction, details: String) {
        if !self.features().contains(SchemaFeatures::ACTIVITY_LOG) {
            return;
        }
        let entry = ActivityLogEntry {
            id: self.next_id(),
            timestamp: self.timestamp(),
            action,
            details,
        };
        activity::push_entry(
            &mut state.activity_logs,
            entry,
            self.config.activity_log_capacity(),
        );
    }
}
