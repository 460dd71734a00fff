//! Persisted data contracts for the rune registry.
//!
//! Everything in this crate is plain data: the shapes written into the shared
//! snapshot blob, the export document, and the helpers that hash and encode
//! them. Behaviour (aggregation, merging, validation against the catalog)
//! lives in `rune_core`.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{BuildHasher, Hasher};

use ahash::RandomState;
use bitflags::bitflags;
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, ObjectValidation, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Version written into every snapshot produced by this crate.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 2;

/// One quarter of a rune. A rune is assembled from exactly one of each.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub enum FragmentPart {
    #[serde(rename = "1/4")]
    First,
    #[serde(rename = "2/4")]
    Second,
    #[serde(rename = "3/4")]
    Third,
    #[serde(rename = "4/4")]
    Fourth,
}

impl FragmentPart {
    pub const ALL: [FragmentPart; 4] = [
        FragmentPart::First,
        FragmentPart::Second,
        FragmentPart::Third,
        FragmentPart::Fourth,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FragmentPart::First => "1/4",
            FragmentPart::Second => "2/4",
            FragmentPart::Third => "3/4",
            FragmentPart::Fourth => "4/4",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        FragmentPart::ALL
            .into_iter()
            .find(|part| part.label() == label.trim())
    }

    fn index(self) -> usize {
        match self {
            FragmentPart::First => 0,
            FragmentPart::Second => 1,
            FragmentPart::Third => 2,
            FragmentPart::Fourth => 3,
        }
    }
}

impl fmt::Display for FragmentPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a loose part -> count map does not carry exactly the
/// four quarter-part keys.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TallyShapeError {
    #[error("fragment tally is missing part {0}")]
    MissingPart(&'static str),
    #[error("fragment tally has unknown part '{0}'")]
    UnknownPart(String),
}

/// Count of fragments held for each of the four quarter-parts.
///
/// Never sparse: every part is always present, which is why the persisted
/// map form goes through [`TryFrom`] on the way in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, u32>",
    into = "BTreeMap<String, u32>"
)]
pub struct FragmentTally {
    counts: [u32; 4],
}

impl FragmentTally {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn from_counts(counts: [u32; 4]) -> Self {
        Self { counts }
    }

    pub fn get(&self, part: FragmentPart) -> u32 {
        self.counts[part.index()]
    }

    pub fn set(&mut self, part: FragmentPart, value: u32) {
        self.counts[part.index()] = value;
    }

    pub fn add(&mut self, part: FragmentPart, amount: u32) {
        let slot = &mut self.counts[part.index()];
        *slot = slot.saturating_add(amount);
    }

    /// Adds every part of `other` into `self`.
    pub fn absorb(&mut self, other: &FragmentTally) {
        for part in FragmentPart::ALL {
            self.add(part, other.get(part));
        }
    }

    /// Removes one fragment from every part, stopping at zero.
    pub fn withdraw_one_each(&mut self) {
        for count in &mut self.counts {
            *count = count.saturating_sub(1);
        }
    }

    /// Number of complete runes this tally can assemble.
    pub fn complete_sets(&self) -> u32 {
        self.counts.iter().copied().min().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.iter().map(|count| u64::from(*count)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.iter().all(|count| *count == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (FragmentPart, u32)> + '_ {
        FragmentPart::ALL
            .into_iter()
            .map(move |part| (part, self.get(part)))
    }
}

impl TryFrom<BTreeMap<String, u32>> for FragmentTally {
    type Error = TallyShapeError;

    fn try_from(map: BTreeMap<String, u32>) -> Result<Self, Self::Error> {
        let mut seen = [false; 4];
        let mut tally = FragmentTally::zero();
        for (label, count) in map {
            let part = FragmentPart::from_label(&label)
                .ok_or_else(|| TallyShapeError::UnknownPart(label.clone()))?;
            seen[part.index()] = true;
            tally.set(part, count);
        }
        if let Some(missing) = FragmentPart::ALL
            .into_iter()
            .find(|part| !seen[part.index()])
        {
            return Err(TallyShapeError::MissingPart(missing.label()));
        }
        Ok(tally)
    }
}

impl From<FragmentTally> for BTreeMap<String, u32> {
    fn from(tally: FragmentTally) -> Self {
        tally
            .iter()
            .map(|(part, count)| (part.label().to_string(), count))
            .collect()
    }
}

impl JsonSchema for FragmentTally {
    fn schema_name() -> String {
        "FragmentTally".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        let mut object = ObjectValidation::default();
        for part in FragmentPart::ALL {
            object
                .properties
                .insert(part.label().to_string(), gen.subschema_for::<u32>());
            object.required.insert(part.label().to_string());
        }
        object.additional_properties = Some(Box::new(Schema::Bool(false)));
        SchemaObject {
            instance_type: Some(InstanceType::Object.into()),
            object: Some(Box::new(object)),
            ..Default::default()
        }
        .into()
    }
}

/// Natural key of an inventory entry inside any single collection.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
pub struct EntryKey {
    pub rune_type: String,
    pub rarity: String,
}

impl EntryKey {
    pub fn new(rune_type: impl Into<String>, rarity: impl Into<String>) -> Self {
        Self {
            rune_type: rune_type.into(),
            rarity: rarity.into(),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.rune_type, self.rarity)
    }
}

/// Fragments of one (type, rarity) held by a member, the public aggregate or
/// the corps stock. `complete_sets` always mirrors the tally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntry {
    #[serde(rename = "type")]
    rune_type: String,
    rarity: String,
    fragments: FragmentTally,
    #[serde(default)]
    complete_sets: u32,
}

impl InventoryEntry {
    pub fn empty(rune_type: impl Into<String>, rarity: impl Into<String>) -> Self {
        Self::with_fragments(rune_type, rarity, FragmentTally::zero())
    }

    pub fn with_fragments(
        rune_type: impl Into<String>,
        rarity: impl Into<String>,
        fragments: FragmentTally,
    ) -> Self {
        Self {
            rune_type: rune_type.into(),
            rarity: rarity.into(),
            complete_sets: fragments.complete_sets(),
            fragments,
        }
    }

    pub fn rune_type(&self) -> &str {
        &self.rune_type
    }

    pub fn rarity(&self) -> &str {
        &self.rarity
    }

    pub fn fragments(&self) -> &FragmentTally {
        &self.fragments
    }

    pub fn complete_sets(&self) -> u32 {
        self.complete_sets
    }

    pub fn key(&self) -> EntryKey {
        EntryKey::new(self.rune_type.clone(), self.rarity.clone())
    }

    pub fn matches(&self, key: &EntryKey) -> bool {
        self.rune_type == key.rune_type && self.rarity == key.rarity
    }

    pub fn total_fragments(&self) -> u64 {
        self.fragments.total()
    }

    /// Mutates the tally and refreshes the derived set count.
    pub fn update_fragments<F>(&mut self, mutate: F)
    where
        F: FnOnce(&mut FragmentTally),
    {
        mutate(&mut self.fragments);
        self.refresh();
    }

    /// Recomputes `complete_sets` from the tally. Decoded entries may carry a
    /// stale value.
    pub fn refresh(&mut self) {
        self.complete_sets = self.fragments.complete_sets();
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct MemberId(pub u64);

impl fmt::Display for MemberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: MemberId,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub inventory: Vec<InventoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<u64>,
}

impl Member {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn entry(&self, key: &EntryKey) -> Option<&InventoryEntry> {
        self.inventory.iter().find(|entry| entry.matches(key))
    }

    pub fn entry_mut(&mut self, key: &EntryKey) -> Option<&mut InventoryEntry> {
        self.inventory.iter_mut().find(|entry| entry.matches(key))
    }

    pub fn total_fragments(&self) -> u64 {
        self.inventory.iter().map(InventoryEntry::total_fragments).sum()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ExchangeStatus {
    Pending,
    InProgress,
    Processed,
}

impl ExchangeStatus {
    pub fn label(self) -> &'static str {
        match self {
            ExchangeStatus::Pending => "pending",
            ExchangeStatus::InProgress => "in_progress",
            ExchangeStatus::Processed => "processed",
        }
    }
}

impl fmt::Display for ExchangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A member asking the corps for one missing quarter-part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRequest {
    pub id: u64,
    #[serde(rename = "type")]
    pub rune_type: String,
    pub rarity: String,
    pub part: FragmentPart,
    pub offer: u32,
    #[serde(default)]
    pub message: String,
    pub status: ExchangeStatus,
    pub date: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    System,
    Declaration,
    Update,
    Admin,
    AdminEdit,
    Donation,
    Withdrawal,
    Exchange,
    Export,
}

impl ActivityAction {
    pub fn tag(self) -> &'static str {
        match self {
            ActivityAction::System => "SYSTEM",
            ActivityAction::Declaration => "DECLARATION",
            ActivityAction::Update => "UPDATE",
            ActivityAction::Admin => "ADMIN",
            ActivityAction::AdminEdit => "ADMIN_EDIT",
            ActivityAction::Donation => "DONATION",
            ActivityAction::Withdrawal => "WITHDRAWAL",
            ActivityAction::Exchange => "EXCHANGE",
            ActivityAction::Export => "EXPORT",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActivityLogEntry {
    pub id: u64,
    pub timestamp: String,
    pub action: ActivityAction,
    pub details: String,
}

bitflags! {
    /// Optional collections and fields a deployment carries.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct SchemaFeatures: u8 {
        const ACTIVITY_LOG = 1 << 0;
        const MEMBER_POINTS = 1 << 1;
        const CORPS_STOCK = 1 << 2;
        const EXCHANGE_BOARD = 1 << 3;
    }
}

impl SchemaFeatures {
    /// Activity log plus per-member point scores.
    pub const LEDGER: Self = Self::ACTIVITY_LOG.union(Self::MEMBER_POINTS);
    /// Donation pool plus the exchange-request board.
    pub const CORPS: Self = Self::CORPS_STOCK.union(Self::EXCHANGE_BOARD);
}

/// The full blob stored under the registry's storage key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub schema_version: u32,
    #[serde(default)]
    #[schemars(with = "String")]
    pub features: SchemaFeatures,
    #[serde(default)]
    pub members: Vec<Member>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_logs: Option<Vec<ActivityLogEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corps_stock: Option<Vec<InventoryEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_requests: Option<Vec<ExchangeRequest>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
}

/// Read-only projection offered as a downloadable file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExportDocument {
    pub members: Vec<Member>,
    pub logs: Vec<ActivityLogEntry>,
    pub export_date: String,
}

/// Content hash of a snapshot, ignoring `last_update` so that a rewrite of
/// identical collections does not read as a change.
pub fn hash_snapshot(snapshot: &RegistrySnapshot) -> u64 {
    let mut clone = snapshot.clone();
    clone.last_update = None;
    let encoded = bincode::serialize(&clone).expect("snapshot serialization for hashing");
    let mut hasher = RandomState::with_seeds(0, 0, 0, 0).build_hasher();
    hasher.write(&encoded);
    hasher.finish()
}

pub fn encode_snapshot_json(snapshot: &RegistrySnapshot) -> serde_json::Result<String> {
    serde_json::to_string(snapshot)
}

pub fn decode_snapshot_json(data: &str) -> serde_json::Result<RegistrySnapshot> {
    serde_json::from_str(data)
}

pub fn encode_export_json(document: &ExportDocument) -> serde_json::Result<String> {
    serde_json::to_string_pretty(document)
}

/// JSON schema of [`RegistrySnapshot`], used by `cargo xtask` to validate
/// blobs captured from the field.
pub fn snapshot_json_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(RegistrySnapshot);
    serde_json::to_value(schema).expect("snapshot schema serializes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tally_rejects_missing_part() {
        let mut map = BTreeMap::new();
        map.insert("1/4".to_string(), 2);
        map.insert("2/4".to_string(), 1);
        map.insert("4/4".to_string(), 1);
        let err = FragmentTally::try_from(map).unwrap_err();
        assert_eq!(err, TallyShapeError::MissingPart("3/4"));
    }

    #[test]
    fn tally_rejects_unknown_part() {
        let map: BTreeMap<String, u32> = [("1/4", 1), ("2/4", 1), ("3/4", 1), ("4/4", 1), ("5/4", 1)]
            .into_iter()
            .map(|(label, count)| (label.to_string(), count))
            .collect();
        assert_eq!(
            FragmentTally::try_from(map).unwrap_err(),
            TallyShapeError::UnknownPart("5/4".to_string())
        );
    }

    #[test]
    fn inventory_entry_uses_persisted_field_names() {
        let entry = InventoryEntry::with_fragments(
            "Dégât",
            "Épique",
            FragmentTally::from_counts([2, 1, 2, 1]),
        );
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["type"], "Dégât");
        assert_eq!(value["rarity"], "Épique");
        assert_eq!(value["fragments"]["3/4"], 2);
        assert_eq!(value["completeSets"], 1);
    }

    #[test]
    fn sparse_tally_fails_snapshot_decode() {
        let blob = r#"{"members":[{"id":1,"firstName":"A","lastName":"B","inventory":[
            {"type":"Vie","rarity":"Rare","fragments":{"1/4":1,"2/4":1},"completeSets":1}]}]}"#;
        assert!(decode_snapshot_json(blob).is_err());
    }

    #[test]
    fn legacy_snapshot_without_version_decodes() {
        let blob = r#"{"members":[],"activityLogs":[]}"#;
        let snapshot = decode_snapshot_json(blob).unwrap();
        assert_eq!(snapshot.schema_version, 0);
        assert!(snapshot.features.is_empty());
        assert_eq!(snapshot.activity_logs, Some(Vec::new()));
        assert!(snapshot.corps_stock.is_none());
    }

    #[test]
    fn features_serialize_as_flag_names() {
        let snapshot = RegistrySnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            features: SchemaFeatures::LEDGER,
            ..Default::default()
        };
        let json = encode_snapshot_json(&snapshot).unwrap();
        assert!(json.contains("ACTIVITY_LOG | MEMBER_POINTS"), "{json}");
        let decoded = decode_snapshot_json(&json).unwrap();
        assert_eq!(decoded.features, SchemaFeatures::LEDGER);
    }

    #[test]
    fn hash_ignores_last_update() {
        let mut a = RegistrySnapshot::default();
        let mut b = RegistrySnapshot::default();
        a.last_update = Some("2026-01-01T00:00:00Z".to_string());
        b.last_update = Some("2026-02-01T00:00:00Z".to_string());
        assert_eq!(hash_snapshot(&a), hash_snapshot(&b));

        b.members.push(Member {
            id: MemberId(7),
            first_name: "Kanao".to_string(),
            last_name: "Tsuyuri".to_string(),
            inventory: Vec::new(),
            points: None,
        });
        assert_ne!(hash_snapshot(&a), hash_snapshot(&b));
    }

    #[test]
    fn schema_requires_all_tally_parts() {
        let schema = snapshot_json_schema();
        let text = schema.to_string();
        assert!(text.contains("FragmentTally"));
        assert!(text.contains("\"1/4\""));
    }
}
