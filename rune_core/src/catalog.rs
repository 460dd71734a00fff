//! Rune type and rarity tier catalog.
//!
//! Loaded from `catalog.json` with support for an environment variable
//! override. The catalog is immutable once loaded and is shared behind an
//! [`Arc`].

use std::{
    collections::HashSet,
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
};

use rune_runtime::{FragmentPart, InventoryEntry};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const BUILTIN_CATALOG: &str = include_str!("data/catalog.json");

pub const CATALOG_PATH_ENV: &str = "RUNE_CATALOG_PATH";

/// Configuration of one rarity tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RarityTier {
    pub id: String,
    pub color: String,
    /// Points awarded per fragment of this tier.
    pub fragment_value: u64,
    pub rune_price: u32,
    /// Percentage chance of a drop being this tier.
    pub drop_rate: f32,
    /// Whether members may self-report fragments of this tier.
    pub declarable: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct CatalogDocument {
    rune_types: Vec<String>,
    rarities: Vec<RarityTier>,
    #[serde(default)]
    display_order: Vec<String>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to parse rune catalog: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read rune catalog from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("rarity tier '{0}' is configured more than once")]
    DuplicateRarity(String),
    #[error("rune type '{0}' is listed more than once")]
    DuplicateRuneType(String),
    #[error("display order references unknown rarity tier '{0}'")]
    UnknownDisplayTier(String),
    #[error("rune catalog lists no rune types")]
    NoRuneTypes,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    rune_types: Vec<String>,
    rarities: Vec<RarityTier>,
    display_order: Vec<String>,
}

impl Catalog {
    pub fn builtin() -> Arc<Self> {
        Arc::new(Catalog::from_json_str(BUILTIN_CATALOG).expect("builtin rune catalog should parse"))
    }

    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Catalog::from_document(document)
    }

    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = fs::read_to_string(path).map_err(|source| CatalogError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Catalog::from_json_str(&contents)
    }

    fn from_document(document: CatalogDocument) -> Result<Self, CatalogError> {
        if document.rune_types.is_empty() {
            return Err(CatalogError::NoRuneTypes);
        }

        let mut seen_types = HashSet::new();
        for rune_type in &document.rune_types {
            if !seen_types.insert(rune_type.as_str()) {
                return Err(CatalogError::DuplicateRuneType(rune_type.clone()));
            }
        }

        let mut seen_tiers = HashSet::new();
        for tier in &document.rarities {
            if !seen_tiers.insert(tier.id.as_str()) {
                return Err(CatalogError::DuplicateRarity(tier.id.clone()));
            }
        }

        // An empty display order means "every declarable tier, as listed".
        let display_order = if document.display_order.is_empty() {
            document
                .rarities
                .iter()
                .filter(|tier| tier.declarable)
                .map(|tier| tier.id.clone())
                .collect()
        } else {
            for id in &document.display_order {
                if !seen_tiers.contains(id.as_str()) {
                    return Err(CatalogError::UnknownDisplayTier(id.clone()));
                }
            }
            document.display_order
        };

        Ok(Self {
            rune_types: document.rune_types,
            rarities: document.rarities,
            display_order,
        })
    }

    pub fn rune_types(&self) -> &[String] {
        &self.rune_types
    }

    pub fn rarities(&self) -> &[RarityTier] {
        &self.rarities
    }

    pub fn display_order(&self) -> &[String] {
        &self.display_order
    }

    pub fn parts(&self) -> [FragmentPart; 4] {
        FragmentPart::ALL
    }

    pub fn tier(&self, id: &str) -> Option<&RarityTier> {
        self.rarities.iter().find(|tier| tier.id == id)
    }

    pub fn is_known_type(&self, rune_type: &str) -> bool {
        self.rune_types.iter().any(|known| known == rune_type)
    }

    /// Unknown tiers are never declarable.
    pub fn is_declarable(&self, rarity: &str) -> bool {
        self.tier(rarity).map(|tier| tier.declarable).unwrap_or(false)
    }

    pub fn declarable_tiers(&self) -> impl Iterator<Item = &RarityTier> {
        self.rarities.iter().filter(|tier| tier.declarable)
    }

    pub fn fragment_value(&self, rarity: &str) -> u64 {
        self.tier(rarity).map(|tier| tier.fragment_value).unwrap_or(0)
    }

    /// Total point score of a set of entries: tier value times fragment
    /// count, summed.
    pub fn points_for(&self, entries: &[InventoryEntry]) -> u64 {
        entries
            .iter()
            .map(|entry| self.fragment_value(entry.rarity()) * entry.total_fragments())
            .sum()
    }
}

/// Load the catalog named by `RUNE_CATALOG_PATH`, falling back to the builtin
/// copy.
pub fn load_catalog_from_env() -> (Arc<Catalog>, Option<PathBuf>) {
    if let Some(path) = env::var(CATALOG_PATH_ENV).ok().map(PathBuf::from) {
        match Catalog::from_file(&path) {
            Ok(catalog) => {
                tracing::info!(
                    target: "rune_registry::config",
                    path = %path.display(),
                    "catalog.loaded=file"
                );
                return (Arc::new(catalog), Some(path));
            }
            Err(err) => {
                tracing::warn!(
                    target: "rune_registry::config",
                    path = %path.display(),
                    error = %err,
                    "catalog.load_failed"
                );
            }
        }
    }

    let catalog = Catalog::builtin();
    tracing::info!(target: "rune_registry::config", "catalog.loaded=builtin");
    (catalog, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rune_runtime::FragmentTally;

    #[test]
    fn builtin_catalog_parses() {
        let catalog = Catalog::builtin();
        assert_eq!(catalog.rune_types().len(), 7);
        assert_eq!(catalog.rarities().len(), 4);
        assert_eq!(catalog.display_order(), ["Rare", "Épique", "Légendaire"]);
    }

    #[test]
    fn common_tier_is_not_declarable() {
        let catalog = Catalog::builtin();
        assert!(!catalog.is_declarable("Commune"));
        assert!(catalog.is_declarable("Épique"));
        assert!(!catalog.is_declarable("Mythique"));
        let declarable: Vec<_> = catalog.declarable_tiers().map(|t| t.id.as_str()).collect();
        assert_eq!(declarable, ["Rare", "Épique", "Légendaire"]);
    }

    #[test]
    fn duplicate_tier_is_rejected() {
        let json = r##"{
            "rune_types": ["Vie"],
            "rarities": [
                {"id": "Rare", "color": "#fff", "fragment_value": 10, "rune_price": 18, "drop_rate": 14.0, "declarable": true},
                {"id": "Rare", "color": "#000", "fragment_value": 11, "rune_price": 19, "drop_rate": 1.0, "declarable": true}
            ]
        }"##;
        assert!(matches!(
            Catalog::from_json_str(json),
            Err(CatalogError::DuplicateRarity(id)) if id == "Rare"
        ));
    }

    #[test]
    fn display_order_must_reference_known_tiers() {
        let json = r##"{
            "rune_types": ["Vie"],
            "rarities": [
                {"id": "Rare", "color": "#fff", "fragment_value": 10, "rune_price": 18, "drop_rate": 14.0, "declarable": true}
            ],
            "display_order": ["Rare", "Mythique"]
        }"##;
        assert!(matches!(
            Catalog::from_json_str(json),
            Err(CatalogError::UnknownDisplayTier(id)) if id == "Mythique"
        ));
    }

    #[test]
    fn points_follow_tier_values() {
        let catalog = Catalog::builtin();
        let entries = vec![
            InventoryEntry::with_fragments("Dégât", "Épique", FragmentTally::from_counts([2, 1, 2, 1])),
            InventoryEntry::with_fragments("Vitesse", "Rare", FragmentTally::from_counts([3, 2, 1, 2])),
        ];
        // 6 epic fragments at 40 plus 8 rare fragments at 10.
        assert_eq!(catalog.points_for(&entries), 320);
    }
}
