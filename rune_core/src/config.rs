use std::{
    env, fs, io,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use rune_runtime::SchemaFeatures;
use serde::Deserialize;
use thiserror::Error;

pub const BUILTIN_REGISTRY_CONFIG: &str = include_str!("data/registry_config.json");

pub const REGISTRY_CONFIG_PATH_ENV: &str = "RUNE_REGISTRY_CONFIG_PATH";

/// How the public inventory view is built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InventoryView {
    /// Every catalog type x display tier, zero rows included.
    #[default]
    Complete,
    /// Only keys somebody actually holds.
    Sparse,
}

/// Deployment settings for one registry.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    storage_key: String,
    admin_passphrase: String,
    features: SchemaFeatures,
    inventory_view: InventoryView,
    activity_log_capacity: usize,
    refresh_interval_ms: u64,
    seed_sample_members: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            storage_key: "anonymousRuneRegistry".to_string(),
            admin_passphrase: "0711".to_string(),
            features: SchemaFeatures::LEDGER,
            inventory_view: InventoryView::Complete,
            activity_log_capacity: 100,
            refresh_interval_ms: 5_000,
            seed_sample_members: false,
        }
    }
}

impl RegistryConfig {
    pub fn builtin() -> Arc<Self> {
        Arc::new(
            serde_json::from_str(BUILTIN_REGISTRY_CONFIG)
                .expect("builtin registry config should parse"),
        )
    }

    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn from_file(path: &Path) -> Result<Self, RegistryConfigError> {
        let contents =
            fs::read_to_string(path).map_err(|source| RegistryConfigError::ReadFailed {
                path: path.to_path_buf(),
                source,
            })?;
        let config = RegistryConfig::from_json_str(&contents)?;
        Ok(config)
    }

    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }

    pub fn admin_passphrase(&self) -> &str {
        &self.admin_passphrase
    }

    pub fn features(&self) -> SchemaFeatures {
        self.features
    }

    pub fn inventory_view(&self) -> InventoryView {
        self.inventory_view
    }

    pub fn activity_log_capacity(&self) -> usize {
        self.activity_log_capacity.max(1)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(100))
    }

    pub fn seed_sample_members(&self) -> bool {
        self.seed_sample_members
    }

    pub fn with_features(mut self, features: SchemaFeatures) -> Self {
        self.features = features;
        self
    }

    pub fn with_inventory_view(mut self, view: InventoryView) -> Self {
        self.inventory_view = view;
        self
    }

    pub fn with_activity_log_capacity(mut self, capacity: usize) -> Self {
        self.activity_log_capacity = capacity;
        self
    }

    pub fn with_sample_members(mut self, seed: bool) -> Self {
        self.seed_sample_members = seed;
        self
    }
}

#[derive(Debug, Error)]
pub enum RegistryConfigError {
    #[error("failed to parse registry config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read registry config from {path:?}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Load the registry config from an explicit path, then
/// `RUNE_REGISTRY_CONFIG_PATH`, then the builtin copy.
pub fn load_registry_config(explicit: Option<&Path>) -> (Arc<RegistryConfig>, Option<PathBuf>) {
    let candidate = explicit
        .map(Path::to_path_buf)
        .or_else(|| env::var(REGISTRY_CONFIG_PATH_ENV).ok().map(PathBuf::from));

    if let Some(path) = candidate {
        match RegistryConfig::from_file(&path) {
            Ok(config) => {
                tracing::info!(
                    target: "rune_registry::config",
                    path = %path.display(),
                    "registry_config.loaded=file"
                );
                return (Arc::new(config), Some(path));
            }
            Err(err) => {
                tracing::warn!(
                    target: "rune_registry::config",
                    path = %path.display(),
                    error = %err,
                    "registry_config.load_failed"
                );
            }
        }
    }

    let config = RegistryConfig::builtin();
    tracing::info!(target: "rune_registry::config", "registry_config.loaded=builtin");
    (config, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_config_parses() {
        let config = RegistryConfig::builtin();
        assert_eq!(config.storage_key(), "anonymousRuneRegistry");
        assert_eq!(config.features(), SchemaFeatures::LEDGER);
        assert_eq!(config.inventory_view(), InventoryView::Complete);
        assert_eq!(config.activity_log_capacity(), 100);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config = RegistryConfig::from_json_str(
            r#"{"features": "CORPS_STOCK | EXCHANGE_BOARD", "inventory_view": "sparse"}"#,
        )
        .unwrap();
        assert_eq!(config.features(), SchemaFeatures::CORPS);
        assert_eq!(config.inventory_view(), InventoryView::Sparse);
        assert_eq!(config.admin_passphrase(), "0711");
        assert_eq!(config.refresh_interval(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file_falls_back_to_builtin() {
        let (config, path) =
            load_registry_config(Some(Path::new("/definitely/not/here/registry.json")));
        assert!(path.is_none());
        assert_eq!(config.storage_key(), "anonymousRuneRegistry");
    }
}
