//! Core crate of the anonymous rune-fragment registry.
//!
//! Members declare the quarter-part fragments they hold; the registry folds
//! them into a public aggregate and keeps one persisted snapshot in sync with
//! every session through a keyed last-write-wins merge. All operations go
//! through [`Registry::execute`].

pub mod activity;
pub mod admin;
pub mod aggregate;
pub mod catalog;
pub mod clock;
pub mod config;
pub mod corps;
pub mod declaration;
mod error;
pub mod export;
pub mod merge;
mod registry;
pub mod seed;
pub mod snapshot;
pub mod state;
pub mod stats;
pub mod store;

pub use aggregate::{aggregate, AggregateEntry, AggregateInventory, AggregateMode, InventoryFilter};
pub use catalog::{load_catalog_from_env, Catalog, CatalogError, RarityTier, CATALOG_PATH_ENV};
pub use clock::{Clock, IdAllocator, ManualClock, SystemClock};
pub use config::{
    load_registry_config, InventoryView, RegistryConfig, RegistryConfigError,
    REGISTRY_CONFIG_PATH_ENV,
};
pub use declaration::{summarize_lines, DeclarationOutcome, DeclarationSummary};
pub use error::RegistryError;
pub use export::{export_document, export_file_path};
pub use merge::merge_by_key;
pub use registry::{CommandEffect, CommandOutcome, Notice, Registry};
pub use state::RegistryState;
pub use stats::RegistryStats;
pub use store::{FileStore, MemoryStore, SnapshotStore, StoreError};
