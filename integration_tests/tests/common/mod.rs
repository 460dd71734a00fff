use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};

use chrono::{TimeZone, Utc};
use rune_core::{
    load_registry_config, Catalog, CommandOutcome, FileStore, ManualClock, Registry,
    RegistryConfig, RegistryError,
};
use rune_runtime::parse_command_line;

static INIT: Once = Once::new();

pub fn ensure_test_config() {
    INIT.call_once(|| {
        let config_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join("test_registry_config.json");

        debug_assert!(
            config_path.exists(),
            "missing test registry config at {}",
            config_path.display()
        );

        std::env::set_var("RUNE_REGISTRY_CONFIG_PATH", &config_path);
    });
}

pub fn test_config() -> Arc<RegistryConfig> {
    ensure_test_config();
    let (config, path) = load_registry_config(None);
    assert!(path.is_some(), "fixture config should be picked up from the env");
    config
}

pub fn test_clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(
        Utc.with_ymd_and_hms(2026, 3, 1, 18, 30, 0).unwrap(),
    ))
}

pub fn open_session(
    root: &Path,
    clock: Arc<ManualClock>,
) -> (Registry<FileStore>, Vec<rune_core::Notice>) {
    Registry::open(FileStore::new(root), Catalog::builtin(), test_config(), clock)
}

pub fn open_session_with(
    root: &Path,
    clock: Arc<ManualClock>,
    config: RegistryConfig,
) -> (Registry<FileStore>, Vec<rune_core::Notice>) {
    Registry::open(FileStore::new(root), Catalog::builtin(), Arc::new(config), clock)
}

pub fn run(registry: &mut Registry<FileStore>, line: &str) -> Result<CommandOutcome, RegistryError> {
    registry.execute(parse_command_line(line).expect("command line parses"))
}

pub fn snapshot_path(root: &Path) -> PathBuf {
    root.join("integrationRegistry.json")
}
