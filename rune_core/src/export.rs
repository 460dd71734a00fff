use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rune_runtime::ExportDocument;

use crate::{clock::timestamp, state::RegistryState};

/// Read-only projection of members and logs at `now`.
pub fn export_document(state: &RegistryState, now: DateTime<Utc>) -> ExportDocument {
    ExportDocument {
        members: state.members.clone(),
        logs: state.activity_logs.clone(),
        export_date: timestamp(now),
    }
}

/// `runes-export-<unix millis>.json` inside `dir`.
pub fn export_file_path(dir: &Path, now: DateTime<Utc>) -> PathBuf {
    dir.join(format!("runes-export-{}.json", now.timestamp_millis()))
}
