use rune_runtime::{decode_snapshot_json, encode_snapshot_json, RegistrySnapshot};

use crate::store::{SnapshotStore, StoreError};

/// Result of reading the persisted blob.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotRead {
    /// Nothing stored yet.
    Absent,
    Loaded(RegistrySnapshot),
    /// A blob exists but does not decode; carries the decoder's message.
    Corrupt(String),
}

pub fn read_snapshot<S: SnapshotStore + ?Sized>(
    store: &S,
    key: &str,
) -> Result<SnapshotRead, StoreError> {
    let blob = match store.load(key) {
        Ok(Some(blob)) => blob,
        Ok(None) => return Ok(SnapshotRead::Absent),
        Err(err @ StoreError::NotUtf8 { .. }) => {
            return Ok(SnapshotRead::Corrupt(err.to_string()));
        }
        Err(err) => return Err(err),
    };
    match decode_snapshot_json(&blob) {
        Ok(snapshot) => Ok(SnapshotRead::Loaded(snapshot)),
        Err(err) => Ok(SnapshotRead::Corrupt(err.to_string())),
    }
}

pub fn write_snapshot<S: SnapshotStore + ?Sized>(
    store: &S,
    key: &str,
    snapshot: &RegistrySnapshot,
) -> Result<(), StoreError> {
    let blob = encode_snapshot_json(snapshot)?;
    store.save(key, &blob)?;
    tracing::debug!(
        target: "rune_registry::store",
        key,
        bytes = blob.len(),
        members = snapshot.members.len(),
        "snapshot.written"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn absent_loaded_and_corrupt() {
        let store = MemoryStore::new();
        assert_eq!(read_snapshot(&store, "k").unwrap(), SnapshotRead::Absent);

        store.save("k", "{not json").unwrap();
        assert!(matches!(
            read_snapshot(&store, "k").unwrap(),
            SnapshotRead::Corrupt(_)
        ));

        store
            .save("k", r#"{"members":[{"id":1,"firstName":"x","lastName":"y"}]}"#)
            .unwrap();
        match read_snapshot(&store, "k").unwrap() {
            SnapshotRead::Loaded(snapshot) => assert_eq!(snapshot.members.len(), 1),
            other => panic!("expected a loaded snapshot, got {other:?}"),
        }
    }

    #[test]
    fn written_blob_reads_back() {
        let store = MemoryStore::new();
        let snapshot = RegistrySnapshot {
            last_update: Some("2026-01-01T00:00:00.000Z".into()),
            ..RegistrySnapshot::default()
        };
        write_snapshot(&store, "k", &snapshot).unwrap();
        assert_eq!(
            read_snapshot(&store, "k").unwrap(),
            SnapshotRead::Loaded(snapshot)
        );
    }
}
