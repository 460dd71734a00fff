//! Capped, newest-first activity log.

use rune_runtime::ActivityLogEntry;

use crate::merge::{merge_by_key, log_key};

/// Prepends `entry` and drops whatever falls past `capacity`.
pub fn push_entry(logs: &mut Vec<ActivityLogEntry>, entry: ActivityLogEntry, capacity: usize) {
    logs.insert(0, entry);
    logs.truncate(capacity);
}

/// Union of two logs by id, newest first, capped.
pub fn merge_logs(
    base: &[ActivityLogEntry],
    incoming: &[ActivityLogEntry],
    capacity: usize,
) -> Vec<ActivityLogEntry> {
    let mut merged = merge_by_key(base, incoming, log_key);
    sort_newest_first(&mut merged);
    merged.truncate(capacity);
    merged
}

pub fn sort_newest_first(logs: &mut [ActivityLogEntry]) {
    logs.sort_by(|a, b| b.id.cmp(&a.id));
}

#[cfg(test)]
mod tests {
    use super::*;
    use rune_runtime::ActivityAction;

    fn entry(id: u64, action: ActivityAction) -> ActivityLogEntry {
        ActivityLogEntry {
            id,
            timestamp: format!("t{id}"),
            action,
            details: format!("entry {id}"),
        }
    }

    #[test]
    fn push_keeps_capacity() {
        let mut logs = Vec::new();
        for id in 1..=5 {
            push_entry(&mut logs, entry(id, ActivityAction::Declaration), 3);
        }
        let ids: Vec<u64> = logs.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![5, 4, 3]);
    }

    #[test]
    fn merge_unions_both_sides() {
        let local = vec![entry(7, ActivityAction::Update), entry(3, ActivityAction::System)];
        let persisted = vec![entry(9, ActivityAction::Declaration), entry(3, ActivityAction::System)];
        let merged = merge_logs(&local, &persisted, 100);
        let ids: Vec<u64> = merged.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![9, 7, 3]);
    }

    #[test]
    fn merge_caps_oldest_away() {
        let local: Vec<_> = (1..=4).map(|id| entry(id, ActivityAction::Update)).collect();
        let persisted: Vec<_> = (5..=8).map(|id| entry(id, ActivityAction::Update)).collect();
        let merged = merge_logs(&local, &persisted, 5);
        let ids: Vec<u64> = merged.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![8, 7, 6, 5, 4]);
    }
}
