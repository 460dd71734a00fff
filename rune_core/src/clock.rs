use std::sync::Mutex;

use chrono::{DateTime, Duration, SecondsFormat, Utc};

/// Source of wall-clock time for timestamps and identifiers.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
            .lock()
            .map(|guard| *guard)
            .unwrap_or_else(|poisoned| *poisoned.into_inner())
    }
}

/// Hands out identifiers derived from the millisecond clock, bumped past the
/// largest identifier seen so far so two allocations never collide.
#[derive(Debug, Default, Clone)]
pub struct IdAllocator {
    last: u64,
}

impl IdAllocator {
    pub fn next(&mut self, now: DateTime<Utc>) -> u64 {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        let id = millis.max(self.last.saturating_add(1));
        self.last = id;
        id
    }

    pub fn observe(&mut self, seen: u64) {
        self.last = self.last.max(seen);
    }
}

pub fn timestamp(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn ids_are_unique_within_one_millisecond() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut ids = IdAllocator::default();
        let first = ids.next(now);
        let second = ids.next(now);
        assert_eq!(first, now.timestamp_millis() as u64);
        assert_eq!(second, first + 1);
    }

    #[test]
    fn observed_ids_are_skipped() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let mut ids = IdAllocator::default();
        let far_future = now.timestamp_millis() as u64 + 10_000;
        ids.observe(far_future);
        assert_eq!(ids.next(now), far_future + 1);
    }

    #[test]
    fn manual_clock_advances() {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let clock = ManualClock::new(start);
        clock.advance(Duration::seconds(90));
        assert_eq!(timestamp(clock.now()), "2026-03-01T12:01:30.000Z");
    }
}
