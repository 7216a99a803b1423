#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use loci_flow::flow::types::ActivityEvent;
use loci_flow::store::SqliteStore;

/// Fixed reference time so tests are reproducible.
pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

/// An event `secs` seconds after [`t0`].
pub fn event_at(secs: i64, activity_type: &str, content: &str) -> ActivityEvent {
    ActivityEvent::new(activity_type, content, "editor", "session-1")
        .at(t0() + Duration::seconds(secs))
}

/// `n` events of one type spaced `step_secs` apart, all with distinct content.
pub fn spaced_events(n: usize, step_secs: i64, activity_type: &str) -> Vec<ActivityEvent> {
    (0..n)
        .map(|i| event_at(i as i64 * step_secs, activity_type, &format!("step number {i}")))
        .collect()
}

/// Open a fresh in-memory store with schema and migrations applied.
pub fn test_store() -> SqliteStore {
    SqliteStore::open_in_memory().unwrap()
}
