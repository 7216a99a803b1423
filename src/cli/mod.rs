pub mod analyze;
pub mod correlate;
pub mod export;
pub mod flow;
pub mod ingest;
pub mod stats;

use anyhow::{bail, Result};
use chrono::{Duration, Utc};

use loci_flow::config::FlowConfig;
use loci_flow::flow::types::ActivityEvent;
use loci_flow::store::{EventSource, SqliteStore};

/// Open the configured store.
pub fn open_store(config: &FlowConfig) -> Result<SqliteStore> {
    SqliteStore::open(config.resolved_db_path())
}

/// Which events a command should work on.
pub enum EventWindow<'a> {
    /// Every event of one session.
    Session(&'a str),
    /// The most recent events inside the configured capture window.
    Recent,
}

impl<'a> EventWindow<'a> {
    pub fn from_args(session: Option<&'a str>, recent: bool) -> Result<Self> {
        match (session, recent) {
            (Some(s), false) => Ok(Self::Session(s)),
            (None, true) => Ok(Self::Recent),
            (Some(_), true) => bail!("--session and --recent are mutually exclusive"),
            (None, false) => bail!("pass --session <ID> or --recent"),
        }
    }
}

/// Load the events selected by `window`, capped at `capture.max_events`.
pub fn load_events(
    store: &SqliteStore,
    config: &FlowConfig,
    window: &EventWindow<'_>,
) -> Result<Vec<ActivityEvent>> {
    let max = config.capture.max_events;
    let mut events = match window {
        EventWindow::Session(session) => store.events_for_session(session)?,
        EventWindow::Recent => {
            let end = Utc::now();
            let start = end - Duration::minutes(config.capture.window_minutes);
            store.events_in_range(start, end, max)?
        }
    };

    // Keep only the newest `max` events.
    if events.len() > max {
        tracing::warn!(
            loaded = events.len(),
            kept = max,
            "event window exceeds capture.max_events, dropping oldest"
        );
        events.drain(..events.len() - max);
    }
    Ok(events)
}
