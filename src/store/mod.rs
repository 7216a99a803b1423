//! Repositories the engine's callers use to fetch inputs and persist outputs.
//!
//! The engine never touches storage itself. These traits are the narrow
//! contracts a host wires it to; [`SqliteStore`] is the bundled implementation.

pub mod sqlite;

use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::flow::types::{ActivityEvent, FlowGraph, Relation};

pub use sqlite::SqliteStore;

/// Read access to captured activity events.
pub trait EventSource {
    /// All events of a session, oldest first.
    fn events_for_session(&self, session_id: &str) -> Result<Vec<ActivityEvent>>;

    /// The most recent `max_count` events in `[start, end]`, oldest first.
    fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_count: usize,
    ) -> Result<Vec<ActivityEvent>>;
}

/// Persistence for detected and declared relations.
pub trait RelationStore {
    /// Store a relation and return its id. Saving the same id twice is a no-op.
    fn save_relation(&self, relation: &Relation) -> Result<String>;

    /// Every relation touching at least one of `event_ids`.
    fn relations_for_events(&self, event_ids: &[String]) -> Result<Vec<Relation>>;
}

/// Persistence for built flow graphs.
pub trait FlowStore {
    /// Store a graph under a fresh id and return it.
    fn save_flow(&self, graph: &FlowGraph) -> Result<String>;

    /// Fetch a stored graph. `Ok(None)` when no flow has this id.
    fn flow_by_id(&self, id: &str) -> Result<Option<FlowGraph>>;
}
