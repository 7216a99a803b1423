//! SQL DDL for all loci-flow tables.
//!
//! Defines the `events`, `relations`, `relation_events`, `flows`, and
//! `schema_meta` tables. All DDL uses `IF NOT EXISTS` for idempotent
//! initialization.

use rusqlite::Connection;

/// All schema DDL statements for the core tables.
const SCHEMA_SQL: &str = r#"
-- Captured activity events
CREATE TABLE IF NOT EXISTS events (
    id TEXT PRIMARY KEY,
    timestamp TEXT NOT NULL,
    activity_type TEXT NOT NULL,
    content TEXT NOT NULL,
    source TEXT NOT NULL,
    session_id TEXT NOT NULL,
    metadata TEXT
);

CREATE INDEX IF NOT EXISTS idx_events_session ON events(session_id);
CREATE INDEX IF NOT EXISTS idx_events_timestamp ON events(timestamp);

-- Detected or declared relations; event ids are a JSON array
CREATE TABLE IF NOT EXISTS relations (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    type TEXT NOT NULL,
    related_event_ids TEXT NOT NULL,
    strength REAL NOT NULL CHECK(strength >= 0.0 AND strength <= 1.0),
    description TEXT NOT NULL DEFAULT '',
    tags TEXT NOT NULL DEFAULT '[]'
);

CREATE INDEX IF NOT EXISTS idx_relations_type ON relations(type);

-- Membership index so relations can be found by any of their events
CREATE TABLE IF NOT EXISTS relation_events (
    relation_id TEXT NOT NULL REFERENCES relations(id) ON DELETE CASCADE,
    event_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    PRIMARY KEY (relation_id, position)
);

CREATE INDEX IF NOT EXISTS idx_relation_events_event ON relation_events(event_id);

-- Built flow graphs, stored as JSON
CREATE TABLE IF NOT EXISTS flows (
    id TEXT PRIMARY KEY,
    session_id TEXT,
    node_count INTEGER NOT NULL,
    edge_count INTEGER NOT NULL,
    graph TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Schema metadata
CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Initialize all schema tables. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA_SQL)?;

    // Set initial schema version if not already present
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', '1')",
        [],
    )?;

    Ok(())
}
