//! Forward-only schema migrations.
//!
//! `schema_meta.schema_version` records the last applied step. Each step in
//! [`MIGRATIONS`] runs in its own transaction together with the version bump,
//! so a failed step leaves the database at the previous version.

use rusqlite::{Connection, OptionalExtension};

/// One schema step, applied to databases whose version is `to - 1`.
struct Migration {
    to: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        to: 2,
        name: "session/time index for window queries",
        sql: "CREATE INDEX IF NOT EXISTS idx_events_session_time ON events(session_id, timestamp);",
    },
    Migration {
        to: 3,
        name: "creation-time index for flow listings",
        sql: "CREATE INDEX IF NOT EXISTS idx_flows_created ON flows(created_at);",
    },
];

/// The schema version this build writes.
pub const CURRENT_SCHEMA_VERSION: u32 = 3;

/// Stored schema version. A missing or unreadable value reads as 0.
pub fn get_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = 'schema_version'",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(raw.and_then(|v| v.parse().ok()).unwrap_or(0))
}

/// Apply every migration newer than the stored version, in order.
pub fn run_migrations(conn: &Connection) -> rusqlite::Result<()> {
    let start = get_schema_version(conn)?;
    tracing::debug!(
        schema_version = start,
        latest = CURRENT_SCHEMA_VERSION,
        "checking migrations"
    );

    for step in MIGRATIONS.iter().filter(|m| m.to > start) {
        tracing::info!(to = step.to, migration = step.name, "running migration");
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(step.sql)?;
        tx.execute(
            "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
            [step.to.to_string()],
        )?;
        tx.commit()?;
    }

    Ok(())
}
