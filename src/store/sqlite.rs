//! SQLite-backed event, relation, and flow repositories.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (nanosecond precision,
//! `Z` suffix) so lexical order in SQL matches chronological order.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;

use super::{EventSource, FlowStore, RelationStore};
use crate::error::FlowError;
use crate::flow::types::{ActivityEvent, FlowGraph, Metadata, Relation, RelationType};

/// Column list shared by every event query.
const EVENT_COLUMNS: &str =
    "id, timestamp, activity_type, content, source, session_id, metadata";

/// Row counts and time range of the store.
#[derive(Debug, Serialize)]
pub struct StoreStats {
    pub events: u64,
    pub sessions: u64,
    pub relations: u64,
    pub relations_by_type: BTreeMap<String, u64>,
    pub flows: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oldest_event: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub newest_event: Option<String>,
}

/// Listing entry for a stored flow.
#[derive(Debug, Serialize)]
pub struct FlowSummary {
    pub id: String,
    pub session_id: Option<String>,
    pub node_count: u64,
    pub edge_count: u64,
    pub created_at: String,
}

/// A single SQLite connection implementing all three repositories.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            conn: crate::db::open_database(path)?,
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: crate::db::open_memory_database()?,
        })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert an event. Returns `false` if an event with the same id already exists.
    pub fn insert_event(&self, event: &ActivityEvent) -> Result<bool> {
        let metadata = if event.metadata.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&event.metadata)?)
        };
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO events (id, timestamp, activity_type, content, source, session_id, metadata) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                event.id,
                format_ts(&event.timestamp),
                event.activity_type,
                event.content,
                event.source,
                event.session_id,
                metadata,
            ],
        )?;
        Ok(inserted == 1)
    }

    /// Stored flows, newest first.
    pub fn list_flows(&self, limit: usize) -> Result<Vec<FlowSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, node_count, edge_count, created_at \
             FROM flows ORDER BY created_at DESC, id DESC LIMIT ?1",
        )?;
        let flows = stmt
            .query_map(params![limit as i64], |row| {
                Ok(FlowSummary {
                    id: row.get(0)?,
                    session_id: row.get(1)?,
                    node_count: row.get::<_, i64>(2)? as u64,
                    edge_count: row.get::<_, i64>(3)? as u64,
                    created_at: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(flows)
    }

    /// Compute store statistics.
    pub fn stats(&self) -> Result<StoreStats> {
        let count = |sql: &str| -> Result<u64> {
            let n: i64 = self.conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as u64)
        };

        let mut relations_by_type = BTreeMap::new();
        let mut stmt = self
            .conn
            .prepare("SELECT type, COUNT(*) FROM relations GROUP BY type")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (kind, n) = row?;
            relations_by_type.insert(kind, n as u64);
        }

        let (oldest_event, newest_event): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(timestamp), MAX(timestamp) FROM events",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(StoreStats {
            events: count("SELECT COUNT(*) FROM events")?,
            sessions: count("SELECT COUNT(DISTINCT session_id) FROM events")?,
            relations: count("SELECT COUNT(*) FROM relations")?,
            relations_by_type,
            flows: count("SELECT COUNT(*) FROM flows")?,
            oldest_event,
            newest_event,
        })
    }

    fn query_events(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<ActivityEvent>> {
        let mut stmt = self.conn.prepare(sql)?;
        let events = stmt
            .query_map(params, event_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }
}

impl EventSource for SqliteStore {
    fn events_for_session(&self, session_id: &str) -> Result<Vec<ActivityEvent>> {
        self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM events WHERE session_id = ?1 ORDER BY timestamp, id"
            ),
            params![session_id],
        )
        .with_context(|| format!("failed to load events for session {session_id}"))
    }

    fn events_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        max_count: usize,
    ) -> Result<Vec<ActivityEvent>> {
        if max_count == 0 {
            return Err(FlowError::InvalidArgument("max_count must be at least 1".into()).into());
        }
        if start > end {
            return Err(FlowError::InvalidArgument(format!(
                "time range start {start} is after end {end}"
            ))
            .into());
        }

        let mut events = self.query_events(
            &format!(
                "SELECT {EVENT_COLUMNS} FROM events \
                 WHERE timestamp >= ?1 AND timestamp <= ?2 \
                 ORDER BY timestamp DESC, id DESC LIMIT ?3"
            ),
            params![format_ts(&start), format_ts(&end), max_count as i64],
        )?;
        events.reverse();
        Ok(events)
    }
}

impl RelationStore for SqliteStore {
    fn save_relation(&self, relation: &Relation) -> Result<String> {
        let tx = self.conn.unchecked_transaction()?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO relations (id, created_at, type, related_event_ids, strength, description, tags) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                relation.id,
                format_ts(&relation.timestamp),
                relation.relation_type.as_str(),
                serde_json::to_string(&relation.related_event_ids)?,
                relation.strength,
                relation.description,
                serde_json::to_string(&relation.tags)?,
            ],
        )?;

        if inserted == 1 {
            for (position, event_id) in relation.related_event_ids.iter().enumerate() {
                tx.execute(
                    "INSERT INTO relation_events (relation_id, event_id, position) VALUES (?1, ?2, ?3)",
                    params![relation.id, event_id, position as i64],
                )?;
            }
        }
        tx.commit()?;

        Ok(relation.id.clone())
    }

    fn relations_for_events(&self, event_ids: &[String]) -> Result<Vec<Relation>> {
        if event_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; event_ids.len()].join(", ");
        let sql = format!(
            "SELECT id, created_at, type, related_event_ids, strength, description, tags \
             FROM relations WHERE id IN \
             (SELECT relation_id FROM relation_events WHERE event_id IN ({placeholders})) \
             ORDER BY created_at, id"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let relations = stmt
            .query_map(params_from_iter(event_ids.iter()), relation_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(relations)
    }
}

impl FlowStore for SqliteStore {
    fn save_flow(&self, graph: &FlowGraph) -> Result<String> {
        let id = uuid::Uuid::now_v7().to_string();
        let json = serde_json::to_string(graph).context("failed to serialize flow graph")?;

        self.conn.execute(
            "INSERT INTO flows (id, session_id, node_count, edge_count, graph, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                id,
                graph.session_id,
                graph.nodes.len() as i64,
                graph.edges.len() as i64,
                json,
                format_ts(&Utc::now()),
            ],
        )?;

        tracing::info!(flow_id = %id, nodes = graph.nodes.len(), edges = graph.edges.len(), "flow saved");
        Ok(id)
    }

    fn flow_by_id(&self, id: &str) -> Result<Option<FlowGraph>> {
        let json: Option<String> = self
            .conn
            .query_row("SELECT graph FROM flows WHERE id = ?1", params![id], |row| {
                row.get(0)
            })
            .optional()?;

        json.map(|j| {
            serde_json::from_str::<FlowGraph>(&j)
                .with_context(|| format!("corrupt flow graph stored under {id}"))
        })
        .transpose()
    }
}

fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn parse_json<T: serde::de::DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn event_from_row(row: &Row) -> rusqlite::Result<ActivityEvent> {
    let metadata: Option<String> = row.get(6)?;
    let metadata: Metadata = match metadata {
        Some(raw) => serde_json::from_str(&raw).map_err(|e| conversion_error(6, e))?,
        None => Metadata::new(),
    };
    Ok(ActivityEvent {
        id: row.get(0)?,
        timestamp: parse_ts(row, 1)?,
        activity_type: row.get(2)?,
        content: row.get(3)?,
        source: row.get(4)?,
        session_id: row.get(5)?,
        metadata,
    })
}

fn relation_from_row(row: &Row) -> rusqlite::Result<Relation> {
    Ok(Relation {
        id: row.get(0)?,
        timestamp: parse_ts(row, 1)?,
        relation_type: RelationType::from(row.get::<_, String>(2)?),
        related_event_ids: parse_json(row, 3)?,
        strength: row.get(4)?,
        description: row.get(5)?,
        tags: parse_json(row, 6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn event(secs: i64, session: &str) -> ActivityEvent {
        ActivityEvent::new("code_edit", format!("edit {secs}"), "editor", session)
            .at(Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap())
    }

    #[test]
    fn insert_event_is_idempotent() {
        let s = store();
        let e = event(0, "s1");
        assert!(s.insert_event(&e).unwrap());
        assert!(!s.insert_event(&e).unwrap());
        assert_eq!(s.stats().unwrap().events, 1);
    }

    #[test]
    fn session_events_round_trip_in_time_order() {
        let s = store();
        let late = event(100, "s1").with_meta("file", "src/lib.rs").with_meta("line", 3.0);
        let early = event(0, "s1");
        let other = event(50, "s2");
        for e in [&late, &early, &other] {
            s.insert_event(e).unwrap();
        }

        let loaded = s.events_for_session("s1").unwrap();
        assert_eq!(loaded, vec![early, late]);
    }

    #[test]
    fn range_keeps_most_recent() {
        let s = store();
        let events: Vec<_> = (0..5).map(|i| event(i * 10, "s1")).collect();
        for e in &events {
            s.insert_event(e).unwrap();
        }
        let start = events[0].timestamp;
        let end = events[4].timestamp;

        let loaded = s.events_in_range(start, end, 2).unwrap();
        let ids: Vec<&str> = loaded.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![events[3].id.as_str(), events[4].id.as_str()]);
    }

    #[test]
    fn range_rejects_bad_arguments() {
        let s = store();
        let now = Utc::now();
        assert!(s.events_in_range(now, now, 0).is_err());
        assert!(s
            .events_in_range(now, now - chrono::Duration::seconds(1), 10)
            .is_err());
    }

    #[test]
    fn relations_found_by_any_member() {
        let s = store();
        let r = Relation::new(
            RelationType::Temporal,
            vec!["a".into(), "b".into(), "c".into()],
            0.3,
            "run",
        )
        .with_tags(["temporal".to_string()]);
        assert_eq!(s.save_relation(&r).unwrap(), r.id);
        // saving twice is a no-op
        s.save_relation(&r).unwrap();

        let found = s.relations_for_events(&["c".to_string()]).unwrap();
        assert_eq!(found, vec![r.clone()]);
        let found = s
            .relations_for_events(&["a".to_string(), "b".to_string()])
            .unwrap();
        assert_eq!(found.len(), 1);
        assert!(s.relations_for_events(&["zzz".to_string()]).unwrap().is_empty());
        assert!(s.relations_for_events(&[]).unwrap().is_empty());
    }

    #[test]
    fn manual_relation_type_survives_storage() {
        let s = store();
        let r = Relation::manual("blocks", vec!["a".into(), "b".into()], 0.9, "declared");
        s.save_relation(&r).unwrap();
        let found = s.relations_for_events(&["a".to_string()]).unwrap();
        assert_eq!(found[0].relation_type, RelationType::Manual("blocks".into()));
        assert_eq!(s.stats().unwrap().relations_by_type["blocks"], 1);
    }

    #[test]
    fn flows_round_trip() {
        let s = store();
        let mut g = FlowGraph::new();
        let a = g.add_node("code_edit", "a");
        let b = g.add_node("code_edit", "b");
        g.connect(&a, &b, RelationType::Sequence, 1.0).unwrap();

        let id = s.save_flow(&g).unwrap();
        assert_eq!(s.flow_by_id(&id).unwrap(), Some(g));
        assert_eq!(s.flow_by_id("missing").unwrap(), None);

        let listed = s.list_flows(10).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].node_count, 2);
        assert_eq!(listed[0].edge_count, 1);
    }

    #[test]
    fn stats_on_empty_store() {
        let stats = store().stats().unwrap();
        assert_eq!(stats.events, 0);
        assert_eq!(stats.flows, 0);
        assert!(stats.oldest_event.is_none());
    }
}
