//! CLI `ingest` command: load activity events from a JSON file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use loci_flow::config::FlowConfig;
use loci_flow::flow::types::ActivityEvent;

/// Accepts either a bare array of events or `{"events": [...]}`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IngestData {
    Bare(Vec<ActivityEvent>),
    Wrapped { events: Vec<ActivityEvent> },
}

/// Ingest events from a JSON file. Events whose id already exists are skipped.
pub fn ingest(config: &FlowConfig, file: &Path) -> Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read ingest file: {}", file.display()))?;

    let data: IngestData = serde_json::from_str(&json).context("failed to parse events JSON")?;
    let events = match data {
        IngestData::Bare(events) | IngestData::Wrapped { events } => events,
    };

    let store = super::open_store(config)?;

    let mut imported = 0u64;
    let mut skipped = 0u64;
    for event in &events {
        if store.insert_event(event)? {
            imported += 1;
        } else {
            skipped += 1;
        }
    }

    tracing::info!(imported, skipped, "ingest finished");
    eprintln!("Ingested {imported} events ({skipped} already present).");
    Ok(())
}
