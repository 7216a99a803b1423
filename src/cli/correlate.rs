//! CLI `correlate` command: detect relations for a session or recent window.

use anyhow::Result;

use loci_flow::config::FlowConfig;
use loci_flow::flow::correlate::{detect_correlations, Strategies};
use loci_flow::store::RelationStore;

use super::EventWindow;

/// Detect relations and print them as JSON. With `save`, persist them too.
pub fn correlate(
    config: &FlowConfig,
    window: &EventWindow<'_>,
    strategies: &Strategies,
    min_strength: Option<f64>,
    save: bool,
) -> Result<()> {
    let store = super::open_store(config)?;
    let events = super::load_events(&store, config, window)?;

    let relations = detect_correlations(&events, strategies, min_strength, &config.detection)?;

    if save {
        for relation in &relations {
            store.save_relation(relation)?;
        }
    }

    println!("{}", serde_json::to_string_pretty(&relations)?);
    eprintln!(
        "Detected {} relations across {} events{}.",
        relations.len(),
        events.len(),
        if save { " (saved)" } else { "" }
    );
    Ok(())
}
