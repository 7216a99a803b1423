//! CLI `flow` command: build, optionally save, and export a flow graph.

use anyhow::Result;

use loci_flow::config::FlowConfig;
use loci_flow::flow::correlate::Strategies;
use loci_flow::flow::export::{export, ExportFormat};
use loci_flow::flow::run_flow;
use loci_flow::store::{FlowStore, RelationStore};

use super::EventWindow;

/// Build a flow for the selected events. Relations already stored for those
/// events are merged with freshly detected ones.
pub fn flow(
    config: &FlowConfig,
    window: &EventWindow<'_>,
    strategies: &Strategies,
    min_strength: Option<f64>,
    format: ExportFormat,
    save: bool,
) -> Result<()> {
    let store = super::open_store(config)?;
    let events = super::load_events(&store, config, window)?;

    let event_ids: Vec<String> = events.iter().map(|e| e.id.clone()).collect();
    let known = store.relations_for_events(&event_ids)?;

    let run = run_flow(&events, &known, strategies, min_strength, &config.detection)?;

    if save {
        let id = store.save_flow(&run.graph)?;
        eprintln!("Saved flow {id}");
    }

    println!("{}", export(&run.graph, format)?);
    eprintln!(
        "{} nodes, {} edges, {} component(s), density {:.3}, eulerian path: {}",
        run.analysis.node_count,
        run.analysis.edge_count,
        run.analysis.connected_components,
        run.analysis.density,
        if run.analysis.has_eulerian_path { "yes" } else { "no" },
    );
    Ok(())
}
