use anyhow::{Context, Result};

use loci_flow::config::FlowConfig;
use loci_flow::flow::export::{export as export_graph, ExportFormat};
use loci_flow::store::FlowStore;

/// Export a stored flow to stdout in the requested format.
pub fn export(config: &FlowConfig, flow_id: &str, format: ExportFormat) -> Result<()> {
    let store = super::open_store(config)?;

    let graph = store
        .flow_by_id(flow_id)?
        .with_context(|| format!("flow not found: {flow_id}"))?;

    let text = export_graph(&graph, format)?;
    println!("{text}");

    eprintln!(
        "Exported flow {flow_id} as {format} ({} nodes, {} edges).",
        graph.nodes.len(),
        graph.edges.len()
    );
    Ok(())
}
