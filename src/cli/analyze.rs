//! CLI `analyze` command: structural report for a stored or freshly built flow.

use anyhow::{bail, Result};

use loci_flow::config::FlowConfig;
use loci_flow::flow::analyze::{analyze as analyze_graph, GraphAnalysis};
use loci_flow::flow::correlate::Strategies;
use loci_flow::flow::run_flow;
use loci_flow::store::{FlowStore, RelationStore};

/// Analyze a stored flow (by id) or build one for a session first.
pub fn analyze(config: &FlowConfig, flow_id: Option<&str>, session: Option<&str>) -> Result<()> {
    let store = super::open_store(config)?;

    let report = match (flow_id, session) {
        (Some(id), None) => {
            let graph = store.flow_by_id(id)?;
            if graph.is_none() {
                tracing::warn!(flow_id = %id, "flow not found, reporting empty analysis");
            }
            analyze_graph(graph.as_ref())
        }
        (None, Some(session)) => {
            let window = super::EventWindow::Session(session);
            let events = super::load_events(&store, config, &window)?;
            let ids: Vec<String> = events.iter().map(|e| e.id.clone()).collect();
            let known = store.relations_for_events(&ids)?;
            run_flow(&events, &known, &Strategies::all(), None, &config.detection)?.analysis
        }
        _ => bail!("pass exactly one of --flow-id <ID> or --session <ID>"),
    };

    print_report(&report);
    Ok(())
}

fn print_report(report: &GraphAnalysis) {
    println!("Flow Analysis");
    println!("{}", "=".repeat(40));
    println!("  Nodes:                {}", report.node_count);
    println!("  Edges:                {}", report.edge_count);
    println!("  Odd-degree nodes:     {}", report.odd_degree_nodes);
    println!("  Eulerian circuit:     {}", yes_no(report.has_eulerian_circuit));
    println!("  Eulerian path:        {}", yes_no(report.has_eulerian_path));
    println!("  Connected components: {}", report.connected_components);
    println!("  Density:              {:.4}", report.density);
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
