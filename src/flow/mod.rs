//! Activity correlation and flow-graph engine.
//!
//! Every operation here is a pure function of its inputs: nothing is cached,
//! nothing global is mutated, and no I/O happens. Persistence lives in
//! [`crate::store`].

pub mod analyze;
pub mod build;
pub mod correlate;
pub mod export;
pub mod tokenize;
pub mod types;

use serde::Serialize;

use crate::config::DetectionConfig;
use crate::error::FlowError;
use analyze::GraphAnalysis;
use correlate::Strategies;
use types::{ActivityEvent, FlowGraph, Relation};

/// Output of a full detect → build → analyze pass.
#[derive(Debug, Clone, Serialize)]
pub struct FlowRun {
    pub relations: Vec<Relation>,
    pub graph: FlowGraph,
    pub analysis: GraphAnalysis,
}

/// Detect correlations, merge them with any `known` relations, build the
/// graph and analyze it.
pub fn run_flow(
    events: &[ActivityEvent],
    known: &[Relation],
    strategies: &Strategies,
    min_strength: Option<f64>,
    config: &DetectionConfig,
) -> Result<FlowRun, FlowError> {
    let mut relations = correlate::detect_correlations(events, strategies, min_strength, config)?;
    relations.extend_from_slice(known);

    let graph = build::build_graph(events, &relations);
    let analysis = analyze::analyze(Some(&graph));

    Ok(FlowRun {
        relations,
        graph,
        analysis,
    })
}
