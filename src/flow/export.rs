//! Textual export of flow graphs: JSON, Graphviz DOT, and Mermaid.
//!
//! These three formats are the engine's only wire format. Any transport layer
//! forwards the chosen format name and returns the produced text verbatim.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::str::FromStr;

use crate::error::FlowError;
use crate::flow::types::{FlowGraph, RelationType};

/// Supported export formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Dot,
    Mermaid,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Dot => "dot",
            Self::Mermaid => "mermaid",
        }
    }
}

impl std::fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "dot" => Ok(Self::Dot),
            "mermaid" => Ok(Self::Mermaid),
            _ => Err(FlowError::UnsupportedFormat(s.to_string())),
        }
    }
}

/// Fill colors for well-known node types; everything else is light gray.
const NODE_PALETTE: &[(&str, &str)] = &[
    ("code_edit", "lightblue"),
    ("navigation", "lightgreen"),
    ("search", "lightyellow"),
    ("conversation", "lightpink"),
    ("command", "lightsalmon"),
];

const DEFAULT_FILL: &str = "lightgray";

fn fill_color(node_type: &str) -> &'static str {
    NODE_PALETTE
        .iter()
        .find(|(t, _)| *t == node_type)
        .map_or(DEFAULT_FILL, |(_, color)| *color)
}

/// Export a graph in the format named by `format`.
pub fn export_as(graph: &FlowGraph, format: &str) -> Result<String, FlowError> {
    export(graph, format.parse()?)
}

/// Export a graph in the given format.
pub fn export(graph: &FlowGraph, format: ExportFormat) -> Result<String, FlowError> {
    let text = match format {
        ExportFormat::Json => to_json(graph)?,
        ExportFormat::Dot => to_dot(graph),
        ExportFormat::Mermaid => to_mermaid(graph),
    };
    tracing::debug!(format = %format, bytes = text.len(), "graph exported");
    Ok(text)
}

/// Pretty-printed structural JSON.
pub fn to_json(graph: &FlowGraph) -> Result<String, FlowError> {
    Ok(serde_json::to_string_pretty(graph)?)
}

/// Parse a graph previously produced by [`to_json`].
pub fn from_json(json: &str) -> Result<FlowGraph, FlowError> {
    Ok(serde_json::from_str(json)?)
}

// ── DOT ──────────────────────────────────────────────────────────────────────

fn dot_escape(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn dot_edge_style(kind: &RelationType) -> &'static str {
    match kind {
        RelationType::Temporal => "dashed",
        RelationType::Semantic => "dotted",
        _ => "solid",
    }
}

/// Graphviz `digraph` with fill colors by node type and styles by relation type.
pub fn to_dot(graph: &FlowGraph) -> String {
    let mut out = String::new();
    out.push_str("digraph FlowGraph {\n");
    out.push_str("  rankdir=LR;\n");
    out.push_str("  node [shape=box, style=filled];\n");

    for node in &graph.nodes {
        let _ = writeln!(
            out,
            "  \"{}\" [label=\"{}\", fillcolor=\"{}\"];",
            dot_escape(&node.id),
            dot_escape(&node.label),
            fill_color(&node.node_type),
        );
    }

    for edge in &graph.edges {
        let _ = writeln!(
            out,
            "  \"{}\" -> \"{}\" [label=\"{} ({:.2})\", style={}];",
            dot_escape(&edge.source_node_id),
            dot_escape(&edge.target_node_id),
            dot_escape(edge.relation_type.as_str()),
            edge.weight,
            dot_edge_style(&edge.relation_type),
        );
    }

    out.push_str("}\n");
    out
}

// ── Mermaid ──────────────────────────────────────────────────────────────────

/// Mermaid identifiers may only hold word characters.
fn mermaid_id(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("n_{cleaned}")
}

fn mermaid_class(node_type: &str) -> String {
    let cleaned: String = node_type
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "type_unknown".to_string()
    } else {
        format!("type_{cleaned}")
    }
}

fn mermaid_label(s: &str) -> String {
    s.replace('"', "#quot;").replace('\n', " ")
}

fn mermaid_arrow(kind: &RelationType) -> String {
    match kind {
        RelationType::Temporal => "-.->".to_string(),
        RelationType::Causal => "==>".to_string(),
        RelationType::Semantic => "-->".to_string(),
        other => format!("-->|{}|", mermaid_label(other.as_str())),
    }
}

/// Mermaid `flowchart` with a style class per node type.
pub fn to_mermaid(graph: &FlowGraph) -> String {
    let mut out = String::from("flowchart LR\n");

    for node in &graph.nodes {
        let _ = writeln!(
            out,
            "  {}[\"{}\"]:::{}",
            mermaid_id(&node.id),
            mermaid_label(&node.label),
            mermaid_class(&node.node_type),
        );
    }

    for edge in &graph.edges {
        let _ = writeln!(
            out,
            "  {} {} {}",
            mermaid_id(&edge.source_node_id),
            mermaid_arrow(&edge.relation_type),
            mermaid_id(&edge.target_node_id),
        );
    }

    let node_types: BTreeSet<&str> = graph.nodes.iter().map(|n| n.node_type.as_str()).collect();
    for node_type in node_types {
        let _ = writeln!(
            out,
            "  classDef {} fill:{}",
            mermaid_class(node_type),
            fill_color(node_type),
        );
    }

    out
}
