//! Flow graph construction from events and relations.
//!
//! Edges are added in three passes, in priority order:
//!
//! 1. **Relations**: one edge per consecutive id pair of each relation.
//! 2. **Fallback chain**: only if pass 1 produced nothing, a
//!    `temporal_sequence` chain through all nodes in time order.
//! 3. **Backfill**: same-type nodes that are still in different components
//!    (and not neighbours in the type group) get a `semantic` edge.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::flow::types::{
    truncate, ActivityEvent, FlowEdge, FlowGraph, FlowNode, Relation, RelationType,
};

/// Max label length (chars) before truncation.
pub const LABEL_MAX_CHARS: usize = 60;

/// Weight of fallback chain edges.
pub const SEQUENCE_WEIGHT: f64 = 1.0;

/// Weight of backfilled same-type edges.
pub const BACKFILL_WEIGHT: f64 = 0.5;

/// Build a flow graph with one node per event.
///
/// Relation ids that do not resolve to an event are skipped pair-by-pair.
/// Duplicate event ids collapse onto the first node created for that id.
pub fn build_graph(events: &[ActivityEvent], relations: &[Relation]) -> FlowGraph {
    let mut graph = FlowGraph {
        session_id: common_session(events),
        ..FlowGraph::default()
    };

    // Node creation in time order keeps node order (and therefore exports) stable.
    let mut ordered: Vec<&ActivityEvent> = events.iter().collect();
    ordered.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

    let mut node_for_event: HashMap<&str, usize> = HashMap::with_capacity(ordered.len());
    for event in &ordered {
        if node_for_event.contains_key(event.id.as_str()) {
            continue;
        }
        node_for_event.insert(event.id.as_str(), graph.nodes.len());
        graph.nodes.push(node_from_event(event));
    }

    let mut dropped = 0usize;
    for relation in relations {
        for pair in relation.related_event_ids.windows(2) {
            match (
                node_for_event.get(pair[0].as_str()),
                node_for_event.get(pair[1].as_str()),
            ) {
                (Some(&src), Some(&tgt)) => push_edge(
                    &mut graph,
                    src,
                    tgt,
                    relation.relation_type.clone(),
                    relation.strength,
                ),
                _ => dropped += 1,
            }
        }
    }
    if dropped > 0 {
        debug!(dropped, "skipped relation pairs referencing unknown events");
    }

    if graph.edges.is_empty() && graph.nodes.len() > 1 {
        for i in 1..graph.nodes.len() {
            push_edge(&mut graph, i - 1, i, RelationType::Sequence, SEQUENCE_WEIGHT);
        }
        debug!(edges = graph.edges.len(), "no relation edges, added temporal chain");
    }

    backfill_same_type(&mut graph);

    tracing::info!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        "flow graph built"
    );
    graph
}

fn node_from_event(event: &ActivityEvent) -> FlowNode {
    let mut metadata = event.metadata.clone();
    metadata.insert("source".into(), event.source.as_str().into());
    metadata.insert("timestamp".into(), event.timestamp.into());
    FlowNode {
        id: uuid::Uuid::now_v7().to_string(),
        event_id: event.id.clone(),
        node_type: event.activity_type.clone(),
        label: truncate(&event.content, LABEL_MAX_CHARS),
        metadata,
    }
}

fn push_edge(graph: &mut FlowGraph, src: usize, tgt: usize, kind: RelationType, weight: f64) {
    let edge = FlowEdge {
        id: uuid::Uuid::now_v7().to_string(),
        source_node_id: graph.nodes[src].id.clone(),
        target_node_id: graph.nodes[tgt].id.clone(),
        relation_type: kind,
        weight,
    };
    graph.edges.push(edge);
}

/// The session id shared by every event, if there is exactly one.
fn common_session(events: &[ActivityEvent]) -> Option<String> {
    let first = events.first()?;
    events
        .iter()
        .all(|e| e.session_id == first.session_id)
        .then(|| first.session_id.clone())
}

/// Link same-type nodes that are neither type-group neighbours nor already
/// reachable from one another.
fn backfill_same_type(graph: &mut FlowGraph) {
    let index: HashMap<&str, usize> = graph
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut components = DisjointSet::new(graph.nodes.len());
    for edge in &graph.edges {
        if let (Some(&a), Some(&b)) = (
            index.get(edge.source_node_id.as_str()),
            index.get(edge.target_node_id.as_str()),
        ) {
            components.union(a, b);
        }
    }

    let mut by_type: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, node) in graph.nodes.iter().enumerate() {
        by_type.entry(node.node_type.as_str()).or_default().push(i);
    }

    let mut added = Vec::new();
    for members in by_type.values() {
        for (pos, &a) in members.iter().enumerate() {
            for &b in members.iter().skip(pos + 2) {
                if components.union(a, b) {
                    added.push((a, b));
                }
            }
        }
    }

    let count = added.len();
    for (a, b) in added {
        push_edge(graph, a, b, RelationType::Semantic, BACKFILL_WEIGHT);
    }
    if count > 0 {
        debug!(edges = count, "backfilled same-type edges");
    }
}

/// Union-find over node indices.
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merge the sets of `a` and `b`. Returns `false` if they were already joined.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        self.parent[rb] = ra;
        true
    }
}
