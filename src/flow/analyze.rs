//! Read-only structural analysis of a [`FlowGraph`].
//!
//! Eulerian checks use undirected degree (in + out). Edges whose endpoints are
//! not nodes of the graph are ignored everywhere.

use std::collections::HashMap;

use serde::Serialize;

use crate::flow::types::FlowGraph;

/// Summary of every structural property computed here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphAnalysis {
    pub node_count: usize,
    pub edge_count: usize,
    pub odd_degree_nodes: usize,
    pub has_eulerian_circuit: bool,
    pub has_eulerian_path: bool,
    pub connected_components: usize,
    pub density: f64,
}

/// Analyze a graph. An absent graph is analyzed as the empty graph.
pub fn analyze(graph: Option<&FlowGraph>) -> GraphAnalysis {
    let empty = FlowGraph::default();
    let g = graph.unwrap_or(&empty);
    let odd = odd_degree_count(g);
    GraphAnalysis {
        node_count: g.nodes.len(),
        edge_count: g.edges.len(),
        odd_degree_nodes: odd,
        has_eulerian_circuit: odd == 0,
        has_eulerian_path: odd == 0 || odd == 2,
        connected_components: connected_components(g),
        density: density(g),
    }
}

/// Undirected degree of every node. Self-loops count twice.
pub fn degrees(g: &FlowGraph) -> HashMap<&str, usize> {
    let mut degree: HashMap<&str, usize> =
        g.nodes.iter().map(|n| (n.id.as_str(), 0)).collect();
    for edge in &g.edges {
        if !degree.contains_key(edge.source_node_id.as_str())
            || !degree.contains_key(edge.target_node_id.as_str())
        {
            continue;
        }
        for end in [&edge.source_node_id, &edge.target_node_id] {
            if let Some(d) = degree.get_mut(end.as_str()) {
                *d += 1;
            }
        }
    }
    degree
}

fn odd_degree_count(g: &FlowGraph) -> usize {
    degrees(g).values().filter(|d| *d % 2 == 1).count()
}

/// True iff every node has even degree. Isolated nodes count as even.
pub fn has_eulerian_circuit(g: &FlowGraph) -> bool {
    odd_degree_count(g) == 0
}

/// True iff zero or exactly two nodes have odd degree.
pub fn has_eulerian_path(g: &FlowGraph) -> bool {
    matches!(odd_degree_count(g), 0 | 2)
}

/// Number of weakly connected components, counting isolated nodes.
pub fn connected_components(g: &FlowGraph) -> usize {
    let index: HashMap<&str, usize> = g
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.as_str(), i))
        .collect();

    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); g.nodes.len()];
    for edge in &g.edges {
        if let (Some(&a), Some(&b)) = (
            index.get(edge.source_node_id.as_str()),
            index.get(edge.target_node_id.as_str()),
        ) {
            adjacency[a].push(b);
            adjacency[b].push(a);
        }
    }

    let mut visited = vec![false; g.nodes.len()];
    let mut components = 0;
    let mut stack = Vec::new();

    for root in 0..g.nodes.len() {
        if visited[root] {
            continue;
        }
        components += 1;
        visited[root] = true;
        stack.push(root);
        while let Some(node) = stack.pop() {
            for &next in &adjacency[node] {
                if !visited[next] {
                    visited[next] = true;
                    stack.push(next);
                }
            }
        }
    }

    components
}

/// `2|E| / (|V| (|V| - 1))`, or 0 for graphs with at most one node.
pub fn density(g: &FlowGraph) -> f64 {
    let v = g.nodes.len();
    if v <= 1 {
        return 0.0;
    }
    (2 * g.edges.len()) as f64 / (v * (v - 1)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::types::RelationType;

    fn graph_with(n: usize) -> (FlowGraph, Vec<String>) {
        let mut g = FlowGraph::new();
        let ids = (0..n).map(|i| g.add_node("code_edit", format!("n{i}"))).collect();
        (g, ids)
    }

    fn link(g: &mut FlowGraph, a: &str, b: &str) {
        g.connect(a, b, RelationType::Causal, 1.0).unwrap();
    }

    #[test]
    fn empty_graph() {
        let g = FlowGraph::new();
        assert!(has_eulerian_circuit(&g));
        assert!(has_eulerian_path(&g));
        assert_eq!(connected_components(&g), 0);
        assert_eq!(density(&g), 0.0);
    }

    #[test]
    fn absent_graph_is_empty_analysis() {
        let report = analyze(None);
        assert_eq!(report.node_count, 0);
        assert_eq!(report.connected_components, 0);
        assert!(report.has_eulerian_circuit);
    }

    #[test]
    fn triangle_is_eulerian_circuit() {
        let (mut g, ids) = graph_with(3);
        link(&mut g, &ids[0], &ids[1]);
        link(&mut g, &ids[1], &ids[2]);
        link(&mut g, &ids[2], &ids[0]);
        assert!(has_eulerian_circuit(&g));
        assert!(has_eulerian_path(&g));
        assert_eq!(connected_components(&g), 1);
        assert_eq!(density(&g), 1.0);
    }

    #[test]
    fn isolated_nodes_do_not_disqualify_circuit() {
        let (mut g, ids) = graph_with(4);
        link(&mut g, &ids[0], &ids[1]);
        link(&mut g, &ids[1], &ids[2]);
        link(&mut g, &ids[2], &ids[0]);
        assert!(has_eulerian_circuit(&g));
        assert_eq!(connected_components(&g), 2);
    }

    #[test]
    fn chain_has_path_but_no_circuit() {
        let (mut g, ids) = graph_with(3);
        link(&mut g, &ids[0], &ids[1]);
        link(&mut g, &ids[1], &ids[2]);
        assert!(!has_eulerian_circuit(&g));
        assert!(has_eulerian_path(&g));
        let report = analyze(Some(&g));
        assert_eq!(report.odd_degree_nodes, 2);
    }

    #[test]
    fn star_has_neither() {
        let (mut g, ids) = graph_with(4);
        for leaf in &ids[1..] {
            link(&mut g, &ids[0], leaf);
        }
        // centre degree 3, three leaves degree 1
        assert!(!has_eulerian_circuit(&g));
        assert!(!has_eulerian_path(&g));
    }

    #[test]
    fn self_loop_counts_twice() {
        let (mut g, ids) = graph_with(1);
        link(&mut g, &ids[0], &ids[0]);
        assert_eq!(degrees(&g)[ids[0].as_str()], 2);
        assert!(has_eulerian_circuit(&g));
    }

    #[test]
    fn dangling_edges_are_ignored() {
        let (mut g, ids) = graph_with(2);
        g.edges.push(crate::flow::types::FlowEdge {
            id: "e".into(),
            source_node_id: ids[0].clone(),
            target_node_id: "nowhere".into(),
            relation_type: RelationType::Causal,
            weight: 1.0,
        });
        assert!(has_eulerian_circuit(&g));
        assert_eq!(connected_components(&g), 2);
    }

    #[test]
    fn density_of_chain() {
        let (mut g, ids) = graph_with(4);
        link(&mut g, &ids[0], &ids[1]);
        link(&mut g, &ids[1], &ids[2]);
        link(&mut g, &ids[2], &ids[3]);
        assert!((density(&g) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn single_node_density_is_zero() {
        let (g, _) = graph_with(1);
        assert_eq!(density(&g), 0.0);
        assert_eq!(connected_components(&g), 1);
    }
}
