//! Canonicalize a graph: drop orphaned nodes and dangling edges.
//!
//! The Normalizer never repairs missing branch paths or breaks cycles;
//! that remains the [`Validator`](crate::validator)'s job.

use std::collections::HashSet;

use crate::model::Graph;

/// Normalize a graph. Idempotent: `normalize(normalize(g)) == normalize(g)`.
pub fn normalize(graph: &Graph) -> Graph {
    let mut referenced: HashSet<&str> = HashSet::new();
    for edge in &graph.edges {
        referenced.insert(edge.source.as_str());
        referenced.insert(edge.target.as_str());
    }

    // A lone, edge-less node is a freshly authored playbook and survives
    // pruning; only prune orphans once the graph has grown edges.
    let should_prune_orphans = graph.nodes.len() >= 2 && !graph.edges.is_empty();

    let nodes: Vec<_> = graph
        .nodes
        .iter()
        .filter(|n| !should_prune_orphans || referenced.contains(n.id.as_str()))
        .cloned()
        .collect();

    let retained_ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();

    let edges: Vec<_> = graph
        .edges
        .iter()
        .filter(|e| {
            retained_ids.contains(e.source.as_str()) && retained_ids.contains(e.target.as_str())
        })
        .cloned()
        .collect();

    Graph { nodes, edges }
}
