//! Structural validation: entry uniqueness, reachability, cycles, branch
//! completeness, edge integrity.
//!
//! The Validator never throws; it always returns data (§7 policy 1). A
//! graph failing validation is simply a graph a caller should not persist.

use std::collections::{HashMap, HashSet};

use crate::model::{Graph, StepType};

/// Machine-readable classification of a validation finding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IssueCode {
    EmptyGraph,
    DuplicateKeys,
    NoEntryPoint,
    MultipleEntryPoints,
    OrphanedNodes,
    CyclicGraph,
    InvalidEdges,
    IncompleteBranch,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::EmptyGraph => "EMPTY_GRAPH",
            IssueCode::DuplicateKeys => "DUPLICATE_KEYS",
            IssueCode::NoEntryPoint => "NO_ENTRY_POINT",
            IssueCode::MultipleEntryPoints => "MULTIPLE_ENTRY_POINTS",
            IssueCode::OrphanedNodes => "ORPHANED_NODES",
            IssueCode::CyclicGraph => "CYCLIC_GRAPH",
            IssueCode::InvalidEdges => "INVALID_EDGES",
            IssueCode::IncompleteBranch => "INCOMPLETE_BRANCH",
        }
    }
}

/// Whether an issue invalidates the graph or merely warrants attention.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single structured validation finding.
#[derive(Clone, Debug, PartialEq)]
pub struct Issue {
    pub code: IssueCode,
    pub message: String,
    pub severity: Severity,
}

/// The outcome of validating a graph.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub issues: Vec<Issue>,
}

/// Validate a graph's structure. See module docs and spec §4.2 for the
/// full rule table.
pub fn validate(graph: &Graph) -> ValidationResult {
    let mut issues = Vec::new();

    if graph.nodes.is_empty() {
        issues.push(Issue {
            code: IssueCode::EmptyGraph,
            message: "the graph has no nodes".to_string(),
            severity: Severity::Error,
        });
        return finish(issues);
    }

    let mut seen = HashSet::new();
    let mut duplicates = Vec::new();
    for node in &graph.nodes {
        if !seen.insert(node.id.as_str()) {
            duplicates.push(node.id.clone());
        }
    }
    if !duplicates.is_empty() {
        issues.push(Issue {
            code: IssueCode::DuplicateKeys,
            message: format!("duplicate node ids: {}", duplicates.join(", ")),
            severity: Severity::Error,
        });
    }

    let node_ids: HashSet<&str> = graph.nodes.iter().map(|n| n.id.as_str()).collect();

    let mut invalid_edges = Vec::new();
    for edge in &graph.edges {
        if !node_ids.contains(edge.source.as_str()) || !node_ids.contains(edge.target.as_str()) {
            invalid_edges.push(edge.id.clone());
        }
    }
    if !invalid_edges.is_empty() {
        issues.push(Issue {
            code: IssueCode::InvalidEdges,
            message: format!("edges with unknown endpoints: {}", invalid_edges.join(", ")),
            severity: Severity::Error,
        });
    }

    let mut targets: HashSet<&str> = HashSet::new();
    let mut referenced: HashSet<&str> = HashSet::new();
    for edge in &graph.edges {
        targets.insert(edge.target.as_str());
        referenced.insert(edge.source.as_str());
        referenced.insert(edge.target.as_str());
    }

    let entries: Vec<&str> = graph
        .nodes
        .iter()
        .map(|n| n.id.as_str())
        .filter(|id| !targets.contains(id))
        .collect();
    match entries.len() {
        0 => issues.push(Issue {
            code: IssueCode::NoEntryPoint,
            message: "no node without an incoming edge was found".to_string(),
            severity: Severity::Error,
        }),
        1 => {}
        _ => issues.push(Issue {
            code: IssueCode::MultipleEntryPoints,
            message: format!("multiple entry points: {}", entries.join(", ")),
            severity: Severity::Error,
        }),
    }

    if graph.nodes.len() >= 2 {
        let orphans: Vec<&str> = graph
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| !referenced.contains(id))
            .collect();
        if !orphans.is_empty() {
            issues.push(Issue {
                code: IssueCode::OrphanedNodes,
                message: format!("orphaned nodes: {}", orphans.join(", ")),
                severity: Severity::Error,
            });
        }
    }

    if let Some(cycle) = find_cycle(graph, &node_ids) {
        issues.push(Issue {
            code: IssueCode::CyclicGraph,
            message: format!("cycle detected through: {}", cycle.join(" -> ")),
            severity: Severity::Error,
        });
    }

    for node in &graph.nodes {
        if node.node_type != StepType::Branch {
            continue;
        }
        let has_true = graph
            .outgoing(&node.id)
            .any(|e| e.label == Some(crate::model::EdgeLabel::True));
        let has_false = graph
            .outgoing(&node.id)
            .any(|e| e.label == Some(crate::model::EdgeLabel::False));
        if !has_true || !has_false {
            issues.push(Issue {
                code: IssueCode::IncompleteBranch,
                message: format!("branch node '{}' is missing a true or false edge", node.id),
                severity: Severity::Warning,
            });
        }
    }

    finish(issues)
}

fn finish(issues: Vec<Issue>) -> ValidationResult {
    let valid = !issues.iter().any(|i| i.severity == Severity::Error);
    let errors = issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .map(|i| i.message.clone())
        .collect();
    ValidationResult {
        valid,
        errors,
        issues,
    }
}

/// Iterative DFS cycle detection with an explicit frame stack (no
/// recursion, so an arbitrarily long valid chain cannot overflow the call
/// stack), restarting from every unvisited node so all weakly connected
/// components are covered. Returns the first back-edge cycle found, as a
/// path.
fn find_cycle(graph: &Graph, node_ids: &HashSet<&str>) -> Option<Vec<String>> {
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in &graph.edges {
        if node_ids.contains(edge.source.as_str()) && node_ids.contains(edge.target.as_str()) {
            adjacency
                .entry(edge.source.as_str())
                .or_default()
                .push(edge.target.as_str());
        }
    }

    let mut visited: HashSet<&str> = HashSet::new();

    for node in &graph.nodes {
        let id = node.id.as_str();
        if visited.contains(id) {
            continue;
        }
        if let Some(cycle) = dfs_iterative(id, &adjacency, &mut visited) {
            return Some(cycle.into_iter().map(String::from).collect());
        }
    }
    None
}

/// Walks from `start` using an explicit stack of `(node, next neighbour
/// index)` frames, the standard iterative rewrite of recursive DFS.
fn dfs_iterative<'a>(
    start: &'a str,
    adjacency: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
) -> Option<Vec<&'a str>> {
    let mut on_stack: HashSet<&str> = HashSet::new();
    let mut frames: Vec<(&str, usize)> = vec![(start, 0)];

    visited.insert(start);
    on_stack.insert(start);

    while let Some(&mut (node, ref mut next_index)) = frames.last_mut() {
        let neighbour = adjacency.get(node).and_then(|ns| ns.get(*next_index)).copied();
        match neighbour {
            Some(next) => {
                *next_index += 1;
                if on_stack.contains(next) {
                    let start_pos = frames.iter().position(|&(n, _)| n == next).unwrap_or(0);
                    let mut cycle: Vec<&str> = frames[start_pos..].iter().map(|&(n, _)| n).collect();
                    cycle.push(next);
                    return Some(cycle);
                }
                if visited.insert(next) {
                    on_stack.insert(next);
                    frames.push((next, 0));
                }
            }
            None => {
                on_stack.remove(node);
                frames.pop();
            }
        }
    }
    None
}
