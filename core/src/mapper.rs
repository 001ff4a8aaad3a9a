//! Translate an ordered step list to a node/edge graph and back,
//! preserving branch semantics (§4.1).

use std::collections::HashMap;

use crate::model::{Edge, EdgeLabel, Graph, Node, NodeData, Position, Step, StepType};

/// Number of columns in the cosmetic default grid layout.
const GRID_COLUMNS: i64 = 3;
const GRID_X_STEP: i64 = 300;
const GRID_Y_STEP: i64 = 200;
const GRID_ORIGIN: i64 = 100;

fn grid_position(index: usize) -> Position {
    let index = index as i64;
    Position {
        x: GRID_ORIGIN + (index % GRID_COLUMNS) * GRID_X_STEP,
        y: GRID_ORIGIN + (index / GRID_COLUMNS) * GRID_Y_STEP,
    }
}

/// Translate a linear playbook definition into its node/edge graph form.
pub fn to_graph(playbook: &[Step]) -> Graph {
    let mut nodes = Vec::with_capacity(playbook.len());
    let mut edges = Vec::new();

    for (i, step) in playbook.iter().enumerate() {
        let mut config = step.config.clone();
        if step.step_type == StepType::Branch {
            config.remove("trueStep");
            config.remove("falseStep");
        }
        nodes.push(Node {
            id: step.key.clone(),
            node_type: step.step_type,
            position: grid_position(i),
            data: NodeData {
                label: step.name.clone(),
                config,
            },
        });

        if let Some(next) = &step.next_step_key {
            edges.push(Edge {
                id: format!("{}-{}", step.key, next),
                source: step.key.clone(),
                target: next.clone(),
                label: None,
            });
        }

        if step.step_type == StepType::Branch {
            if let Some(true_target) = step.true_step() {
                edges.push(Edge {
                    id: format!("{}-true-{}", step.key, true_target),
                    source: step.key.clone(),
                    target: true_target.to_string(),
                    label: Some(EdgeLabel::True),
                });
            }
            if let Some(false_target) = step.false_step() {
                edges.push(Edge {
                    id: format!("{}-false-{}", step.key, false_target),
                    source: step.key.clone(),
                    target: false_target.to_string(),
                    label: Some(EdgeLabel::False),
                });
            }
        }
    }

    Graph { nodes, edges }
}

/// Translate a node/edge graph back into an ordered linear step list.
///
/// Node order in `graph.nodes` determines the emitted `position`; this is
/// the one field that need not round-trip against the original input
/// (see spec §4.1's round-trip law).
pub fn to_linear(graph: &Graph) -> Vec<Step> {
    let mut outgoing: HashMap<&str, Vec<&Edge>> = HashMap::new();
    for edge in &graph.edges {
        outgoing.entry(edge.source.as_str()).or_default().push(edge);
    }

    graph
        .nodes
        .iter()
        .enumerate()
        .map(|(position, node)| {
            let out = outgoing.get(node.id.as_str());

            if node.node_type == StepType::Branch {
                let mut config = node.data.config.clone();
                set_or_remove(
                    &mut config,
                    "trueStep",
                    find_labeled_target(out, EdgeLabel::True),
                );
                set_or_remove(
                    &mut config,
                    "falseStep",
                    find_labeled_target(out, EdgeLabel::False),
                );

                Step {
                    key: node.id.clone(),
                    name: node.data.label.clone(),
                    step_type: node.node_type,
                    config,
                    position: position as i64,
                    next_step_key: None,
                }
            } else {
                let next = out.and_then(|edges| edges.first()).map(|e| e.target.clone());

                Step {
                    key: node.id.clone(),
                    name: node.data.label.clone(),
                    step_type: node.node_type,
                    config: node.data.config.clone(),
                    position: position as i64,
                    next_step_key: next,
                }
            }
        })
        .collect()
}

fn find_labeled_target(out: Option<&Vec<&Edge>>, label: EdgeLabel) -> Option<String> {
    out.and_then(|edges| edges.iter().find(|e| e.label == Some(label)))
        .map(|e| e.target.clone())
}

fn set_or_remove(config: &mut crate::model::Config, key: &str, value: Option<String>) {
    match value {
        Some(v) => {
            config.insert(key.to_string(), serde_json::Value::String(v));
        }
        None => {
            config.remove(key);
        }
    }
}
