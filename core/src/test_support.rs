//! Generators shared by the property tests in [`crate::tests`].

use qcheck::Arbitrary;

use crate::model::{Config, Edge, Graph, Node, NodeData, Position, Step, StepType};

/// A linear playbook guaranteed to satisfy invariants I1-I7: unique keys,
/// at most one successor per non-branch step, and branch steps whose
/// `trueStep`/`falseStep` only ever point forward (so the derived graph
/// is acyclic and has a single entry point).
#[derive(Clone, Debug)]
pub struct ValidPlaybook(pub Vec<Step>);

impl Arbitrary for ValidPlaybook {
    fn arbitrary(g: &mut qcheck::Gen) -> Self {
        let rng = fastrand::Rng::with_seed(u64::arbitrary(g));
        let len = rng.usize(1..8);
        let keys: Vec<String> = (0..len).map(|i| format!("s{i}")).collect();

        let mut steps = Vec::with_capacity(len);
        for (i, key) in keys.iter().enumerate() {
            let is_last = i + 1 == len;
            let branch_eligible = !is_last && rng.bool();

            if branch_eligible {
                let next = keys[i + 1].clone();
                let mut config = Config::new();
                config.insert("trueStep".to_string(), serde_json::Value::String(next.clone()));
                config.insert("falseStep".to_string(), serde_json::Value::String(next));
                steps.push(Step {
                    key: key.clone(),
                    name: format!("step {i}"),
                    step_type: StepType::Branch,
                    config,
                    position: i as i64,
                    next_step_key: None,
                });
            } else {
                let next = if is_last { None } else { Some(keys[i + 1].clone()) };
                let step_type = match rng.usize(0..3) {
                    0 => StepType::Agent,
                    1 => StepType::Data,
                    _ => StepType::Api,
                };
                steps.push(Step {
                    key: key.clone(),
                    name: format!("step {i}"),
                    step_type,
                    config: Config::new(),
                    position: i as i64,
                    next_step_key: next,
                });
            }
        }

        ValidPlaybook(steps)
    }
}

/// A graph guaranteed to contain at least one directed cycle: a ring of
/// `n` nodes, plus an acyclic tail hanging off one of them so cycles
/// aren't always the entire graph.
#[derive(Clone, Debug)]
pub struct CyclicGraph(pub Graph);

impl Arbitrary for CyclicGraph {
    fn arbitrary(g: &mut qcheck::Gen) -> Self {
        let rng = fastrand::Rng::with_seed(u64::arbitrary(g));
        let ring_len = rng.usize(2..6);

        let mut nodes = Vec::new();
        let mut edges = Vec::new();

        for i in 0..ring_len {
            let id = format!("r{i}");
            nodes.push(Node {
                id: id.clone(),
                node_type: StepType::Agent,
                position: Position { x: 0, y: 0 },
                data: NodeData {
                    label: id,
                    config: Config::new(),
                },
            });
        }
        for i in 0..ring_len {
            let from = format!("r{i}");
            let to = format!("r{}", (i + 1) % ring_len);
            edges.push(Edge {
                id: format!("{from}-{to}"),
                source: from,
                target: to,
                label: None,
            });
        }

        if rng.bool() {
            let tail_id = "tail".to_string();
            nodes.push(Node {
                id: tail_id.clone(),
                node_type: StepType::Agent,
                position: Position { x: 0, y: 0 },
                data: NodeData {
                    label: tail_id.clone(),
                    config: Config::new(),
                },
            });
            edges.push(Edge {
                id: format!("r0-{tail_id}"),
                source: "r0".to_string(),
                target: tail_id,
                label: None,
            });
        }

        CyclicGraph(Graph { nodes, edges })
    }
}
