//! Data shapes for steps, graphs, commits, and branches.
//!
//! These are value objects: constructed once, never mutated in place. The
//! [`Mapper`](crate::mapper), [`Validator`](crate::validator),
//! [`Normalizer`](crate::normalizer) and [`Merger`](crate::merge) all take
//! and return owned values of these types rather than references into
//! shared mutable state.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An opaque, type-dependent configuration payload. Carried verbatim by
/// the Core; only the surrounding service interprets its contents.
pub type Config = serde_json::Map<String, serde_json::Value>;

/// Seconds since the Unix epoch.
pub type Timestamp = u64;

/// The kind of a step or node. Determines how `config` and successor
/// fields are interpreted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StepType {
    Agent,
    Data,
    Branch,
    Api,
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepType::Agent => "AGENT",
            StepType::Data => "DATA",
            StepType::Branch => "BRANCH",
            StepType::Api => "API",
        };
        f.write_str(s)
    }
}

/// A unit of a playbook in its linear (ordered list) form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Stable identifier, unique within a playbook.
    pub key: String,
    /// Display label.
    pub name: String,
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Opaque, type-dependent payload.
    #[serde(default)]
    pub config: Config,
    /// Authoring order; not semantically significant on its own.
    pub position: i64,
    /// Default successor. Must be absent for `BRANCH` steps, which encode
    /// their successors in `config.trueStep` / `config.falseStep` instead.
    #[serde(rename = "nextStepKey", skip_serializing_if = "Option::is_none", default)]
    pub next_step_key: Option<String>,
}

impl Step {
    /// Read `config.trueStep` for a `BRANCH` step.
    pub fn true_step(&self) -> Option<&str> {
        self.config.get("trueStep").and_then(|v| v.as_str())
    }

    /// Read `config.falseStep` for a `BRANCH` step.
    pub fn false_step(&self) -> Option<&str> {
        self.config.get("falseStep").and_then(|v| v.as_str())
    }
}

/// 2-D coordinates for UI placement only; never semantically significant.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

/// The label distinguishing a `BRANCH` node's two outgoing edges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeLabel {
    True,
    False,
}

impl EdgeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeLabel::True => "true",
            EdgeLabel::False => "false",
        }
    }
}

/// Payload carried by a node, mirroring a step's display fields.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub label: String,
    #[serde(default)]
    pub config: Config,
}

/// A node in the visual graph form. `id` equals the source step's `key`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: StepType,
    pub position: Position,
    pub data: NodeData,
}

/// An edge in the visual graph form.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub label: Option<EdgeLabel>,
}

/// A node/edge graph: the visual representation of a playbook.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a node by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Edges whose `source` is the given node id, in their stored order.
    pub fn outgoing(&self, id: &str) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.source == id)
    }

    /// Edges whose `target` is the given node id.
    pub fn incoming(&self, id: &str) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.target == id)
    }

    /// Render the graph in Graphviz "dot" format, for debugging.
    pub fn to_dot(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        writeln!(out, "digraph G {{").ok();
        for n in &self.nodes {
            writeln!(out, "\t\"{}\" [label=\"{}\"];", n.id, n.data.label).ok();
        }
        for e in &self.edges {
            match e.label {
                Some(label) => {
                    writeln!(out, "\t\"{}\" -> \"{}\" [label=\"{}\"];", e.source, e.target, label.as_str()).ok()
                }
                None => writeln!(out, "\t\"{}\" -> \"{}\";", e.source, e.target).ok(),
            };
        }
        writeln!(out, "}}").ok();
        out
    }
}

/// A content-addressed commit identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CommitId(pub String);

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for CommitId {
    fn from(s: String) -> Self {
        CommitId(s)
    }
}

impl From<&str> for CommitId {
    fn from(s: &str) -> Self {
        CommitId(s.to_string())
    }
}

/// A named, append-only pointer into a playbook's commit history.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BranchId(pub String);

impl fmt::Display for BranchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for BranchId {
    fn from(s: String) -> Self {
        BranchId(s)
    }
}

impl From<&str> for BranchId {
    fn from(s: &str) -> Self {
        BranchId(s.to_string())
    }
}

/// An immutable snapshot of a playbook's graph, plus provenance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Commit {
    pub id: CommitId,
    pub playbook_id: String,
    pub org_id: String,
    pub branch_id: BranchId,
    /// Monotonic per branch, starting at 1.
    pub version: u64,
    pub graph: Graph,
    pub playbook_json: Vec<Step>,
    pub message: String,
    /// The previous commit on the same branch; absent for the first commit.
    pub parent_commit_id: Option<CommitId>,
    /// Present only on merge commits; points into the *source* branch.
    pub merge_parent_commit_id: Option<CommitId>,
    pub created_by: String,
    pub created_at: Timestamp,
}

/// A named pointer to the tip of a playbook's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: BranchId,
    pub playbook_id: String,
    pub org_id: String,
}
