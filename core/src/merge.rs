//! Per-entity three-way reconciliation of base/ours/theirs graphs, with
//! optional resolution overrides (§4.5).
//!
//! Granularity is whole-node / whole-edge: field-level merging is never
//! performed. "Equal" means deep structural equality across all
//! semantically relevant fields, computed on a canonical encoding (sorted
//! mapping keys) so that storage round-trips of `config` do not produce
//! spurious conflicts. Node `position` is cosmetic and excluded from
//! equality, per spec §9's open question (c).

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;

use crate::model::{Config, Edge, EdgeLabel, Graph, Node, StepType};

/// Which kind of entity a [`Conflict`] or [`Resolution`] refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Node,
    Edge,
}

/// The shape of a merge conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictType {
    Add,
    Modify,
    Delete,
}

/// A single unresolved divergence between ours and theirs at one node or
/// edge. `ours`/`theirs` are raw entity snapshots; either is absent on
/// the corresponding delete side.
#[derive(Clone, Debug, PartialEq)]
pub struct Conflict {
    pub kind: EntityKind,
    pub id: String,
    pub conflict_type: ConflictType,
    pub ours: Option<Value>,
    pub theirs: Option<Value>,
}

impl Conflict {
    /// A human-readable one-liner, for logging or surfacing to a UI that
    /// doesn't want to build its own message from the structured fields.
    pub fn describe(&self) -> String {
        let kind = match self.kind {
            EntityKind::Node => "node",
            EntityKind::Edge => "edge",
        };
        let action = match self.conflict_type {
            ConflictType::Add => "both sides added",
            ConflictType::Modify => "both sides modified",
            ConflictType::Delete => "one side modified, the other deleted",
        };
        format!("{kind} '{}': {action}", self.id)
    }
}

/// Which side to prefer when resolving a conflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResolutionChoice {
    /// For add/modify conflicts: take ours. For delete conflicts:
    /// reinstate the surviving (modified) side.
    Ours,
    /// For add/modify conflicts: take theirs. For delete conflicts:
    /// accept the deletion.
    Theirs,
}

/// A caller-supplied override for one conflicting entity.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub kind: EntityKind,
    pub id: String,
    pub choice: ResolutionChoice,
}

/// The result of a three-way graph merge.
#[derive(Clone, Debug, PartialEq)]
pub struct MergeOutcome {
    pub success: bool,
    pub conflicts: Vec<Conflict>,
    pub merged_graph: Option<Graph>,
}

impl MergeOutcome {
    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    pub fn conflict_count(&self) -> usize {
        self.conflicts.len()
    }
}

/// Merge `ours` and `theirs` against their common `base`, applying any
/// caller-supplied `resolutions` to conflicts. Only populates
/// `merged_graph` when every node and every edge id in the union of the
/// three inputs resolved without a remaining conflict.
pub fn merge_graphs(
    base: &Graph,
    ours: &Graph,
    theirs: &Graph,
    resolutions: &[Resolution],
) -> MergeOutcome {
    let node_resolutions = index_resolutions(resolutions, EntityKind::Node);
    let edge_resolutions = index_resolutions(resolutions, EntityKind::Edge);

    let (nodes, mut conflicts) = merge_entities(
        EntityKind::Node,
        &by_id(&base.nodes, |n| n.id.clone()),
        &by_id(&ours.nodes, |n| n.id.clone()),
        &by_id(&theirs.nodes, |n| n.id.clone()),
        &node_resolutions,
    );

    let (edges, edge_conflicts) = merge_entities(
        EntityKind::Edge,
        &by_id(&base.edges, |e| e.id.clone()),
        &by_id(&ours.edges, |e| e.id.clone()),
        &by_id(&theirs.edges, |e| e.id.clone()),
        &edge_resolutions,
    );
    conflicts.extend(edge_conflicts);

    let success = conflicts.is_empty();
    let merged_graph = if success {
        Some(Graph { nodes, edges })
    } else {
        for conflict in &conflicts {
            log::debug!("unresolved merge conflict: {}", conflict.describe());
        }
        None
    };

    MergeOutcome {
        success,
        conflicts,
        merged_graph,
    }
}

fn by_id<T: Clone>(items: &[T], id: impl Fn(&T) -> String) -> HashMap<String, T> {
    items.iter().map(|item| (id(item), item.clone())).collect()
}

fn index_resolutions(
    resolutions: &[Resolution],
    kind: EntityKind,
) -> HashMap<String, ResolutionChoice> {
    resolutions
        .iter()
        .filter(|r| r.kind == kind)
        .map(|r| (r.id.clone(), r.choice))
        .collect()
}

/// An entity that can be deep-compared via a canonical encoding.
trait Entity: Clone + Serialize {
    fn canonical_key(&self) -> String;
}

impl Entity for Node {
    fn canonical_key(&self) -> String {
        #[derive(Serialize)]
        struct Comparable<'a> {
            node_type: StepType,
            label: &'a str,
            config: &'a Config,
        }
        canonical_string(&Comparable {
            node_type: self.node_type,
            label: &self.data.label,
            config: &self.data.config,
        })
    }
}

impl Entity for Edge {
    fn canonical_key(&self) -> String {
        #[derive(Serialize)]
        struct Comparable<'a> {
            source: &'a str,
            target: &'a str,
            label: Option<EdgeLabel>,
        }
        canonical_string(&Comparable {
            source: &self.source,
            target: &self.target,
            label: self.label,
        })
    }
}

/// Serialize a value and recursively sort object keys, so structurally
/// identical payloads compare equal regardless of field order.
fn canonical_string<T: Serialize>(value: &T) -> String {
    let value = serde_json::to_value(value).expect("merge entities always serialize");
    serde_json::to_string(&canonicalize(&value)).expect("canonical value always serializes")
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.iter().map(|(k, v)| (k.clone(), canonicalize(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

enum Decision {
    Keep(Side),
    Drop,
    Conflict(ConflictType),
}

#[derive(Clone, Copy)]
enum Side {
    Base,
    Ours,
    Theirs,
}

/// Apply spec §4.5's per-entity decision table to one id's base/ours/theirs
/// presence, given their precomputed canonical keys.
fn decide(
    base_key: Option<&str>,
    ours_key: Option<&str>,
    theirs_key: Option<&str>,
) -> Decision {
    match (base_key, ours_key, theirs_key) {
        (None, Some(_), None) => Decision::Keep(Side::Ours),
        (None, None, Some(_)) => Decision::Keep(Side::Theirs),
        (None, Some(o), Some(t)) => {
            if o == t {
                Decision::Keep(Side::Ours)
            } else {
                Decision::Conflict(ConflictType::Add)
            }
        }
        (Some(_), None, None) => Decision::Drop,
        (Some(b), Some(o), Some(t)) => {
            let ours_changed = o != b;
            let theirs_changed = t != b;
            match (ours_changed, theirs_changed) {
                (false, false) => Decision::Keep(Side::Base),
                (true, false) => Decision::Keep(Side::Ours),
                (false, true) => Decision::Keep(Side::Theirs),
                (true, true) => {
                    if o == t {
                        Decision::Keep(Side::Ours)
                    } else {
                        Decision::Conflict(ConflictType::Modify)
                    }
                }
            }
        }
        (Some(b), Some(o), None) => {
            if o == b {
                Decision::Drop
            } else {
                Decision::Conflict(ConflictType::Delete)
            }
        }
        (Some(b), None, Some(t)) => {
            if t == b {
                Decision::Drop
            } else {
                Decision::Conflict(ConflictType::Delete)
            }
        }
        (None, None, None) => Decision::Drop,
    }
}

fn merge_entities<T: Entity>(
    kind: EntityKind,
    base: &HashMap<String, T>,
    ours: &HashMap<String, T>,
    theirs: &HashMap<String, T>,
    resolutions: &HashMap<String, ResolutionChoice>,
) -> (Vec<T>, Vec<Conflict>) {
    let mut ids: Vec<&String> = base.keys().chain(ours.keys()).chain(theirs.keys()).collect();
    ids.sort();
    ids.dedup();

    // Precompute each entity's canonical key once, per spec §5's note
    // that an entity may otherwise be re-canonicalized up to three times.
    let keys_for = |map: &HashMap<String, T>| -> HashMap<&str, String> {
        map.iter()
            .map(|(id, entity)| (id.as_str(), entity.canonical_key()))
            .collect()
    };
    let base_keys = keys_for(base);
    let ours_keys = keys_for(ours);
    let theirs_keys = keys_for(theirs);

    let mut merged = Vec::new();
    let mut conflicts = Vec::new();

    for id in ids {
        let b = base.get(id);
        let o = ours.get(id);
        let t = theirs.get(id);

        let decision = decide(
            base_keys.get(id.as_str()).map(String::as_str),
            ours_keys.get(id.as_str()).map(String::as_str),
            theirs_keys.get(id.as_str()).map(String::as_str),
        );

        match decision {
            Decision::Keep(Side::Base) => merged.push(b.cloned().expect("base present")),
            Decision::Keep(Side::Ours) => merged.push(o.cloned().expect("ours present")),
            Decision::Keep(Side::Theirs) => merged.push(t.cloned().expect("theirs present")),
            Decision::Drop => {}
            Decision::Conflict(conflict_type) => {
                if let Some(choice) = resolutions.get(id) {
                    apply_resolution(conflict_type, *choice, o, t, &mut merged);
                } else {
                    conflicts.push(Conflict {
                        kind,
                        id: id.clone(),
                        conflict_type,
                        ours: o.map(to_value),
                        theirs: t.map(to_value),
                    });
                }
            }
        }
    }

    (merged, conflicts)
}

fn apply_resolution<T: Clone>(
    conflict_type: ConflictType,
    choice: ResolutionChoice,
    ours: Option<&T>,
    theirs: Option<&T>,
    merged: &mut Vec<T>,
) {
    match conflict_type {
        ConflictType::Add | ConflictType::Modify => match choice {
            ResolutionChoice::Ours => merged.extend(ours.cloned()),
            ResolutionChoice::Theirs => merged.extend(theirs.cloned()),
        },
        ConflictType::Delete => match choice {
            // Reinstate whichever side survived (the one that's Some).
            ResolutionChoice::Ours => merged.extend(ours.or(theirs).cloned()),
            ResolutionChoice::Theirs => {}
        },
    }
}

fn to_value<T: Serialize>(entity: &T) -> Value {
    serde_json::to_value(entity).expect("merge entities always serialize")
}
