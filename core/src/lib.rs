//! # Playbook Graph Versioning Core
//!
//! Models an automation playbook as a directed graph of typed steps,
//! persists immutable commits of that graph on named branches, and
//! reconciles divergent branches via a three-way merge with explicit
//! conflict reporting.
//!
//! ## Basic types
//!
//!   * [`model::Step`] / [`model::Graph`] -- a playbook's linear and
//!     visual representations.
//!   * [`model::Commit`] / [`model::Branch`] -- the versioned history
//!     built on top of a graph.
//!
//! ## Pure transforms
//!
//!   * [`mapper::to_graph`] / [`mapper::to_linear`] -- translate between
//!     a playbook's linear and graph forms.
//!   * [`validator::validate`] -- structural validation (cycles, entry
//!     points, branch completeness).
//!   * [`normalizer::normalize`] -- drop orphan nodes and dangling edges.
//!   * [`merge::merge_graphs`] -- the per-entity three-way merge.
//!
//! ## Storage and orchestration
//!
//! The Core consumes a [`store::CommitStore`] (read a commit by id, read
//! a branch's latest commit, append a commit) and exposes
//! [`orchestrator::Orchestrator::merge_branches`] as the one operation
//! that touches it: fetch two tips, resolve their
//! [`ancestor::AncestorResolver::find_common_ancestor`], run the pure
//! merge, and append a merge commit on success.
//!
//! Everything outside this crate -- request handling, authentication,
//! row-level authorization, background job execution, observability,
//! LLM usage accounting -- is an external collaborator, not part of the
//! Core.

pub mod ancestor;
pub mod mapper;
pub mod merge;
pub mod model;
pub mod normalizer;
pub mod orchestrator;
pub mod store;
pub mod validator;

#[cfg(test)]
mod test_support;

pub use ancestor::{AncestorError, AncestorResolver};
pub use mapper::{to_graph, to_linear};
pub use merge::{merge_graphs, Conflict, ConflictType, EntityKind, MergeOutcome, Resolution, ResolutionChoice};
pub use model::{Branch, BranchId, Commit, CommitId, Config, Graph, Node, Step, StepType};
pub use normalizer::normalize;
pub use orchestrator::{MergeBranchesError, MergeResult, Orchestrator};
pub use store::{AppendCommit, CommitStore, MemoryStore};
pub use validator::{validate, Issue, IssueCode, Severity, ValidationResult};
