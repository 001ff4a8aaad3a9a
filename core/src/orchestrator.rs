//! `mergeBranches`: a short coordination pipeline over the pure Merger
//! and the Commit Store Adapter (§4.5, §5, §9).
//!
//! Fetch the two tips → fetch their common ancestor → run the pure merge
//! → on success, append a merge commit to the target branch. No hidden
//! global state; every step is a plain function over the store.

use thiserror::Error;

use crate::ancestor::{AncestorError, AncestorResolver};
use crate::mapper;
use crate::merge::{merge_graphs, Conflict, Resolution};
use crate::model::{BranchId, Commit, CommitId, Graph};
use crate::store::{AppendCommit, CommitStore};

/// The outcome of a `mergeBranches` call. Conflicts are data, not an
/// error (§6, §7 policy 3); only precondition and store failures are
/// errors (see [`MergeBranchesError`]).
#[derive(Clone, Debug, PartialEq)]
pub struct MergeResult {
    pub success: bool,
    pub conflicts: Vec<Conflict>,
    pub merged_graph: Option<Graph>,
    pub merge_commit_id: Option<CommitId>,
}

/// Fatal, up-front failures of `mergeBranches` (§6). Unresolved conflicts
/// are never represented here.
#[derive(Debug, Error)]
pub enum MergeBranchesError<E> {
    #[error("commit store error: {0}")]
    Store(#[source] E),
    #[error("target branch '{0}' does not exist")]
    MissingTargetBranch(BranchId),
    #[error("branch '{branch}' has no commits")]
    MissingTip { branch: BranchId },
    #[error("branches '{source}' and '{target}' share no common ancestor")]
    UnrelatedBranches { source: BranchId, target: BranchId },
    #[error("ancestor commit '{0}' is missing from the store")]
    MissingAncestorCommit(CommitId),
    #[error("merge was cancelled before any commit was appended")]
    Cancelled,
}

impl<E> From<AncestorError<E>> for MergeBranchesError<E> {
    fn from(err: AncestorError<E>) -> Self {
        match err {
            AncestorError::Store(e) => MergeBranchesError::Store(e),
            AncestorError::MissingCommit(id) => MergeBranchesError::MissingAncestorCommit(id),
            AncestorError::DepthExceeded(id, _) => MergeBranchesError::MissingAncestorCommit(id),
        }
    }
}

/// A cooperative cancellation signal, checked between I/O steps. No
/// commit is appended once cancellation is observed.
pub trait Cancellation {
    fn is_cancelled(&self) -> bool;
}

/// Never cancels; the default when a caller has no cancellation signal.
pub struct NeverCancel;

impl Cancellation for NeverCancel {
    fn is_cancelled(&self) -> bool {
        false
    }
}

/// Coordinates `mergeBranches` over a [`CommitStore`].
pub struct Orchestrator<'s, S> {
    store: &'s S,
}

impl<'s, S: CommitStore> Orchestrator<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self { store }
    }

    /// Reconcile `source_branch` into `target_branch`, appending a merge
    /// commit to `target_branch` on success.
    pub fn merge_branches(
        &self,
        source_branch: &BranchId,
        target_branch: &BranchId,
        user_id: &str,
        message: Option<&str>,
        resolutions: &[Resolution],
    ) -> Result<MergeResult, MergeBranchesError<S::Error>> {
        self.merge_branches_cancellable(
            source_branch,
            target_branch,
            user_id,
            message,
            resolutions,
            &NeverCancel,
        )
    }

    /// As [`Self::merge_branches`], but aborts between I/O steps if
    /// `cancel` reports cancellation, leaving no partial side effects.
    pub fn merge_branches_cancellable(
        &self,
        source_branch: &BranchId,
        target_branch: &BranchId,
        user_id: &str,
        message: Option<&str>,
        resolutions: &[Resolution],
        cancel: &dyn Cancellation,
    ) -> Result<MergeResult, MergeBranchesError<S::Error>> {
        log::info!(
            "merging branch '{}' into '{}'",
            source_branch,
            target_branch
        );

        if self
            .store
            .get_branch(target_branch)
            .map_err(MergeBranchesError::Store)?
            .is_none()
        {
            return Err(MergeBranchesError::MissingTargetBranch(target_branch.clone()));
        }

        let ours_tip = self.fetch_tip(target_branch)?;
        if cancel.is_cancelled() {
            return Err(MergeBranchesError::Cancelled);
        }
        let theirs_tip = self.fetch_tip(source_branch)?;
        if cancel.is_cancelled() {
            return Err(MergeBranchesError::Cancelled);
        }

        let resolver = AncestorResolver::new(self.store);
        let base_id = resolver
            .find_common_ancestor(&ours_tip.id, &theirs_tip.id)?
            .ok_or_else(|| MergeBranchesError::UnrelatedBranches {
                source: source_branch.clone(),
                target: target_branch.clone(),
            })?;
        if cancel.is_cancelled() {
            return Err(MergeBranchesError::Cancelled);
        }

        let base_commit = self
            .store
            .get_commit(&base_id)
            .map_err(MergeBranchesError::Store)?
            .ok_or_else(|| MergeBranchesError::MissingAncestorCommit(base_id.clone()))?;

        let outcome = merge_graphs(
            &base_commit.graph,
            &ours_tip.graph,
            &theirs_tip.graph,
            resolutions,
        );

        if !outcome.success {
            log::info!(
                "merge of '{}' into '{}' produced {} unresolved conflict(s)",
                source_branch,
                target_branch,
                outcome.conflicts.len()
            );
            return Ok(MergeResult {
                success: false,
                conflicts: outcome.conflicts,
                merged_graph: None,
                merge_commit_id: None,
            });
        }

        if cancel.is_cancelled() {
            return Err(MergeBranchesError::Cancelled);
        }

        let merged_graph = outcome.merged_graph.expect("success implies a merged graph");
        let playbook_json = mapper::to_linear(&merged_graph);

        let commit = self
            .store
            .append_commit(AppendCommit {
                branch_id: target_branch.clone(),
                graph: merged_graph.clone(),
                playbook_json,
                message: message.unwrap_or("merge").to_string(),
                created_by: user_id.to_string(),
                merge_parent_commit_id: Some(theirs_tip.id.clone()),
            })
            .map_err(MergeBranchesError::Store)?;

        log::info!("appended merge commit '{}' to '{}'", commit.id, target_branch);

        Ok(MergeResult {
            success: true,
            conflicts: Vec::new(),
            merged_graph: Some(merged_graph),
            merge_commit_id: Some(commit.id),
        })
    }

    fn fetch_tip(&self, branch: &BranchId) -> Result<Commit, MergeBranchesError<S::Error>> {
        self.store
            .get_latest_commit(branch)
            .map_err(MergeBranchesError::Store)?
            .ok_or_else(|| MergeBranchesError::MissingTip {
                branch: branch.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Branch, BranchId, Edge, Node, NodeData, Position, StepType};
    use crate::store::MemoryStore;

    fn node(id: &str, label: &str) -> Node {
        Node {
            id: id.to_string(),
            node_type: StepType::Agent,
            position: Position { x: 0, y: 0 },
            data: NodeData {
                label: label.to_string(),
                config: Default::default(),
            },
        }
    }

    fn edge(id: &str, source: &str, target: &str) -> Edge {
        Edge {
            id: id.to_string(),
            source: source.to_string(),
            target: target.to_string(),
            label: None,
        }
    }

    fn setup() -> (MemoryStore, BranchId, BranchId) {
        let store = MemoryStore::new();
        let feature = BranchId::from("feature");
        let main = BranchId::from("main");
        store.create_branch(Branch {
            id: main.clone(),
            playbook_id: "pb".to_string(),
            org_id: "org".to_string(),
        });
        store.create_branch(Branch {
            id: feature.clone(),
            playbook_id: "pb".to_string(),
            org_id: "org".to_string(),
        });

        let base_graph = Graph {
            nodes: vec![node("n1", "N1")],
            edges: vec![],
        };
        let base = store
            .append_commit(AppendCommit {
                branch_id: main.clone(),
                graph: base_graph.clone(),
                playbook_json: mapper::to_linear(&base_graph),
                message: "base".to_string(),
                created_by: "alice".to_string(),
                merge_parent_commit_id: None,
            })
            .unwrap();

        // feature branches off the same commit main is sitting on, so the
        // two tips share `base` as a real common ancestor rather than each
        // carrying their own equal-but-distinct copy of it.
        store.set_tip(feature.clone(), base.id.clone());

        (store, feature, main)
    }

    #[test]
    fn clean_merge_appends_a_merge_commit_to_target() {
        let (store, feature, main) = setup();

        let ours_graph = Graph {
            nodes: vec![node("n1", "N1"), node("n2", "N2")],
            edges: vec![edge("n1-n2", "n1", "n2")],
        };
        store
            .append_commit(AppendCommit {
                branch_id: main.clone(),
                graph: ours_graph.clone(),
                playbook_json: mapper::to_linear(&ours_graph),
                message: "add n2".to_string(),
                created_by: "alice".to_string(),
                merge_parent_commit_id: None,
            })
            .unwrap();

        let theirs_graph = Graph {
            nodes: vec![node("n1", "N1"), node("n3", "N3")],
            edges: vec![edge("n1-n3", "n1", "n3")],
        };
        store
            .append_commit(AppendCommit {
                branch_id: feature.clone(),
                graph: theirs_graph.clone(),
                playbook_json: mapper::to_linear(&theirs_graph),
                message: "add n3".to_string(),
                created_by: "bob".to_string(),
                merge_parent_commit_id: None,
            })
            .unwrap();

        let orchestrator = Orchestrator::new(&store);
        let result = orchestrator
            .merge_branches(&feature, &main, "carol", Some("merge feature"), &[])
            .unwrap();

        assert!(result.success);
        assert!(result.merge_commit_id.is_some());
        let merged = result.merged_graph.unwrap();
        assert_eq!(merged.nodes.len(), 3);

        let new_tip = store.get_latest_commit(&main).unwrap().unwrap();
        assert_eq!(new_tip.id, result.merge_commit_id.unwrap());
        assert!(new_tip.merge_parent_commit_id.is_some());
    }

    #[test]
    fn missing_target_branch_is_a_fatal_error() {
        let store = MemoryStore::new();
        let orchestrator = Orchestrator::new(&store);
        let result = orchestrator.merge_branches(
            &BranchId::from("feature"),
            &BranchId::from("ghost"),
            "carol",
            None,
            &[],
        );
        assert!(matches!(
            result,
            Err(MergeBranchesError::MissingTargetBranch(_))
        ));
    }

    #[test]
    fn unrelated_branches_are_a_fatal_error() {
        let store = MemoryStore::new();
        let a = BranchId::from("a");
        let b = BranchId::from("b");
        store.create_branch(Branch {
            id: a.clone(),
            playbook_id: "pb-a".to_string(),
            org_id: "org".to_string(),
        });
        store.create_branch(Branch {
            id: b.clone(),
            playbook_id: "pb-b".to_string(),
            org_id: "org".to_string(),
        });
        store
            .append_commit(AppendCommit {
                branch_id: a.clone(),
                graph: Graph::new(),
                playbook_json: vec![],
                message: "a".to_string(),
                created_by: "alice".to_string(),
                merge_parent_commit_id: None,
            })
            .unwrap();
        store
            .append_commit(AppendCommit {
                branch_id: b.clone(),
                graph: Graph::new(),
                playbook_json: vec![],
                message: "b".to_string(),
                created_by: "alice".to_string(),
                merge_parent_commit_id: None,
            })
            .unwrap();

        let orchestrator = Orchestrator::new(&store);
        let result = orchestrator.merge_branches(&a, &b, "carol", None, &[]);
        assert!(matches!(
            result,
            Err(MergeBranchesError::UnrelatedBranches { .. })
        ));
    }

    struct AlreadyCancelled;
    impl Cancellation for AlreadyCancelled {
        fn is_cancelled(&self) -> bool {
            true
        }
    }

    #[test]
    fn cancellation_leaves_no_partial_commit() {
        let (store, feature, main) = setup();
        let orchestrator = Orchestrator::new(&store);

        let before = store.get_latest_commit(&main).unwrap().unwrap();
        let result = orchestrator.merge_branches_cancellable(
            &feature,
            &main,
            "carol",
            None,
            &[],
            &AlreadyCancelled,
        );
        assert!(matches!(result, Err(MergeBranchesError::Cancelled)));
        let after = store.get_latest_commit(&main).unwrap().unwrap();
        assert_eq!(before.id, after.id);
    }
}
