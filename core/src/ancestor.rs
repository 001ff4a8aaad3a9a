//! Walk parent pointers to find the lowest common ancestor of two
//! commits (§4.4).
//!
//! The walk follows only the primary parent pointer; merge parents are
//! ignored, since merge commits belong to the target branch's history and
//! their source-side lineage is only a tag, not a re-walkable edge. This
//! is a first-parent LCA, which is the intended definition here.

use std::collections::HashSet;

use thiserror::Error;

use crate::model::CommitId;
use crate::store::CommitStore;

/// Defensive bound on ancestor-chain depth. Commits form a DAG by
/// construction, so an infinite loop should be unreachable, but a store
/// bug or data corruption should fail loudly rather than spin forever.
pub const MAX_ANCESTOR_DEPTH: usize = 100_000;

/// Errors surfaced while walking ancestor chains.
#[derive(Debug, Error)]
pub enum AncestorError<E> {
    #[error("commit store error: {0}")]
    Store(#[source] E),
    #[error("commit '{0}' was not found while walking ancestors")]
    MissingCommit(CommitId),
    #[error("ancestor chain from '{0}' exceeded the maximum depth of {1}")]
    DepthExceeded(CommitId, usize),
}

/// Walks a commit store's parent pointers to find common ancestors.
pub struct AncestorResolver<'s, S> {
    store: &'s S,
    max_depth: usize,
}

impl<'s, S: CommitStore> AncestorResolver<'s, S> {
    pub fn new(store: &'s S) -> Self {
        Self {
            store,
            max_depth: MAX_ANCESTOR_DEPTH,
        }
    }

    /// Create a resolver with a custom traversal-depth cap.
    pub fn with_max_depth(store: &'s S, max_depth: usize) -> Self {
        Self { store, max_depth }
    }

    /// Find the most recent commit reachable from both `a` and `b` via
    /// first-parent chains, or `None` if the two histories are unrelated.
    pub fn find_common_ancestor(
        &self,
        a: &CommitId,
        b: &CommitId,
    ) -> Result<Option<CommitId>, AncestorError<S::Error>> {
        let chain_a = self.first_parent_chain(a)?;
        let chain_b: HashSet<CommitId> = self.first_parent_chain(b)?.into_iter().collect();

        Ok(chain_a.into_iter().find(|id| chain_b.contains(id)))
    }

    /// The chain of ancestors for `start`, including `start` itself,
    /// ordered from most to least recent.
    fn first_parent_chain(&self, start: &CommitId) -> Result<Vec<CommitId>, AncestorError<S::Error>> {
        let mut chain = Vec::new();
        let mut current = Some(start.clone());

        while let Some(id) = current {
            if chain.len() >= self.max_depth {
                return Err(AncestorError::DepthExceeded(start.clone(), self.max_depth));
            }
            let commit = self
                .store
                .get_commit(&id)
                .map_err(AncestorError::Store)?
                .ok_or_else(|| AncestorError::MissingCommit(id.clone()))?;
            log::trace!("walked ancestor '{}' (version {})", commit.id, commit.version);
            chain.push(commit.id.clone());
            current = commit.parent_commit_id;
        }

        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Branch, BranchId, Graph};
    use crate::store::{AppendCommit, MemoryStore};

    fn linear_history(n: usize) -> (MemoryStore, Vec<CommitId>) {
        let store = MemoryStore::new();
        store.create_branch(Branch {
            id: BranchId::from("main"),
            playbook_id: "pb".to_string(),
            org_id: "org".to_string(),
        });

        let mut ids = Vec::new();
        for i in 0..n {
            let commit = store
                .append_commit(AppendCommit {
                    branch_id: BranchId::from("main"),
                    graph: Graph::new(),
                    playbook_json: vec![],
                    message: format!("commit {i}"),
                    created_by: "alice".to_string(),
                    merge_parent_commit_id: None,
                })
                .unwrap();
            ids.push(commit.id);
        }
        (store, ids)
    }

    #[test]
    fn property_7_linear_history_ancestor_is_the_earlier_commit() {
        let (store, ids) = linear_history(5);
        let resolver = AncestorResolver::new(&store);

        for i in 0..ids.len() {
            for j in 0..ids.len() {
                let expected = ids[i.min(j)].clone();
                let found = resolver
                    .find_common_ancestor(&ids[i], &ids[j])
                    .unwrap()
                    .unwrap();
                assert_eq!(found, expected, "lca({i}, {j})");
            }
        }
    }

    #[test]
    fn unrelated_histories_have_no_common_ancestor() {
        let store = MemoryStore::new();
        store.create_branch(Branch {
            id: BranchId::from("a"),
            playbook_id: "pb-a".to_string(),
            org_id: "org".to_string(),
        });
        store.create_branch(Branch {
            id: BranchId::from("b"),
            playbook_id: "pb-b".to_string(),
            org_id: "org".to_string(),
        });

        let a = store
            .append_commit(AppendCommit {
                branch_id: BranchId::from("a"),
                graph: Graph::new(),
                playbook_json: vec![],
                message: "a".to_string(),
                created_by: "alice".to_string(),
                merge_parent_commit_id: None,
            })
            .unwrap();
        let b = store
            .append_commit(AppendCommit {
                branch_id: BranchId::from("b"),
                graph: Graph::new(),
                playbook_json: vec![],
                message: "b".to_string(),
                created_by: "alice".to_string(),
                merge_parent_commit_id: None,
            })
            .unwrap();

        let resolver = AncestorResolver::new(&store);
        assert_eq!(resolver.find_common_ancestor(&a.id, &b.id).unwrap(), None);
    }

    #[test]
    fn depth_cap_is_enforced() {
        let (store, ids) = linear_history(3);
        let resolver = AncestorResolver::with_max_depth(&store, 2);
        let result = resolver.find_common_ancestor(&ids[2], &ids[2]);
        assert!(matches!(result, Err(AncestorError::DepthExceeded(_, 2))));
    }
}
