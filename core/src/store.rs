//! Contract over persistent storage for commits and branches (§4.6).
//!
//! The Core only ever reads a commit by id, reads the latest commit on a
//! branch, and appends a commit. Everything else — encoding, indexing,
//! row-level authorization — is the store implementation's concern.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

use crate::model::{Branch, BranchId, Commit, CommitId, Graph, Step, Timestamp};

/// Input to [`CommitStore::append_commit`]. The store assigns `id`,
/// `version` (previous + 1, or 1), and `parent_commit_id` (the previous
/// tip).
#[derive(Clone, Debug)]
pub struct AppendCommit {
    pub branch_id: BranchId,
    pub graph: Graph,
    pub playbook_json: Vec<Step>,
    pub message: String,
    pub created_by: String,
    /// Present only when appending a merge commit; points into the
    /// source branch's history.
    pub merge_parent_commit_id: Option<CommitId>,
}

/// Storage operations the Core requires. Appends on a single branch are
/// serialized by the implementation; the Core does not arbitrate writers.
pub trait CommitStore {
    /// The store's own error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Look up a commit by id.
    fn get_commit(&self, id: &CommitId) -> Result<Option<Commit>, Self::Error>;

    /// Look up the latest commit on a branch.
    fn get_latest_commit(&self, branch_id: &BranchId) -> Result<Option<Commit>, Self::Error>;

    /// Look up a branch by id.
    fn get_branch(&self, branch_id: &BranchId) -> Result<Option<Branch>, Self::Error>;

    /// Append a new commit to a branch.
    fn append_commit(&self, request: AppendCommit) -> Result<Commit, Self::Error>;
}

/// Errors raised by [`MemoryStore`], the in-memory reference
/// implementation used by tests and as a starting point for real stores.
#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("branch '{0}' does not exist")]
    UnknownBranch(BranchId),
}

/// A trivial in-memory [`CommitStore`], useful for tests and as a
/// reference for what a real store needs to track.
#[derive(Default)]
pub struct MemoryStore {
    branches: Mutex<HashMap<BranchId, Branch>>,
    commits: Mutex<HashMap<CommitId, Commit>>,
    tips: Mutex<HashMap<BranchId, CommitId>>,
    counter: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a branch, so commits can be appended to it.
    pub fn create_branch(&self, branch: Branch) {
        self.branches
            .lock()
            .expect("memory store mutex poisoned")
            .insert(branch.id.clone(), branch);
    }

    /// Point `branch_id`'s tip directly at `commit_id`, without appending a
    /// new commit. Lets two branches share history up to a common commit,
    /// e.g. when seeding a test fixture that branches off an existing one.
    pub fn set_tip(&self, branch_id: BranchId, commit_id: CommitId) {
        self.tips
            .lock()
            .expect("memory store mutex poisoned")
            .insert(branch_id, commit_id);
    }

    fn next_id(&self) -> CommitId {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        CommitId(format!("commit-{n}"))
    }

    fn now() -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default()
    }
}

impl CommitStore for MemoryStore {
    type Error = MemoryStoreError;

    fn get_commit(&self, id: &CommitId) -> Result<Option<Commit>, Self::Error> {
        Ok(self
            .commits
            .lock()
            .expect("memory store mutex poisoned")
            .get(id)
            .cloned())
    }

    fn get_latest_commit(&self, branch_id: &BranchId) -> Result<Option<Commit>, Self::Error> {
        let tips = self.tips.lock().expect("memory store mutex poisoned");
        let Some(tip) = tips.get(branch_id) else {
            return Ok(None);
        };
        Ok(self
            .commits
            .lock()
            .expect("memory store mutex poisoned")
            .get(tip)
            .cloned())
    }

    fn get_branch(&self, branch_id: &BranchId) -> Result<Option<Branch>, Self::Error> {
        Ok(self
            .branches
            .lock()
            .expect("memory store mutex poisoned")
            .get(branch_id)
            .cloned())
    }

    fn append_commit(&self, request: AppendCommit) -> Result<Commit, Self::Error> {
        let branch = self
            .get_branch(&request.branch_id)?
            .ok_or_else(|| MemoryStoreError::UnknownBranch(request.branch_id.clone()))?;

        let parent = self.get_latest_commit(&request.branch_id)?;
        let version = parent.as_ref().map(|c| c.version + 1).unwrap_or(1);
        let id = self.next_id();

        let commit = Commit {
            id: id.clone(),
            playbook_id: branch.playbook_id,
            org_id: branch.org_id,
            branch_id: request.branch_id.clone(),
            version,
            graph: request.graph,
            playbook_json: request.playbook_json,
            message: request.message,
            parent_commit_id: parent.map(|c| c.id),
            merge_parent_commit_id: request.merge_parent_commit_id,
            created_by: request.created_by,
            created_at: Self::now(),
        };

        log::debug!(
            "appending commit '{}' (version {}) to branch '{}'",
            commit.id,
            commit.version,
            commit.branch_id
        );

        self.commits
            .lock()
            .expect("memory store mutex poisoned")
            .insert(id.clone(), commit.clone());
        self.tips
            .lock()
            .expect("memory store mutex poisoned")
            .insert(request.branch_id, id);

        Ok(commit)
    }
}
