//! forge::mock
//!
//! In-memory, content-addressed repository host for deterministic testing.
//!
//! # Design
//!
//! [`InMemoryHost`] implements [`RepositoryClient`] over an object store that
//! behaves like the real one where publishing cares:
//!
//! - blob ids are real git blob hashes (`sha1("blob <len>\0<content>")`), so
//!   identical content always yields the same id
//! - trees are flat path maps; writing with a base inherits every path not
//!   overridden
//! - ref updates are fast-forward only and rejected with 422 otherwise
//!
//! Tests can inject failures per operation, simulate a third party pushing
//! to a branch mid-publish, and inspect every recorded call.
//!
//! # Example
//!
//! ```
//! use treepush::forge::mock::{InMemoryHost, OpKind};
//!
//! let host = InMemoryHost::new("octocat/site".parse().unwrap(), "ghp_test_token_123")
//!     .with_branch("main", &[("README.md", "# site\n")]);
//!
//! assert!(host.head("main").is_some());
//! assert_eq!(host.count(OpKind::CreateBlob), 0);
//! ```

use async_trait::async_trait;
use sha1::{Digest, Sha1};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use super::traits::{
    CommitInfo, ForgeError, GitRef, NewCommit, Repository, RepositoryClient, TreeEntry,
};
use crate::auth::Credential;
use crate::core::types::{BranchName, Oid, RepoId, RepoPath};

/// Flat snapshot of a tree: path to blob id.
pub type TreeMap = BTreeMap<RepoPath, Oid>;

/// In-memory repository host.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping; clones share state.
#[derive(Debug, Clone)]
pub struct InMemoryHost {
    repo: RepoId,
    inner: Arc<Mutex<HostState>>,
}

#[derive(Debug)]
struct HostState {
    repo_exists: bool,
    can_push: Option<bool>,
    tokens: HashSet<String>,
    blobs: HashMap<Oid, String>,
    trees: HashMap<Oid, TreeMap>,
    commits: HashMap<Oid, CommitInfo>,
    refs: HashMap<BranchName, Oid>,
    failures: Vec<Failure>,
    push_before: Option<(OpKind, BranchName)>,
    operations: Vec<MockOperation>,
    commit_seq: u64,
}

/// The seven host operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    GetRepository,
    GetRef,
    GetCommit,
    CreateBlob,
    CreateTree,
    CreateCommit,
    UpdateRef,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail the operation with the given error before it has any effect.
    Before(OpKind, ForgeError),
    /// Apply the ref update, then report the given error, as if the
    /// response was lost on the way back.
    UpdateRefAfterApply(ForgeError),
}

impl FailOn {
    fn kind(&self) -> OpKind {
        match self {
            FailOn::Before(kind, _) => *kind,
            FailOn::UpdateRefAfterApply(_) => OpKind::UpdateRef,
        }
    }

    fn after_apply(&self) -> bool {
        matches!(self, FailOn::UpdateRefAfterApply(_))
    }

    fn error(&self) -> ForgeError {
        match self {
            FailOn::Before(_, e) | FailOn::UpdateRefAfterApply(e) => e.clone(),
        }
    }
}

#[derive(Debug)]
struct Failure {
    on: FailOn,
    /// `None` fails forever.
    remaining: Option<u32>,
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    GetRepository,
    GetRef { branch: String },
    GetCommit { sha: Oid },
    CreateBlob { content: String },
    CreateTree { base: Oid, paths: Vec<String> },
    CreateCommit { tree: Oid, parent: Oid, message: String },
    UpdateRef { branch: String, sha: Oid },
}

impl MockOperation {
    /// Which operation this record is for.
    pub fn kind(&self) -> OpKind {
        match self {
            MockOperation::GetRepository => OpKind::GetRepository,
            MockOperation::GetRef { .. } => OpKind::GetRef,
            MockOperation::GetCommit { .. } => OpKind::GetCommit,
            MockOperation::CreateBlob { .. } => OpKind::CreateBlob,
            MockOperation::CreateTree { .. } => OpKind::CreateTree,
            MockOperation::CreateCommit { .. } => OpKind::CreateCommit,
            MockOperation::UpdateRef { .. } => OpKind::UpdateRef,
        }
    }
}

/// Git blob id of `content`, identical to `git hash-object`.
pub fn blob_id(content: &str) -> Oid {
    let mut hasher = Sha1::new();
    hasher.update(format!("blob {}\0", content.len()).as_bytes());
    hasher.update(content.as_bytes());
    Oid::from_digest(&hasher.finalize())
}

fn tree_id(entries: &TreeMap) -> Oid {
    let mut hasher = Sha1::new();
    hasher.update(b"tree\0");
    for (path, sha) in entries {
        hasher.update(path.as_str().as_bytes());
        hasher.update(b"\0");
        hasher.update(sha.as_str().as_bytes());
        hasher.update(b"\n");
    }
    Oid::from_digest(&hasher.finalize())
}

fn commit_id(tree: &Oid, parents: &[Oid], message: &str, seq: u64) -> Oid {
    let mut hasher = Sha1::new();
    hasher.update(b"commit\0");
    hasher.update(tree.as_str().as_bytes());
    for parent in parents {
        hasher.update(b"\0");
        hasher.update(parent.as_str().as_bytes());
    }
    hasher.update(b"\0");
    hasher.update(message.as_bytes());
    hasher.update(seq.to_le_bytes());
    Oid::from_digest(&hasher.finalize())
}

fn branch(name: &str) -> BranchName {
    BranchName::new(name).unwrap()
}

impl HostState {
    fn put_blob(&mut self, content: &str) -> Oid {
        let sha = blob_id(content);
        self.blobs.entry(sha.clone()).or_insert_with(|| content.to_string());
        sha
    }

    fn put_tree(&mut self, entries: TreeMap) -> Oid {
        let sha = tree_id(&entries);
        self.trees.entry(sha.clone()).or_insert(entries);
        sha
    }

    fn put_commit(&mut self, tree: Oid, parents: Vec<Oid>, message: &str) -> Oid {
        self.commit_seq += 1;
        let sha = commit_id(&tree, &parents, message, self.commit_seq);
        self.commits.insert(
            sha.clone(),
            CommitInfo {
                sha: sha.clone(),
                tree,
                parents,
                message: message.to_string(),
            },
        );
        sha
    }

    /// Whether `ancestor` is reachable from `descendant` (inclusive).
    fn is_ancestor(&self, ancestor: &Oid, descendant: &Oid) -> bool {
        let mut queue = VecDeque::from([descendant.clone()]);
        let mut seen = HashSet::new();
        while let Some(sha) = queue.pop_front() {
            if &sha == ancestor {
                return true;
            }
            if !seen.insert(sha.clone()) {
                continue;
            }
            if let Some(commit) = self.commits.get(&sha) {
                queue.extend(commit.parents.iter().cloned());
            }
        }
        false
    }

    /// Commit on top of `branch` as someone else would.
    fn push_foreign_commit(&mut self, branch: &BranchName) -> Option<Oid> {
        let head = self.refs.get(branch)?.clone();
        let base_tree = self.commits.get(&head)?.tree.clone();
        let mut entries = self.trees.get(&base_tree)?.clone();
        let content = format!("pushed by someone else ({})\n", self.commit_seq);
        let blob = self.put_blob(&content);
        entries.insert(RepoPath::new("THIRD_PARTY.md").unwrap(), blob);
        let tree = self.put_tree(entries);
        let commit = self.put_commit(tree, vec![head], "Concurrent change");
        self.refs.insert(branch.clone(), commit.clone());
        Some(commit)
    }

    /// Take the next failure configured for `kind` at the given point.
    fn take_failure(&mut self, kind: OpKind, after_apply: bool) -> Option<ForgeError> {
        let index = self.failures.iter().position(|f| {
            f.on.kind() == kind && f.on.after_apply() == after_apply && f.remaining != Some(0)
        })?;
        let failure = &mut self.failures[index];
        if let Some(n) = failure.remaining.as_mut() {
            *n -= 1;
        }
        Some(failure.on.error())
    }
}

impl InMemoryHost {
    /// Create a host holding an existing, empty repository that accepts `token`.
    pub fn new(repo: RepoId, token: &str) -> Self {
        Self {
            repo,
            inner: Arc::new(Mutex::new(HostState {
                repo_exists: true,
                can_push: Some(true),
                tokens: HashSet::from([token.to_string()]),
                blobs: HashMap::new(),
                trees: HashMap::new(),
                commits: HashMap::new(),
                refs: HashMap::new(),
                failures: Vec::new(),
                push_before: None,
                operations: Vec::new(),
                commit_seq: 0,
            })),
        }
    }

    /// Seed a branch with a root commit containing `files`.
    pub fn with_branch(self, name: &str, files: &[(&str, &str)]) -> Self {
        {
            let mut inner = self.inner.lock().unwrap();
            let mut entries = TreeMap::new();
            for (path, content) in files {
                let sha = inner.put_blob(content);
                entries.insert(RepoPath::new(*path).unwrap(), sha);
            }
            let tree = inner.put_tree(entries);
            let commit = inner.put_commit(tree, Vec::new(), "Initial commit");
            inner.refs.insert(branch(name), commit);
        }
        self
    }

    /// Make the repository invisible, as if it did not exist.
    pub fn missing_repository(self) -> Self {
        self.inner.lock().unwrap().repo_exists = false;
        self
    }

    /// Report that the token may read but not push.
    pub fn read_only(self) -> Self {
        self.inner.lock().unwrap().can_push = Some(false);
        self
    }

    /// Fail every matching operation.
    pub fn fail_on(self, on: FailOn) -> Self {
        self.inner.lock().unwrap().failures.push(Failure {
            on,
            remaining: None,
        });
        self
    }

    /// Fail only the next matching operation.
    pub fn fail_once(self, on: FailOn) -> Self {
        self.inner.lock().unwrap().failures.push(Failure {
            on,
            remaining: Some(1),
        });
        self
    }

    /// Have a third party push to `branch` the first time `kind` is called.
    pub fn third_party_push_before(self, kind: OpKind, name: &str) -> Self {
        self.inner.lock().unwrap().push_before = Some((kind, branch(name)));
        self
    }

    /// Push a commit to `branch` as a third party, returning its id.
    pub fn third_party_push(&self, name: &str) -> Option<Oid> {
        self.inner.lock().unwrap().push_foreign_commit(&branch(name))
    }

    /// Current head of `branch`.
    pub fn head(&self, name: &str) -> Option<Oid> {
        self.inner.lock().unwrap().refs.get(&branch(name)).cloned()
    }

    /// Look up a commit.
    pub fn commit(&self, sha: &Oid) -> Option<CommitInfo> {
        self.inner.lock().unwrap().commits.get(sha).cloned()
    }

    /// Look up a tree.
    pub fn tree(&self, sha: &Oid) -> Option<TreeMap> {
        self.inner.lock().unwrap().trees.get(sha).cloned()
    }

    /// Look up blob content.
    pub fn blob(&self, sha: &Oid) -> Option<String> {
        self.inner.lock().unwrap().blobs.get(sha).cloned()
    }

    /// Files at the head of `branch`, resolved to their content.
    pub fn files_at(&self, name: &str) -> Option<BTreeMap<String, String>> {
        let inner = self.inner.lock().unwrap();
        let head = inner.refs.get(&branch(name))?;
        let tree = inner.trees.get(&inner.commits.get(head)?.tree)?;
        tree.iter()
            .map(|(path, sha)| Some((path.to_string(), inner.blobs.get(sha)?.clone())))
            .collect()
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.inner.lock().unwrap().operations.clone()
    }

    /// Number of recorded calls of `kind`.
    pub fn count(&self, kind: OpKind) -> usize {
        self.inner
            .lock()
            .unwrap()
            .operations
            .iter()
            .filter(|op| op.kind() == kind)
            .count()
    }

    /// Record the call, check the token, run any scheduled third-party push,
    /// and apply configured failures. Returns the locked state on success.
    fn enter(
        &self,
        cred: &Credential,
        op: MockOperation,
    ) -> Result<std::sync::MutexGuard<'_, HostState>, ForgeError> {
        let kind = op.kind();
        let mut inner = self.inner.lock().unwrap();
        inner.operations.push(op);

        if !inner.tokens.contains(cred.expose()) {
            return Err(ForgeError::AuthFailed("Bad credentials".into()));
        }
        if !inner.repo_exists {
            return Err(ForgeError::NotFound("Not Found".into()));
        }
        if let Some((trigger, target)) = inner.push_before.clone() {
            if trigger == kind {
                inner.push_before = None;
                inner.push_foreign_commit(&target);
            }
        }
        if let Some(err) = inner.take_failure(kind, false) {
            return Err(err);
        }
        Ok(inner)
    }
}

fn unprocessable(message: impl Into<String>) -> ForgeError {
    ForgeError::ApiError {
        status: 422,
        message: message.into(),
    }
}

#[async_trait]
impl RepositoryClient for InMemoryHost {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn repo(&self) -> &RepoId {
        &self.repo
    }

    async fn get_repository(&self, cred: &Credential) -> Result<Repository, ForgeError> {
        let inner = self.enter(cred, MockOperation::GetRepository)?;
        Ok(Repository {
            full_name: self.repo.to_string(),
            default_branch: "main".to_string(),
            can_push: inner.can_push,
        })
    }

    async fn get_ref(
        &self,
        cred: &Credential,
        branch: &BranchName,
    ) -> Result<GitRef, ForgeError> {
        let inner = self.enter(
            cred,
            MockOperation::GetRef {
                branch: branch.to_string(),
            },
        )?;
        let sha = inner
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound("Not Found".into()))?;
        Ok(GitRef {
            branch: branch.clone(),
            sha,
        })
    }

    async fn get_commit(&self, cred: &Credential, sha: &Oid) -> Result<CommitInfo, ForgeError> {
        let inner = self.enter(cred, MockOperation::GetCommit { sha: sha.clone() })?;
        inner
            .commits
            .get(sha)
            .cloned()
            .ok_or_else(|| ForgeError::NotFound("Not Found".into()))
    }

    async fn create_blob(&self, cred: &Credential, content: &str) -> Result<Oid, ForgeError> {
        let mut inner = self.enter(
            cred,
            MockOperation::CreateBlob {
                content: content.to_string(),
            },
        )?;
        Ok(inner.put_blob(content))
    }

    async fn create_tree(
        &self,
        cred: &Credential,
        base_tree: &Oid,
        entries: &[TreeEntry],
    ) -> Result<Oid, ForgeError> {
        let mut inner = self.enter(
            cred,
            MockOperation::CreateTree {
                base: base_tree.clone(),
                paths: entries.iter().map(|e| e.path.to_string()).collect(),
            },
        )?;
        let mut tree = inner
            .trees
            .get(base_tree)
            .cloned()
            .ok_or_else(|| unprocessable("base_tree is not a valid tree"))?;
        let mut seen = HashSet::new();
        for entry in entries {
            if !inner.blobs.contains_key(&entry.sha) {
                return Err(unprocessable(format!("sha {} is not a blob", entry.sha)));
            }
            if !seen.insert(&entry.path) {
                return Err(unprocessable(format!("duplicate path {}", entry.path)));
            }
            tree.insert(entry.path.clone(), entry.sha.clone());
        }
        for entry in entries {
            let path = entry.path.as_str();
            let parent = path
                .match_indices('/')
                .map(|(i, _)| &path[..i])
                .find(|parent| entries.iter().any(|e| e.path.as_str() == *parent));
            if let Some(parent) = parent {
                return Err(unprocessable(format!(
                    "tree.path {} conflicts with file {}",
                    path, parent
                )));
            }
        }
        Ok(inner.put_tree(tree))
    }

    async fn create_commit(
        &self,
        cred: &Credential,
        commit: &NewCommit,
    ) -> Result<Oid, ForgeError> {
        let mut inner = self.enter(
            cred,
            MockOperation::CreateCommit {
                tree: commit.tree.clone(),
                parent: commit.parent.clone(),
                message: commit.message.clone(),
            },
        )?;
        if !inner.trees.contains_key(&commit.tree) {
            return Err(unprocessable("tree is not a valid tree"));
        }
        if !inner.commits.contains_key(&commit.parent) {
            return Err(unprocessable("parent is not a valid commit"));
        }
        Ok(inner.put_commit(
            commit.tree.clone(),
            vec![commit.parent.clone()],
            &commit.message,
        ))
    }

    async fn update_ref(
        &self,
        cred: &Credential,
        branch: &BranchName,
        sha: &Oid,
    ) -> Result<GitRef, ForgeError> {
        let mut inner = self.enter(
            cred,
            MockOperation::UpdateRef {
                branch: branch.to_string(),
                sha: sha.clone(),
            },
        )?;
        let current = inner
            .refs
            .get(branch)
            .cloned()
            .ok_or_else(|| unprocessable("Reference does not exist"))?;
        if !inner.commits.contains_key(sha) {
            return Err(unprocessable("Object does not exist"));
        }
        if !inner.is_ancestor(&current, sha) {
            return Err(unprocessable("Update is not a fast forward"));
        }
        inner.refs.insert(branch.clone(), sha.clone());
        if let Some(err) = inner.take_failure(OpKind::UpdateRef, true) {
            return Err(err);
        }
        Ok(GitRef {
            branch: branch.clone(),
            sha: sha.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::TokenScope;

    const TOKEN: &str = "ghp_mock_token_value";

    fn cred() -> Credential {
        Credential::new(TOKEN, TokenScope::RepoWrite).unwrap()
    }

    fn host() -> InMemoryHost {
        InMemoryHost::new("octocat/site".parse().unwrap(), TOKEN)
            .with_branch("main", &[("README.md", "hello\n")])
    }

    #[test]
    fn blob_id_matches_git() {
        assert_eq!(
            blob_id("hello world\n").as_str(),
            "3b18e512dba79e4c8300dd08aeb37f8e728b8dad"
        );
        assert_eq!(
            blob_id("").as_str(),
            "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
    }

    #[tokio::test]
    async fn rejects_unknown_token() {
        let host = host();
        let bad = Credential::new("ghp_wrong_token_xx", TokenScope::RepoWrite).unwrap();
        let err = host.get_repository(&bad).await.unwrap_err();
        assert!(matches!(err, ForgeError::AuthFailed(_)));
        assert_eq!(host.count(OpKind::GetRepository), 1);
    }

    #[tokio::test]
    async fn tree_overlay_inherits_base() {
        let host = host();
        let cred = cred();
        let head = host.head("main").unwrap();
        let base = host.get_commit(&cred, &head).await.unwrap().tree;

        let blob = host.create_blob(&cred, "new\n").await.unwrap();
        let tree = host
            .create_tree(
                &cred,
                &base,
                &[TreeEntry {
                    path: RepoPath::new("docs/new.md").unwrap(),
                    sha: blob.clone(),
                }],
            )
            .await
            .unwrap();

        let entries = host.tree(&tree).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[&RepoPath::new("docs/new.md").unwrap()], blob);
        assert_eq!(
            entries[&RepoPath::new("README.md").unwrap()],
            blob_id("hello\n")
        );
    }

    #[tokio::test]
    async fn tree_rejects_unknown_blob() {
        let host = host();
        let cred = cred();
        let head = host.head("main").unwrap();
        let base = host.get_commit(&cred, &head).await.unwrap().tree;
        let err = host
            .create_tree(
                &cred,
                &base,
                &[TreeEntry {
                    path: RepoPath::new("x").unwrap(),
                    sha: blob_id("never uploaded"),
                }],
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::ApiError { status: 422, .. }));
    }

    #[tokio::test]
    async fn tree_rejects_file_used_as_directory() {
        let host = host();
        let cred = cred();
        let head = host.head("main").unwrap();
        let base = host.get_commit(&cred, &head).await.unwrap().tree;
        let blob = host.create_blob(&cred, "x").await.unwrap();
        let entry = |path: &str| TreeEntry {
            path: RepoPath::new(path).unwrap(),
            sha: blob.clone(),
        };

        let err = host
            .create_tree(&cred, &base, &[entry("docs/index.md"), entry("docs")])
            .await
            .unwrap_err();
        assert!(matches!(err, ForgeError::ApiError { status: 422, .. }));
    }

    #[tokio::test]
    async fn update_ref_is_fast_forward_only() {
        let host = host();
        let cred = cred();
        let main = branch("main");
        let old_head = host.head("main").unwrap();
        let base = host.get_commit(&cred, &old_head).await.unwrap().tree;

        let ours = host
            .create_commit(
                &cred,
                &NewCommit {
                    message: "ours".into(),
                    tree: base,
                    parent: old_head,
                },
            )
            .await
            .unwrap();

        let theirs = host.third_party_push("main").unwrap();
        let err = host.update_ref(&cred, &main, &ours).await.unwrap_err();
        assert!(matches!(err, ForgeError::ApiError { status: 422, .. }));
        assert_eq!(host.head("main"), Some(theirs));
    }

    #[tokio::test]
    async fn fail_once_then_succeeds() {
        let host = host().fail_once(FailOn::Before(
            OpKind::CreateBlob,
            ForgeError::NetworkError("reset".into()),
        ));
        let cred = cred();
        assert!(host.create_blob(&cred, "a").await.is_err());
        assert_eq!(host.create_blob(&cred, "a").await.unwrap(), blob_id("a"));
    }

    #[tokio::test]
    async fn third_party_push_fires_once() {
        let host = host().third_party_push_before(OpKind::GetCommit, "main");
        let cred = cred();
        let before = host.head("main").unwrap();
        host.get_commit(&cred, &before).await.unwrap();
        let after = host.head("main").unwrap();
        assert_ne!(before, after);
        host.get_commit(&cred, &after).await.unwrap();
        assert_eq!(host.head("main").unwrap(), after);
    }

    #[test]
    fn files_at_resolves_content() {
        let files = host().files_at("main").unwrap();
        assert_eq!(files.get("README.md").map(String::as_str), Some("hello\n"));
    }
}
