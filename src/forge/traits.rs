//! forge::traits
//!
//! The low-level object API a repository host must expose for publishing.
//!
//! # Design
//!
//! The trait is async because every operation is network I/O. Each call
//! takes the [`Credential`] explicitly; implementations never store it.
//! Errors are transport-level [`ForgeError`]s; the publish layer decides
//! what they mean for the step that issued them.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::auth::Credential;
use crate::core::types::{BranchName, Oid, RepoId, RepoPath};

/// Errors from host operations.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Authentication failed (invalid token, expired, insufficient permissions).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited {
        /// How long the host asked us to wait, when it said.
        retry_after: Option<Duration>,
    },

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// The host answered with something we could not interpret.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),
}

impl ForgeError {
    /// Whether repeating the same request may succeed.
    ///
    /// Only meaningful for idempotent requests; the caller decides whether
    /// a request is safe to repeat.
    pub fn is_transient(&self) -> bool {
        match self {
            ForgeError::NetworkError(_) | ForgeError::RateLimited { .. } => true,
            ForgeError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Repository metadata returned by the validation call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    /// `owner/name` as reported by the host.
    pub full_name: String,
    /// The repository's default branch.
    pub default_branch: String,
    /// Whether the credential may push, when the host reports it.
    pub can_push: Option<bool>,
}

/// A branch ref and the commit it points to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitRef {
    pub branch: BranchName,
    pub sha: Oid,
}

/// A commit object as read from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub sha: Oid,
    pub tree: Oid,
    pub parents: Vec<Oid>,
    pub message: String,
}

/// One entry of a tree write: a regular file pointing at a blob.
///
/// Serialized on the wire as mode `100644`, type `blob`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: RepoPath,
    pub sha: Oid,
}

impl TreeEntry {
    /// File mode for a regular, non-executable file.
    pub const MODE: &'static str = "100644";

    /// Object type of every entry we write.
    pub const KIND: &'static str = "blob";
}

/// A commit to create. Publishing only produces linear history, so there is
/// exactly one parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCommit {
    pub message: String,
    pub tree: Oid,
    pub parent: Oid,
}

/// The object-graph API of a repository host, bound to one repository.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; blob uploads are issued
/// concurrently against a shared client.
///
/// # Retries
///
/// Implementations own retry/backoff for transient failures of idempotent
/// calls (reads, blob and tree writes). `create_commit` and `update_ref`
/// must not be retried here: repeating them is not idempotent.
#[async_trait]
pub trait RepositoryClient: Send + Sync {
    /// Host name for logs (e.g. "github").
    fn name(&self) -> &'static str;

    /// The repository this client targets.
    fn repo(&self) -> &RepoId;

    /// Confirm the repository exists and is accessible.
    ///
    /// # Errors
    ///
    /// - `AuthFailed` if the token is rejected
    /// - `NotFound` if the repository does not exist or is hidden from the token
    async fn get_repository(&self, cred: &Credential) -> Result<Repository, ForgeError>;

    /// Read a branch ref.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the branch does not exist
    async fn get_ref(&self, cred: &Credential, branch: &BranchName)
        -> Result<GitRef, ForgeError>;

    /// Read a commit object.
    async fn get_commit(&self, cred: &Credential, sha: &Oid) -> Result<CommitInfo, ForgeError>;

    /// Store UTF-8 file content as a blob and return its content address.
    async fn create_blob(&self, cred: &Credential, content: &str) -> Result<Oid, ForgeError>;

    /// Write a tree that overlays `entries` onto `base_tree`.
    ///
    /// Paths not listed are inherited from the base; listed paths override it.
    async fn create_tree(
        &self,
        cred: &Credential,
        base_tree: &Oid,
        entries: &[TreeEntry],
    ) -> Result<Oid, ForgeError>;

    /// Create a commit object. Does not move any ref.
    async fn create_commit(&self, cred: &Credential, commit: &NewCommit)
        -> Result<Oid, ForgeError>;

    /// Move a branch to `sha`, fast-forward only.
    ///
    /// # Errors
    ///
    /// - `ApiError` with status 422 if the update is not a fast-forward
    async fn update_ref(
        &self,
        cred: &Credential,
        branch: &BranchName,
        sha: &Oid,
    ) -> Result<GitRef, ForgeError>;
}
