//! publish::orchestrator
//!
//! Drives one publish through the state machine.
//!
//! # Atomicity
//!
//! Nothing is visible on the branch until the final ref update. Every step
//! before it only creates unreferenced objects, so a failure or a
//! cancellation at any earlier point leaves the branch exactly where it was.

use std::collections::HashSet;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};

use super::blobs::BlobUploader;
use super::commit::CommitBuilder;
use super::error::PublishError;
use super::job::{ProgressSink, PublishJob, PublishOutcome, PublishState};
use super::ref_update::RefUpdater;
use super::resolve::{RefResolver, ResolvedBranch};
use super::tree::TreeBuilder;
use crate::auth::{Credential, TokenScope};
use crate::core::input::FileEntry;
use crate::core::types::BranchName;
use crate::forge::{Repository, RepositoryClient};

/// Tunables for a publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOptions {
    /// Maximum blob uploads in flight.
    pub concurrency: usize,
    /// Maximum entries per tree write.
    pub tree_chunk_size: usize,
    /// Largest file accepted, in bytes.
    pub max_blob_bytes: usize,
    /// Commit even when the files match the branch head.
    pub allow_empty_commits: bool,
}

impl Default for PublishOptions {
    fn default() -> Self {
        Self {
            concurrency: 8,
            tree_chunk_size: 500,
            max_blob_bytes: 50 * 1024 * 1024,
            allow_empty_commits: false,
        }
    }
}

/// What to publish and where.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub branch: BranchName,
    pub message: String,
    pub files: Vec<FileEntry>,
}

/// Result of a read-only check.
#[derive(Debug, Clone)]
pub struct BranchCheck {
    pub repository: Repository,
    pub branch: ResolvedBranch,
}

/// Publishes file sets to one repository.
pub struct Publisher {
    client: Arc<dyn RepositoryClient>,
    options: PublishOptions,
}

impl Publisher {
    pub fn new(client: Arc<dyn RepositoryClient>) -> Self {
        Self {
            client,
            options: PublishOptions::default(),
        }
    }

    pub fn with_options(mut self, options: PublishOptions) -> Self {
        self.options = options;
        self
    }

    /// Run `request` as one atomic commit, recording progress in `job`.
    ///
    /// `job` must be `Idle`; a finished job needs [`PublishJob::reset`]
    /// first. On return the job is `Success` or `Error`, except when it was
    /// rejected for not being idle, in which case it is left untouched.
    pub async fn publish(
        &self,
        job: &mut PublishJob,
        cred: &Credential,
        request: &PublishRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PublishOutcome, PublishError> {
        let span = info_span!(
            "publish",
            job = %job.id(),
            host = self.client.name(),
            repo = %self.client.repo(),
            branch = %request.branch
        );
        self.drive(job, cred, request, progress, cancel)
            .instrument(span)
            .await
    }

    async fn drive(
        &self,
        job: &mut PublishJob,
        cred: &Credential,
        request: &PublishRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PublishOutcome, PublishError> {
        job.begin()?;
        progress.update(&job.snapshot());

        match self.run(job, cred, request, progress, cancel).await {
            Ok(outcome) => {
                job.succeed(outcome.clone())?;
                info!(head = %outcome.head().short(7), "publish complete");
                progress.update(&job.snapshot());
                Ok(outcome)
            }
            Err(err) => {
                job.fail(err.clone());
                progress.update(&job.snapshot());
                Err(err)
            }
        }
    }

    /// Validate the repository and resolve the branch without writing.
    pub async fn check(
        &self,
        cred: &Credential,
        branch: &BranchName,
    ) -> Result<BranchCheck, PublishError> {
        let (repository, branch) = RefResolver::new(self.client.as_ref())
            .resolve(cred, branch)
            .await?;
        Ok(BranchCheck { repository, branch })
    }

    async fn run(
        &self,
        job: &mut PublishJob,
        cred: &Credential,
        request: &PublishRequest,
        progress: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<PublishOutcome, PublishError> {
        let client = self.client.as_ref();
        let resolver = RefResolver::new(client);

        self.validate_request(cred, request)?;
        checkpoint(cancel)?;
        resolver.validate_repository(cred).await?;
        step_done(job, progress);

        enter(job, PublishState::ResolvingRef, progress, cancel)?;
        let resolved = resolver.resolve_branch(cred, &request.branch).await?;
        step_done(job, progress);

        enter(job, PublishState::UploadingBlobs, progress, cancel)?;
        let entries = BlobUploader::new(client, self.options.concurrency)
            .upload(cred, &request.files, cancel, |done, total| {
                job.set_fraction(done, total);
                progress.update(&job.snapshot());
            })
            .await?;
        step_done(job, progress);

        enter(job, PublishState::BuildingTree, progress, cancel)?;
        let tree = TreeBuilder::new(client, self.options.tree_chunk_size)
            .build(cred, &resolved.base_tree, entries, cancel, |done, total| {
                job.set_fraction(done, total);
                progress.update(&job.snapshot());
            })
            .await?;
        step_done(job, progress);

        if tree == resolved.base_tree && !self.options.allow_empty_commits {
            info!("tree unchanged, nothing to commit");
            return Ok(PublishOutcome::Unchanged {
                head: resolved.head,
                tree,
            });
        }

        enter(job, PublishState::CreatingCommit, progress, cancel)?;
        let commit = CommitBuilder::new(client)
            .create(cred, &tree, &resolved.head, &request.message)
            .await?;
        step_done(job, progress);

        enter(job, PublishState::UpdatingRef, progress, cancel)?;
        RefUpdater::new(client)
            .update(cred, &request.branch, &commit, &resolved.head)
            .await?;
        step_done(job, progress);

        Ok(PublishOutcome::Published {
            commit,
            parent: resolved.head,
            tree,
            files: request.files.len(),
        })
    }

    /// Local checks done before any network I/O.
    fn validate_request(
        &self,
        cred: &Credential,
        request: &PublishRequest,
    ) -> Result<(), PublishError> {
        if cred.scope() != TokenScope::RepoWrite {
            return Err(PublishError::InvalidInput(format!(
                "publishing needs a {} token, got {}",
                TokenScope::RepoWrite,
                cred.scope()
            )));
        }
        if request.message.trim().is_empty() {
            return Err(PublishError::InvalidInput(
                "commit message cannot be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for file in &request.files {
            if !seen.insert(&file.path) {
                return Err(PublishError::InvalidInput(format!(
                    "duplicate path '{}'",
                    file.path
                )));
            }
            if file.content.len() > self.options.max_blob_bytes {
                return Err(PublishError::InvalidInput(format!(
                    "'{}' is {} bytes, larger than the {} byte limit",
                    file.path,
                    file.content.len(),
                    self.options.max_blob_bytes
                )));
            }
        }
        if let Some((file, dir)) = file_dir_conflict(&request.files) {
            return Err(PublishError::InvalidInput(format!(
                "'{}' is a file but '{}' needs it as a directory",
                file, dir
            )));
        }
        Ok(())
    }
}

/// A path that is also the parent directory of another path in the set.
fn file_dir_conflict(files: &[FileEntry]) -> Option<(&str, &str)> {
    let paths: HashSet<&str> = files.iter().map(|f| f.path.as_str()).collect();
    files.iter().find_map(|f| {
        let path = f.path.as_str();
        path.match_indices('/')
            .map(|(i, _)| &path[..i])
            .find(|parent| paths.contains(parent))
            .map(|parent| (parent, path))
    })
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), PublishError> {
    if cancel.is_cancelled() {
        return Err(PublishError::Cancelled);
    }
    Ok(())
}

fn enter(
    job: &mut PublishJob,
    state: PublishState,
    progress: &dyn ProgressSink,
    cancel: &CancellationToken,
) -> Result<(), PublishError> {
    checkpoint(cancel)?;
    job.advance(state)?;
    progress.update(&job.snapshot());
    Ok(())
}

fn step_done(job: &mut PublishJob, progress: &dyn ProgressSink) {
    job.complete_step();
    progress.update(&job.snapshot());
}
