//! publish::ref_update
//!
//! Optimistic, fast-forward-only branch update.
//!
//! # Protocol
//!
//! 1. Re-read the ref. If it moved away from the expected parent, fail with
//!    `ConcurrentModification` without writing.
//! 2. Issue a non-forced update. If the host refuses it, re-read the ref:
//!    a moved ref is a `ConcurrentModification`; an unchanged ref means the
//!    request itself was bad and the host's error is surfaced.
//! 3. If the update fails transiently, its effect is unknown. Re-read the
//!    ref once: already at the new commit means it landed; still at the
//!    expected parent means it did not, so it is issued once more; anything
//!    else means someone else moved the branch.

use tracing::{debug, info, warn};

use super::error::PublishError;
use super::resolve::read_head;
use crate::auth::Credential;
use crate::core::types::{BranchName, Oid};
use crate::forge::{ForgeError, RepositoryClient};

/// Moves the branch to the new commit, once.
pub struct RefUpdater<'a> {
    client: &'a dyn RepositoryClient,
}

impl<'a> RefUpdater<'a> {
    pub fn new(client: &'a dyn RepositoryClient) -> Self {
        Self { client }
    }

    /// Advance `branch` from `expected_parent` to `new_commit`.
    pub async fn update(
        &self,
        cred: &Credential,
        branch: &BranchName,
        new_commit: &Oid,
        expected_parent: &Oid,
    ) -> Result<(), PublishError> {
        let current = read_head(self.client, cred, branch).await?;
        if &current != expected_parent {
            return Err(self.moved(branch, expected_parent, Some(current)));
        }

        match self.client.update_ref(cred, branch, new_commit).await {
            Ok(_) => {
                info!(branch = %branch, commit = %new_commit.short(7), "branch updated");
                Ok(())
            }
            Err(e) if is_rejection(&e) => {
                self.rejected(cred, branch, new_commit, expected_parent, e)
                    .await
            }
            Err(e) if e.is_transient() => {
                self.reconcile(cred, branch, new_commit, expected_parent, e)
                    .await
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn reconcile(
        &self,
        cred: &Credential,
        branch: &BranchName,
        new_commit: &Oid,
        expected_parent: &Oid,
        cause: ForgeError,
    ) -> Result<(), PublishError> {
        warn!(branch = %branch, error = %cause, "ref update outcome unknown, re-reading");
        let current = read_head(self.client, cred, branch).await?;

        if &current == new_commit {
            info!(branch = %branch, "ref update had already been applied");
            return Ok(());
        }
        if &current != expected_parent {
            return Err(self.moved(branch, expected_parent, Some(current)));
        }

        debug!(branch = %branch, "ref unchanged, updating once more");
        match self.client.update_ref(cred, branch, new_commit).await {
            Ok(_) => Ok(()),
            Err(e) if is_rejection(&e) => {
                self.rejected(cred, branch, new_commit, expected_parent, e)
                    .await
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Classify a refused update by where the ref is now.
    ///
    /// Only a ref that moved away from `expected_parent` is a race. A
    /// refusal with the ref still in place is a plain API error.
    async fn rejected(
        &self,
        cred: &Credential,
        branch: &BranchName,
        new_commit: &Oid,
        expected_parent: &Oid,
        cause: ForgeError,
    ) -> Result<(), PublishError> {
        match read_head(self.client, cred, branch).await {
            Ok(actual) if &actual == new_commit => Ok(()),
            Ok(actual) if &actual != expected_parent => {
                Err(self.moved(branch, expected_parent, Some(actual)))
            }
            Ok(_) => {
                warn!(branch = %branch, error = %cause, "ref update refused with ref unchanged");
                Err(cause.into())
            }
            Err(PublishError::BranchNotFound(_)) => Err(self.moved(branch, expected_parent, None)),
            Err(_) => Err(cause.into()),
        }
    }

    fn moved(&self, branch: &BranchName, expected: &Oid, actual: Option<Oid>) -> PublishError {
        PublishError::ConcurrentModification {
            branch: branch.to_string(),
            expected: expected.clone(),
            actual,
        }
    }
}

/// The host refused the update outright.
fn is_rejection(err: &ForgeError) -> bool {
    matches!(err, ForgeError::ApiError { status: 409 | 422, .. })
}
