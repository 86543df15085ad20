//! publish::commit
//!
//! Commit object creation. Creating a commit never moves a ref, so a
//! failure here leaves the branch untouched.

use tracing::debug;

use super::error::PublishError;
use crate::auth::Credential;
use crate::core::types::Oid;
use crate::forge::{NewCommit, RepositoryClient};

/// Creates the single-parent commit for a publish.
pub struct CommitBuilder<'a> {
    client: &'a dyn RepositoryClient,
}

impl<'a> CommitBuilder<'a> {
    pub fn new(client: &'a dyn RepositoryClient) -> Self {
        Self { client }
    }

    /// Create a commit of `tree` on top of `parent`.
    ///
    /// Issued once. The client does not retry it, since a repeat after a
    /// lost response would leave a second, orphaned commit.
    pub async fn create(
        &self,
        cred: &Credential,
        tree: &Oid,
        parent: &Oid,
        message: &str,
    ) -> Result<Oid, PublishError> {
        let commit = NewCommit {
            message: message.to_string(),
            tree: tree.clone(),
            parent: parent.clone(),
        };
        let sha = self.client.create_commit(cred, &commit).await?;
        debug!(commit = %sha.short(7), parent = %parent.short(7), "commit created");
        Ok(sha)
    }
}
