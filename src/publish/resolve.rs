//! publish::resolve
//!
//! Repository validation and branch resolution.

use tracing::debug;

use super::error::PublishError;
use crate::auth::{Credential, TokenScope};
use crate::core::types::{BranchName, Oid};
use crate::forge::{ForgeError, Repository, RepositoryClient};

/// The branch head a publish builds on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBranch {
    pub branch: BranchName,
    /// Commit the branch pointed at when resolved.
    pub head: Oid,
    /// Tree of that commit.
    pub base_tree: Oid,
}

/// Reads the repository and the target branch.
pub struct RefResolver<'a> {
    client: &'a dyn RepositoryClient,
}

impl<'a> RefResolver<'a> {
    pub fn new(client: &'a dyn RepositoryClient) -> Self {
        Self { client }
    }

    /// Confirm the repository exists and the credential can use it.
    ///
    /// A write-scoped credential is also checked for push permission when
    /// the host reports it.
    pub async fn validate_repository(
        &self,
        cred: &Credential,
    ) -> Result<Repository, PublishError> {
        let repo = self.client.repo().to_string();
        let info = self
            .client
            .get_repository(cred)
            .await
            .map_err(|e| match e {
                ForgeError::NotFound(message) => PublishError::RepositoryAccess {
                    repo: repo.clone(),
                    message,
                },
                other => other.into(),
            })?;

        if cred.scope() == TokenScope::RepoWrite && info.can_push == Some(false) {
            return Err(PublishError::RepositoryAccess {
                repo,
                message: "token lacks write access".to_string(),
            });
        }
        debug!(repo = %info.full_name, "repository accessible");
        Ok(info)
    }

    /// Read the branch head and its tree.
    ///
    /// # Errors
    ///
    /// `BranchNotFound` if the branch does not exist. It is never created.
    pub async fn resolve_branch(
        &self,
        cred: &Credential,
        branch: &BranchName,
    ) -> Result<ResolvedBranch, PublishError> {
        let head = read_head(self.client, cred, branch).await?;
        let commit = self.client.get_commit(cred, &head).await?;
        debug!(head = %head.short(7), tree = %commit.tree.short(7), "branch resolved");
        Ok(ResolvedBranch {
            branch: branch.clone(),
            head,
            base_tree: commit.tree,
        })
    }

    /// Validate the repository, then resolve the branch.
    pub async fn resolve(
        &self,
        cred: &Credential,
        branch: &BranchName,
    ) -> Result<(Repository, ResolvedBranch), PublishError> {
        let repo = self.validate_repository(cred).await?;
        let resolved = self.resolve_branch(cred, branch).await?;
        Ok((repo, resolved))
    }

}

pub(crate) async fn read_head(
    client: &dyn RepositoryClient,
    cred: &Credential,
    branch: &BranchName,
) -> Result<Oid, PublishError> {
    match client.get_ref(cred, branch).await {
        Ok(git_ref) => Ok(git_ref.sha),
        Err(ForgeError::NotFound(_)) => Err(PublishError::BranchNotFound(branch.to_string())),
        Err(e) => Err(e.into()),
    }
}
