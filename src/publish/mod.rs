//! publish
//!
//! Atomic multi-file publishing.
//!
//! # Architecture
//!
//! A publish turns a flat file list into exactly one new commit on an
//! existing branch, or changes nothing:
//!
//! ```text
//! files -> validate -> BlobUploader -> TreeBuilder -> CommitBuilder -> RefUpdater
//! ```
//!
//! - [`RefResolver`] checks the repository and reads the branch head
//! - [`BlobUploader`] stores contents with bounded parallelism
//! - [`TreeBuilder`] overlays the new entries on the head's tree, in chunks
//! - [`CommitBuilder`] creates the single-parent commit
//! - [`RefUpdater`] moves the branch, fast-forward only
//! - [`Publisher`] drives the steps and records them in a [`PublishJob`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use treepush::auth::{Credential, TokenScope};
//! use treepush::core::input::FileEntry;
//! use treepush::forge::github::GitHubClient;
//! use treepush::publish::{NoProgress, PublishJob, PublishRequest, Publisher};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = GitHubClient::new("octocat/site".parse()?);
//! let publisher = Publisher::new(Arc::new(client));
//! let cred = Credential::new(std::env::var("GITHUB_TOKEN")?, TokenScope::RepoWrite)?;
//!
//! let request = PublishRequest {
//!     branch: "main".parse()?,
//!     message: "Update docs".to_string(),
//!     files: vec![FileEntry::new("docs/index.md", "# Docs\n")?],
//! };
//!
//! let mut job = PublishJob::new();
//! let outcome = publisher
//!     .publish(&mut job, &cred, &request, &NoProgress, &CancellationToken::new())
//!     .await?;
//! println!("branch now at {}", outcome.head());
//! # Ok(())
//! # }
//! ```

mod blobs;
mod commit;
mod error;
mod job;
mod orchestrator;
mod ref_update;
mod resolve;
mod tree;

pub use blobs::BlobUploader;
pub use commit::CommitBuilder;
pub use error::{ErrorClass, PublishError};
pub use job::{
    ErrorReport, JobReport, JobStatus, NoProgress, ProgressSink, ProgressUpdate, PublishJob,
    PublishOutcome, PublishState,
};
pub use orchestrator::{BranchCheck, PublishOptions, PublishRequest, Publisher};
pub use ref_update::RefUpdater;
pub use resolve::{RefResolver, ResolvedBranch};
pub use tree::TreeBuilder;
