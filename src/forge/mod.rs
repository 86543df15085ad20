//! forge
//!
//! Access to a repository host's low-level object API.
//!
//! # Architecture
//!
//! The [`RepositoryClient`] trait is the only seam the publish layer talks
//! to. It exposes exactly the seven calls an atomic publish needs: read the
//! repository, a ref and a commit; write blobs, trees and commits; move a
//! ref. Host failures surface as [`ForgeError`] and are classified by the
//! caller.
//!
//! # Modules
//!
//! - `traits`: Core `RepositoryClient` trait and object types
//! - [`github`]: GitHub implementation over the git-data REST API
//! - [`mock`]: In-memory host for deterministic testing
//! - `retry`: Backoff policy for idempotent calls
//!
//! # Example
//!
//! ```ignore
//! use treepush::forge::{github::GitHubClient, RepositoryClient};
//!
//! let client = GitHubClient::new("octocat/site".parse()?);
//! let head = client.get_ref(&credential, &"main".parse()?).await?;
//! println!("main is at {}", head.sha.short(7));
//! ```

pub mod github;
pub mod mock;
mod retry;
mod traits;

pub use retry::RetryPolicy;
pub use traits::*;
