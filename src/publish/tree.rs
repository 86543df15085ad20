//! publish::tree
//!
//! Chunked tree overlay.
//!
//! Entries are written on top of a base tree. Large sets are split into
//! chunks of at most `chunk_size`; each chunk uses the previous chunk's tree
//! as its base, so the final tree equals a single overlay of all entries.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::PublishError;
use crate::auth::Credential;
use crate::core::types::Oid;
use crate::forge::{RepositoryClient, TreeEntry};

/// Builds the new root tree from the uploaded blobs.
pub struct TreeBuilder<'a> {
    client: &'a dyn RepositoryClient,
    chunk_size: usize,
}

impl<'a> TreeBuilder<'a> {
    /// `chunk_size` of zero is treated as one.
    pub fn new(client: &'a dyn RepositoryClient, chunk_size: usize) -> Self {
        Self {
            client,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Number of tree writes needed for `entries` entries.
    pub fn chunk_count(&self, entries: usize) -> usize {
        entries.div_ceil(self.chunk_size)
    }

    /// Overlay `entries` onto `base_tree` and return the new tree id.
    ///
    /// Empty input returns `base_tree` without contacting the host.
    /// `on_progress(done, total)` is called after each chunk.
    pub async fn build(
        &self,
        cred: &Credential,
        base_tree: &Oid,
        mut entries: Vec<TreeEntry>,
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<Oid, PublishError> {
        if entries.is_empty() {
            return Ok(base_tree.clone());
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));

        let total = self.chunk_count(entries.len());
        let mut tree = base_tree.clone();
        for (i, chunk) in entries.chunks(self.chunk_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(PublishError::Cancelled);
            }
            tree = self.client.create_tree(cred, &tree, chunk).await?;
            debug!(chunk = i + 1, of = total, tree = %tree.short(7), "tree chunk written");
            on_progress(i + 1, total);
        }
        Ok(tree)
    }
}
