//! publish::blobs
//!
//! Bounded-concurrency blob upload.
//!
//! Identical contents are uploaded once; every path sharing that content
//! receives the same blob id. Uploads run with at most `concurrency`
//! requests in flight. The first failure aborts the batch: remaining
//! uploads are dropped, and blobs already stored stay as unreferenced
//! objects on the host.

use std::collections::HashMap;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::error::PublishError;
use crate::auth::Credential;
use crate::core::input::FileEntry;
use crate::core::types::Oid;
use crate::forge::{RepositoryClient, TreeEntry};

/// Uploads file contents as blobs.
pub struct BlobUploader<'a> {
    client: &'a dyn RepositoryClient,
    concurrency: usize,
}

impl<'a> BlobUploader<'a> {
    /// `concurrency` of zero is treated as one.
    pub fn new(client: &'a dyn RepositoryClient, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    /// Upload every file's content and pair each path with its blob id.
    ///
    /// `on_progress(done, total)` is called after each completed upload.
    /// The result keeps the order of `files`.
    pub async fn upload(
        &self,
        cred: &Credential,
        files: &[FileEntry],
        cancel: &CancellationToken,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<Vec<TreeEntry>, PublishError> {
        let (unique, slot_of) = dedup(files);
        let total = unique.len();
        debug!(files = files.len(), unique = total, "uploading blobs");

        let mut shas: Vec<Option<Oid>> = vec![None; total];
        let client = self.client;
        let mut uploads = stream::iter(unique.into_iter().enumerate().map(|(slot, content)| {
            async move { client.create_blob(cred, content).await.map(|sha| (slot, sha)) }
        }))
        .buffer_unordered(self.concurrency);

        let mut done = 0;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(PublishError::Cancelled),
                next = uploads.next() => next,
            };
            match next {
                Some(Ok((slot, sha))) => {
                    shas[slot] = Some(sha);
                    done += 1;
                    on_progress(done, total);
                }
                Some(Err(e)) => return Err(e.into()),
                None => break,
            }
        }

        files
            .iter()
            .zip(slot_of)
            .map(|(file, slot)| -> Result<TreeEntry, PublishError> {
                let sha = shas[slot].clone().ok_or_else(|| {
                    PublishError::Api(format!("no blob id returned for '{}'", file.path))
                })?;
                Ok(TreeEntry {
                    path: file.path.clone(),
                    sha,
                })
            })
            .collect()
    }
}

/// Distinct contents in first-seen order, and each file's index into them.
fn dedup(files: &[FileEntry]) -> (Vec<&str>, Vec<usize>) {
    let mut unique = Vec::new();
    let mut seen: HashMap<&str, usize> = HashMap::new();
    let slots = files
        .iter()
        .map(|file| {
            *seen.entry(file.content.as_str()).or_insert_with(|| {
                unique.push(file.content.as_str());
                unique.len() - 1
            })
        })
        .collect();
    (unique, slots)
}
