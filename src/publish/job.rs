//! publish::job
//!
//! The publish state machine and its derived progress.
//!
//! # States
//!
//! ```text
//! Idle -> Validating -> ResolvingRef -> UploadingBlobs -> BuildingTree
//!      -> CreatingCommit -> UpdatingRef -> Success
//! ```
//!
//! `BuildingTree -> Success` is also legal when the new tree equals the base
//! tree and no commit is needed. Any running state may move to `Error`.
//! `Success` and `Error` are terminal until [`PublishJob::reset`].
//!
//! # Progress
//!
//! Each state owns a slice of 0..=100. Progress inside a slice is derived
//! from completed sub-operations (blobs uploaded, tree chunks written), and
//! the reported value never decreases.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use super::error::{ErrorClass, PublishError};
use crate::core::types::Oid;

/// Where a publish is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PublishState {
    Idle,
    Validating,
    ResolvingRef,
    UploadingBlobs,
    BuildingTree,
    CreatingCommit,
    UpdatingRef,
    Success,
    Error,
}

/// Coarse status for display: idle, publishing, success or error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Publishing,
    Success,
    Error,
}

impl PublishState {
    /// The progress slice `(start, end)` owned by this state.
    pub fn progress_range(self) -> (u8, u8) {
        match self {
            PublishState::Idle => (0, 0),
            PublishState::Validating => (0, 5),
            PublishState::ResolvingRef => (5, 10),
            PublishState::UploadingBlobs => (10, 80),
            PublishState::BuildingTree => (80, 90),
            PublishState::CreatingCommit => (90, 95),
            PublishState::UpdatingRef => (95, 98),
            PublishState::Success => (100, 100),
            PublishState::Error => (0, 0),
        }
    }

    /// Whether the job has finished, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, PublishState::Success | PublishState::Error)
    }

    pub fn status(self) -> JobStatus {
        match self {
            PublishState::Idle => JobStatus::Idle,
            PublishState::Success => JobStatus::Success,
            PublishState::Error => JobStatus::Error,
            _ => JobStatus::Publishing,
        }
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_transition_to(self, next: PublishState) -> bool {
        use PublishState::*;
        match (self, next) {
            (Idle, Validating)
            | (Validating, ResolvingRef)
            | (ResolvingRef, UploadingBlobs)
            | (UploadingBlobs, BuildingTree)
            | (BuildingTree, CreatingCommit)
            | (BuildingTree, Success)
            | (CreatingCommit, UpdatingRef)
            | (UpdatingRef, Success) => true,
            (from, Error) => !from.is_terminal() && from != Idle,
            _ => false,
        }
    }

    /// Human-readable label.
    pub fn label(self) -> &'static str {
        match self {
            PublishState::Idle => "idle",
            PublishState::Validating => "validating",
            PublishState::ResolvingRef => "resolving branch",
            PublishState::UploadingBlobs => "uploading files",
            PublishState::BuildingTree => "building tree",
            PublishState::CreatingCommit => "creating commit",
            PublishState::UpdatingRef => "updating branch",
            PublishState::Success => "done",
            PublishState::Error => "failed",
        }
    }
}

impl std::fmt::Display for PublishState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// What a successful publish did to the branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PublishOutcome {
    /// A new commit was created and the branch advanced to it.
    Published {
        commit: Oid,
        parent: Oid,
        tree: Oid,
        files: usize,
    },
    /// The files matched the branch head; nothing was committed.
    Unchanged { head: Oid, tree: Oid },
}

impl PublishOutcome {
    /// The branch head after the publish.
    pub fn head(&self) -> &Oid {
        match self {
            PublishOutcome::Published { commit, .. } => commit,
            PublishOutcome::Unchanged { head, .. } => head,
        }
    }
}

/// A progress notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub state: PublishState,
    /// Overall progress, 0..=100.
    pub progress: u8,
    /// Sub-operations completed in this state.
    pub completed: usize,
    /// Sub-operations expected in this state (0 if not counted).
    pub total: usize,
}

/// Receives progress as the publish runs.
pub trait ProgressSink: Send + Sync {
    fn update(&self, update: &ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn update(&self, update: &ProgressUpdate) {
        self(update)
    }
}

/// A sink that ignores all updates.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn update(&self, _update: &ProgressUpdate) {}
}

/// One publish attempt.
///
/// Owned exclusively by the caller and lent mutably to the publisher for
/// the duration of a publish.
#[derive(Debug, Clone)]
pub struct PublishJob {
    id: Uuid,
    state: PublishState,
    progress: u8,
    completed: usize,
    total: usize,
    error: Option<PublishError>,
    failed_at: Option<PublishState>,
    outcome: Option<PublishOutcome>,
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
    history: Vec<PublishState>,
}

impl Default for PublishJob {
    fn default() -> Self {
        Self::new()
    }
}

impl PublishJob {
    /// A fresh job in `Idle`.
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: PublishState::Idle,
            progress: 0,
            completed: 0,
            total: 0,
            error: None,
            failed_at: None,
            outcome: None,
            started_at: None,
            finished_at: None,
            history: vec![PublishState::Idle],
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> PublishState {
        self.state
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    /// Overall progress, 0..=100.
    pub fn progress(&self) -> u8 {
        self.progress
    }

    pub fn error(&self) -> Option<&PublishError> {
        self.error.as_ref()
    }

    /// The state the job was in when it failed.
    pub fn failed_at(&self) -> Option<PublishState> {
        self.failed_at
    }

    pub fn outcome(&self) -> Option<&PublishOutcome> {
        self.outcome.as_ref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Every state the job has passed through since the last reset.
    pub fn history(&self) -> &[PublishState] {
        &self.history
    }

    /// Return to `Idle` so the job can be published again.
    ///
    /// Keeps the job id; clears error, outcome, progress and timestamps.
    pub fn reset(&mut self) {
        debug!(job = %self.id, from = %self.state, "job reset");
        let id = self.id;
        *self = Self::new();
        self.id = id;
    }

    /// Current progress as a notification.
    pub fn snapshot(&self) -> ProgressUpdate {
        ProgressUpdate {
            state: self.state,
            progress: self.progress,
            completed: self.completed,
            total: self.total,
        }
    }

    /// Leave `Idle` and start validating.
    pub(crate) fn begin(&mut self) -> Result<(), PublishError> {
        if self.state != PublishState::Idle {
            return Err(PublishError::InvalidState(format!(
                "job {} is {}; reset it before publishing again",
                self.id, self.state
            )));
        }
        self.started_at = Some(Utc::now());
        self.advance(PublishState::Validating)
    }

    /// Move to the next state, entering its progress slice.
    pub(crate) fn advance(&mut self, next: PublishState) -> Result<(), PublishError> {
        if !self.state.can_transition_to(next) {
            return Err(PublishError::InvalidState(format!(
                "cannot move from {} to {}",
                self.state, next
            )));
        }
        info!(from = %self.state, to = %next, "state transition");
        self.state = next;
        self.completed = 0;
        self.total = 0;
        self.history.push(next);
        self.raise(next.progress_range().0);
        Ok(())
    }

    /// Record `done` of `total` sub-operations in the current state.
    pub(crate) fn set_fraction(&mut self, done: usize, total: usize) {
        self.completed = done;
        self.total = total;
        let (start, end) = self.state.progress_range();
        let value = if total == 0 {
            end
        } else {
            let span = (end - start) as usize;
            start + (span * done.min(total) / total) as u8
        };
        self.raise(value);
    }

    /// Mark the current state's work as done.
    pub(crate) fn complete_step(&mut self) {
        self.raise(self.state.progress_range().1);
    }

    /// Finish successfully.
    pub(crate) fn succeed(&mut self, outcome: PublishOutcome) -> Result<(), PublishError> {
        self.advance(PublishState::Success)?;
        self.outcome = Some(outcome);
        self.finished_at = Some(Utc::now());
        Ok(())
    }

    /// Finish with an error, keeping the progress reached so far.
    pub(crate) fn fail(&mut self, error: PublishError) {
        if !self.state.can_transition_to(PublishState::Error) {
            return;
        }
        info!(at = %self.state, class = %error.class(), "publish failed");
        self.failed_at = Some(self.state);
        self.state = PublishState::Error;
        self.history.push(PublishState::Error);
        self.error = Some(error);
        self.finished_at = Some(Utc::now());
    }

    fn raise(&mut self, value: u8) {
        self.progress = self.progress.max(value.min(100));
    }

    /// A serializable summary of the job.
    pub fn report(&self) -> JobReport {
        JobReport {
            id: self.id,
            state: self.state,
            status: self.status(),
            progress: self.progress,
            failed_at: self.failed_at,
            error: self.error.as_ref().map(ErrorReport::from),
            outcome: self.outcome.clone(),
            started_at: self.started_at,
            finished_at: self.finished_at,
            states: self.history.clone(),
        }
    }
}

/// Serializable view of a [`PublishJob`].
#[derive(Debug, Clone, Serialize)]
pub struct JobReport {
    pub id: Uuid,
    pub state: PublishState,
    pub status: JobStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<PublishState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<PublishOutcome>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub states: Vec<PublishState>,
}

/// Serializable view of a [`PublishError`].
#[derive(Debug, Clone, Serialize)]
pub struct ErrorReport {
    pub class: ErrorClass,
    pub message: String,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<String>,
}

impl From<&PublishError> for ErrorReport {
    fn from(err: &PublishError) -> Self {
        Self {
            class: err.class(),
            message: err.to_string(),
            retryable: err.is_retryable(),
            guidance: err.guidance(),
        }
    }
}
