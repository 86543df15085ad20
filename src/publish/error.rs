//! publish::error
//!
//! Classified failures of a publish.
//!
//! Lower layers return [`ForgeError`]. Each publish step converts it here,
//! adding what only the step knows: a `NotFound` while reading a ref means
//! the branch is missing, while the same error on the repository read means
//! the repository is inaccessible.

use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::core::types::Oid;
use crate::forge::ForgeError;

/// Coarse error class, stable for scripting and JSON output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Authentication,
    RepositoryAccess,
    BranchNotFound,
    RateLimit,
    ConcurrentModification,
    Network,
    InvalidInput,
    Cancelled,
    Api,
    InvalidState,
}

impl std::fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorClass::Authentication => "authentication",
            ErrorClass::RepositoryAccess => "repository access",
            ErrorClass::BranchNotFound => "branch not found",
            ErrorClass::RateLimit => "rate limit",
            ErrorClass::ConcurrentModification => "concurrent modification",
            ErrorClass::Network => "network",
            ErrorClass::InvalidInput => "invalid input",
            ErrorClass::Cancelled => "cancelled",
            ErrorClass::Api => "api",
            ErrorClass::InvalidState => "invalid state",
        };
        f.write_str(s)
    }
}

/// Errors from a publish.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    /// The host rejected the credential or it lacks the needed scope.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The repository does not exist or the credential cannot reach it.
    #[error("cannot access repository '{repo}': {message}")]
    RepositoryAccess { repo: String, message: String },

    /// The target branch does not exist. Branches are never created.
    #[error("branch '{0}' does not exist")]
    BranchNotFound(String),

    /// The host throttled us and retrying within policy did not help.
    #[error("rate limited by host{}", retry_hint(.retry_after))]
    RateLimit { retry_after: Option<Duration> },

    /// The branch moved away from the head the publish was built on.
    #[error(
        "branch '{branch}' was updated concurrently (expected {expected}, found {})",
        or_unknown(.actual)
    )]
    ConcurrentModification {
        branch: String,
        expected: Oid,
        actual: Option<Oid>,
    },

    /// Connection failure, timeout, or host unavailable.
    #[error("network error: {0}")]
    Network(String),

    /// The file list or request was rejected before any network I/O.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The caller cancelled the publish before the branch was moved.
    #[error("publish cancelled")]
    Cancelled,

    /// The host returned an error that fits no other class.
    #[error("host error: {0}")]
    Api(String),

    /// The job was not in a state that allows the requested transition.
    #[error("invalid job state: {0}")]
    InvalidState(String),
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!(" (retry after {}s)", d.as_secs().max(1)),
        None => String::new(),
    }
}

fn or_unknown(oid: &Option<Oid>) -> String {
    oid.as_ref()
        .map(|o| o.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl PublishError {
    /// The coarse class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            PublishError::Authentication(_) => ErrorClass::Authentication,
            PublishError::RepositoryAccess { .. } => ErrorClass::RepositoryAccess,
            PublishError::BranchNotFound(_) => ErrorClass::BranchNotFound,
            PublishError::RateLimit { .. } => ErrorClass::RateLimit,
            PublishError::ConcurrentModification { .. } => ErrorClass::ConcurrentModification,
            PublishError::Network(_) => ErrorClass::Network,
            PublishError::InvalidInput(_) => ErrorClass::InvalidInput,
            PublishError::Cancelled => ErrorClass::Cancelled,
            PublishError::Api(_) => ErrorClass::Api,
            PublishError::InvalidState(_) => ErrorClass::InvalidState,
        }
    }

    /// Whether running the whole publish again (after `reset`) may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PublishError::RateLimit { .. }
                | PublishError::Network(_)
                | PublishError::ConcurrentModification { .. }
        )
    }

    /// Actionable advice for the user, when there is any.
    pub fn guidance(&self) -> Option<String> {
        match self {
            PublishError::Authentication(_) => Some(
                "Check that the token is valid, not expired, and grants repository \
                 contents write access."
                    .to_string(),
            ),
            PublishError::RepositoryAccess { repo, .. } => Some(format!(
                "Check that '{}' exists and that the token can write to it.",
                repo
            )),
            PublishError::BranchNotFound(branch) => Some(format!(
                "Create branch '{}' on the host first, or publish to an existing branch.",
                branch
            )),
            PublishError::RateLimit { retry_after } => Some(match retry_after {
                Some(d) => format!("Wait about {}s, then publish again.", d.as_secs().max(1)),
                None => "Wait a few minutes, then publish again.".to_string(),
            }),
            PublishError::ConcurrentModification { branch, .. } => Some(format!(
                "Someone else pushed to '{}'. Publishing again builds on the new head.",
                branch
            )),
            PublishError::Network(_) => {
                Some("Check your connection, then publish again.".to_string())
            }
            _ => None,
        }
    }
}

impl From<ForgeError> for PublishError {
    /// Classification without step context.
    fn from(err: ForgeError) -> Self {
        match err {
            ForgeError::AuthFailed(message) => PublishError::Authentication(message),
            ForgeError::RateLimited { retry_after } => PublishError::RateLimit { retry_after },
            ForgeError::NetworkError(message) => PublishError::Network(message),
            ForgeError::ApiError { status, message } if status >= 500 => {
                PublishError::Network(format!("host unavailable ({}): {}", status, message))
            }
            ForgeError::ApiError { status, message } => {
                PublishError::Api(format!("{} - {}", status, message))
            }
            ForgeError::NotFound(message) => PublishError::Api(format!("not found: {}", message)),
            ForgeError::InvalidResponse(message) => {
                PublishError::Api(format!("invalid response: {}", message))
            }
        }
    }
}
