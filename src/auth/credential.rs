//! auth::credential
//!
//! Bearer token scoped to a single publish.
//!
//! # Security
//!
//! A [`Credential`] is created from user input when a publish starts and
//! dropped when it ends. It is never written to config, never cloned into
//! long-lived state, and never rendered: `Debug` and `Display` are redacted
//! and the HTTP client marks the header value as sensitive.

use thiserror::Error;

/// Errors from credential construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("token cannot be empty")]
    Empty,

    #[error("token appears to be too short")]
    TooShort,

    #[error("token should not contain whitespace")]
    Whitespace,
}

/// Scope a credential must carry for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenScope {
    /// Read repository metadata and git objects.
    RepoRead,
    /// Create git objects and move branch refs.
    RepoWrite,
}

impl std::fmt::Display for TokenScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenScope::RepoRead => write!(f, "repository read"),
            TokenScope::RepoWrite => write!(f, "repository write"),
        }
    }
}

/// A personal access token plus the scope it is expected to grant.
///
/// Intentionally not `Clone`: callers own it and lend it by reference.
pub struct Credential {
    token: String,
    scope: TokenScope,
}

impl Credential {
    /// Wrap a token supplied by the user.
    ///
    /// Only format checks are done here; whether the host accepts the token
    /// is discovered by the first API call.
    ///
    /// # Example
    ///
    /// ```
    /// use treepush::auth::{Credential, TokenScope};
    ///
    /// let cred = Credential::new("ghp_abcdefghijklmnop", TokenScope::RepoWrite).unwrap();
    /// assert_eq!(format!("{:?}", cred), "Credential { token: <redacted>, scope: RepoWrite }");
    /// assert!(Credential::new("short", TokenScope::RepoWrite).is_err());
    /// ```
    pub fn new(token: impl Into<String>, scope: TokenScope) -> Result<Self, CredentialError> {
        let token = token.into();
        let token = token.trim_end_matches(['\r', '\n']).to_string();
        if token.is_empty() {
            return Err(CredentialError::Empty);
        }
        if token.chars().any(char::is_whitespace) {
            return Err(CredentialError::Whitespace);
        }
        if token.len() < 10 {
            return Err(CredentialError::TooShort);
        }
        Ok(Self { token, scope })
    }

    /// The raw token, for building the authorization header only.
    pub(crate) fn expose(&self) -> &str {
        &self.token
    }

    /// The scope this credential is expected to grant.
    pub fn scope(&self) -> TokenScope {
        self.scope
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Credential {{ token: <redacted>, scope: {:?} }}", self.scope)
    }
}
