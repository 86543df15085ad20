//! core::types
//!
//! Strong types for the publishing domain.
//!
//! # Types
//!
//! - [`BranchName`] - Validated Git branch name (the publish target)
//! - [`Oid`] - Git object identifier as reported by the host
//! - [`RepoId`] - `owner/name` pair identifying a remote repository
//! - [`RepoPath`] - Repository-relative file path for a tree entry
//!
//! # Validation
//!
//! These types enforce validity at construction time, so a malformed branch
//! or path is rejected locally before any request reaches the host.
//!
//! # Examples
//!
//! ```
//! use treepush::core::types::{BranchName, Oid, RepoId, RepoPath};
//!
//! let branch = BranchName::new("main").unwrap();
//! let oid = Oid::new("abc123def4567890abc123def4567890abc12345").unwrap();
//! let repo: RepoId = "octocat/hello-world".parse().unwrap();
//! let path = RepoPath::new("src/lib.rs").unwrap();
//!
//! assert!(BranchName::new("invalid..name").is_err());
//! assert!(RepoPath::new("../escape").is_err());
//! ```

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid object id: {0}")]
    InvalidOid(String),

    #[error("invalid repository: {0}")]
    InvalidRepo(String),

    #[error("invalid path '{path}': {reason}")]
    InvalidPath { path: String, reason: String },
}

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty or exactly `@`
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
///
/// # Example
///
/// ```
/// use treepush::core::types::BranchName;
///
/// let name = BranchName::new("release/v2").unwrap();
/// assert_eq!(name.as_str(), "release/v2");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("branch.lock").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name).map_err(|reason| TypeError::InvalidBranchName(reason.into()))?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), &'static str> {
        if name.is_empty() {
            return Err("branch name cannot be empty");
        }
        if name == "@" {
            return Err("branch name cannot be '@' (reserved)");
        }
        if name.starts_with('.') || name.starts_with('-') {
            return Err("branch name cannot start with '.' or '-'");
        }
        if name.ends_with('/') || name.ends_with(".lock") {
            return Err("branch name cannot end with '/' or '.lock'");
        }
        for forbidden in ["..", "@{", "//"] {
            if name.contains(forbidden) {
                return Err("branch name cannot contain '..', '@{' or '//'");
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        if name
            .chars()
            .any(|c| INVALID_CHARS.contains(&c) || c.is_ascii_control())
        {
            return Err("branch name contains a forbidden character");
        }

        if name
            .split('/')
            .any(|component| component.starts_with('.') || component.ends_with(".lock"))
        {
            return Err("path component cannot start with '.' or end with '.lock'");
        }

        Ok(())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl FromStr for BranchName {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A Git object identifier (SHA-1 or SHA-256), normalized to lowercase.
///
/// # Example
///
/// ```
/// use treepush::core::types::Oid;
///
/// let oid = Oid::new("ABC123DEF4567890ABC123DEF4567890ABC12345").unwrap();
/// assert_eq!(oid.as_str(), "abc123def4567890abc123def4567890abc12345");
/// assert_eq!(oid.short(7), "abc123d");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Oid(String);

impl Oid {
    /// Create a new validated object id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidOid` if the string is not a 40 or 64
    /// character hex digest.
    pub fn new(oid: impl Into<String>) -> Result<Self, TypeError> {
        let oid = oid.into().to_ascii_lowercase();
        if oid.len() != 40 && oid.len() != 64 {
            return Err(TypeError::InvalidOid(format!(
                "expected 40 or 64 hex characters, got {}",
                oid.len()
            )));
        }
        if !oid.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(TypeError::InvalidOid(
                "object id must be hexadecimal".into(),
            ));
        }
        Ok(Self(oid))
    }

    /// Build an object id from a raw hash digest.
    pub(crate) fn from_digest(digest: &[u8]) -> Self {
        Self(hex::encode(digest))
    }

    /// Get an abbreviated form of the OID.
    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }

    /// Get the object id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Oid {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Oid> for String {
    fn from(oid: Oid) -> Self {
        oid.0
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies a remote repository on the host.
///
/// Parses either `owner/name` or a GitHub remote URL.
///
/// # Example
///
/// ```
/// use treepush::core::types::RepoId;
///
/// let short: RepoId = "octocat/hello-world".parse().unwrap();
/// let url: RepoId = "git@github.com:octocat/hello-world.git".parse().unwrap();
/// assert_eq!(short, url);
/// assert_eq!(short.to_string(), "octocat/hello-world");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoId {
    owner: String,
    name: String,
}

impl RepoId {
    /// Create a repository id from its parts.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidRepo` if either part is empty or contains
    /// characters GitHub does not allow in owner or repository names.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, TypeError> {
        let owner = owner.into();
        let name = name.into();
        for (label, part) in [("owner", &owner), ("name", &name)] {
            if part.is_empty() {
                return Err(TypeError::InvalidRepo(format!("{label} cannot be empty")));
            }
            if part == "." || part == ".." {
                return Err(TypeError::InvalidRepo(format!("{label} cannot be '{part}'")));
            }
            if !part
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            {
                return Err(TypeError::InvalidRepo(format!(
                    "{label} '{part}' contains invalid characters"
                )));
            }
        }
        Ok(Self { owner, name })
    }

    /// Repository owner (user or organization).
    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Repository name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for RepoId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((owner, name)) = crate::forge::github::parse_github_url(s) {
            return Self::new(owner, name);
        }
        match s.split_once('/') {
            Some((owner, name)) => Self::new(owner, name),
            None => Err(TypeError::InvalidRepo(format!(
                "expected 'owner/name' or a GitHub URL, got '{s}'"
            ))),
        }
    }
}

impl TryFrom<String> for RepoId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RepoId> for String {
    fn from(repo: RepoId) -> Self {
        repo.to_string()
    }
}

impl std::fmt::Display for RepoId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// A repository-relative file path, as used in tree entries.
///
/// Paths are `/`-separated, never absolute, and never step outside the
/// repository root or into a `.git` directory at any depth.
///
/// # Example
///
/// ```
/// use treepush::core::types::RepoPath;
///
/// let path = RepoPath::new("docs/guide.md").unwrap();
/// assert_eq!(path.join_under("site").unwrap().as_str(), "site/docs/guide.md");
///
/// assert!(RepoPath::new("/etc/passwd").is_err());
/// assert!(RepoPath::new("a//b").is_err());
/// assert!(RepoPath::new(".git/config").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RepoPath(String);

impl RepoPath {
    /// Create a new validated repository path.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPath` describing the first violated rule.
    pub fn new(path: impl Into<String>) -> Result<Self, TypeError> {
        let path = path.into();
        Self::validate(&path).map_err(|reason| TypeError::InvalidPath {
            path: path.clone(),
            reason: reason.into(),
        })?;
        Ok(Self(path))
    }

    fn validate(path: &str) -> Result<(), &'static str> {
        if path.is_empty() {
            return Err("path cannot be empty");
        }
        if path.starts_with('/') || path.ends_with('/') {
            return Err("path cannot start or end with '/'");
        }
        if path.contains('\\') {
            return Err("path must use '/' as separator");
        }
        if path.chars().any(|c| c == '\0') {
            return Err("path cannot contain NUL");
        }
        for component in path.split('/') {
            match component {
                "" => return Err("path cannot contain empty components"),
                "." | ".." => return Err("path cannot contain '.' or '..' components"),
                c if c.eq_ignore_ascii_case(".git") => {
                    return Err("path cannot contain a '.git' component")
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Place this path under a directory prefix.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPath` if the prefix itself is not a valid path.
    pub fn join_under(&self, prefix: &str) -> Result<Self, TypeError> {
        let prefix = prefix.trim_matches('/');
        if prefix.is_empty() {
            return Ok(self.clone());
        }
        Self::new(format!("{}/{}", prefix, self.0))
    }

    /// Get the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RepoPath {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<RepoPath> for String {
    fn from(path: RepoPath) -> Self {
        path.0
    }
}

impl std::fmt::Display for RepoPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
