//! core::input
//!
//! The flat file list a publish consumes, and the two ways to obtain one.
//!
//! # Sources
//!
//! - A JSON manifest: `[{"path": "...", "content": "..."}]`, or the same
//!   array under a `files` key.
//! - A local directory, walked recursively. Hidden and `.gitignore`d files
//!   are skipped.
//!
//! Content must be UTF-8 text. Binary files are rejected rather than
//! guessed at.

use std::fs;
use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{RepoPath, TypeError};

/// One file to publish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: RepoPath,
    pub content: String,
}

impl FileEntry {
    /// Create an entry, validating the path.
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Result<Self, TypeError> {
        Ok(Self {
            path: RepoPath::new(path)?,
            content: content.into(),
        })
    }
}

/// Errors from reading publish input.
#[derive(Debug, Error)]
pub enum InputError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse manifest '{path}': {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("'{0}' is not UTF-8 text; binary files are not supported")]
    Binary(PathBuf),

    #[error("'{0}' has a file name that is not valid UTF-8")]
    NonUtf8Path(PathBuf),

    #[error("failed to walk '{path}': {message}")]
    Walk { path: PathBuf, message: String },

    #[error(transparent)]
    Path(#[from] TypeError),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Manifest {
    List(Vec<FileEntry>),
    Wrapped { files: Vec<FileEntry> },
}

/// Parse a manifest from JSON text.
pub fn parse_manifest(json: &str) -> Result<Vec<FileEntry>, String> {
    let manifest: Manifest = serde_json::from_str(json).map_err(|e| e.to_string())?;
    Ok(match manifest {
        Manifest::List(files) | Manifest::Wrapped { files } => files,
    })
}

/// Load a manifest file.
pub fn load_manifest(path: &Path) -> Result<Vec<FileEntry>, InputError> {
    let json = fs::read_to_string(path).map_err(|source| InputError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_manifest(&json).map_err(|message| InputError::Manifest {
        path: path.to_path_buf(),
        message,
    })
}

/// Collect every file under `root`, with paths relative to it.
///
/// The result is sorted by path.
pub fn collect_dir(root: &Path) -> Result<Vec<FileEntry>, InputError> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(root)
        .hidden(true)
        .git_ignore(true)
        .require_git(false)
        .build();

    for entry in walker {
        let entry = entry.map_err(|e| InputError::Walk {
            path: root.to_path_buf(),
            message: e.to_string(),
        })?;
        if !entry.file_type().is_some_and(|t| t.is_file()) {
            continue;
        }
        let full = entry.path();
        let relative = full.strip_prefix(root).unwrap_or(full);
        let path = relative
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| InputError::NonUtf8Path(full.to_path_buf()))?
            .join("/");
        let bytes = fs::read(full).map_err(|source| InputError::Read {
            path: full.to_path_buf(),
            source,
        })?;
        let content = String::from_utf8(bytes).map_err(|_| InputError::Binary(full.to_path_buf()))?;
        files.push(FileEntry {
            path: RepoPath::new(path)?,
            content,
        });
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Place every entry under `prefix`. An empty prefix leaves paths as they are.
pub fn apply_prefix(files: Vec<FileEntry>, prefix: &str) -> Result<Vec<FileEntry>, TypeError> {
    files
        .into_iter()
        .map(|f| {
            Ok(FileEntry {
                path: f.path.join_under(prefix)?,
                content: f.content,
            })
        })
        .collect()
}
