//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$TREEPUSH_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/treepush/config.toml`
//! 3. `~/.treepush/config.toml`
//!
//! # Project Config
//!
//! Located at `.treepush.toml` in the working directory.
//!
//! # Validation
//!
//! Config values are validated after parsing (e.g. `branch` must be a valid
//! branch name, `concurrency` must be positive). Unknown keys are rejected,
//! which also keeps tokens out of config files.

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::{BranchName, RepoId};

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// api_base = "https://github.example.com/api/v3"
/// interactive = true
///
/// [publish]
/// concurrency = 8
/// tree_chunk_size = 500
/// max_blob_bytes = 52428800
/// allow_empty_commits = false
///
/// [retry]
/// max_attempts = 4
/// initial_backoff_ms = 500
/// max_backoff_ms = 30000
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// API base URL (GitHub Enterprise)
    pub api_base: Option<String>,

    /// Default interactive mode
    pub interactive: Option<bool>,

    /// Publish defaults
    pub publish: Option<PublishDefaults>,

    /// Retry policy for idempotent requests
    pub retry: Option<RetryConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(base) = &self.api_base {
            if !(base.starts_with("https://") || base.starts_with("http://")) {
                return Err(ConfigError::InvalidValue(format!(
                    "api_base must be an http(s) URL, got '{}'",
                    base
                )));
            }
        }
        if let Some(publish) = &self.publish {
            publish.validate()?;
        }
        if let Some(retry) = &self.retry {
            retry.validate()?;
        }
        Ok(())
    }
}

/// Project configuration.
///
/// # Example
///
/// ```toml
/// repo = "octocat/site"
/// branch = "gh-pages"
/// message = "Publish site"
/// prefix = "docs"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Target repository, `owner/name` or a GitHub URL
    pub repo: Option<String>,

    /// Target branch
    pub branch: Option<String>,

    /// Default commit message
    pub message: Option<String>,

    /// Directory prefix applied to every published path
    pub prefix: Option<String>,
}

impl ProjectConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(repo) = &self.repo {
            repo.parse::<RepoId>()
                .map_err(|e| ConfigError::InvalidValue(format!("invalid repo: {}", e)))?;
        }
        if let Some(branch) = &self.branch {
            BranchName::new(branch.as_str())
                .map_err(|e| ConfigError::InvalidValue(format!("invalid branch: {}", e)))?;
        }
        if let Some(message) = &self.message {
            if message.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "message cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// Publish tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct PublishDefaults {
    /// Maximum blob uploads in flight
    pub concurrency: Option<usize>,

    /// Maximum entries per tree write
    pub tree_chunk_size: Option<usize>,

    /// Largest accepted file, in bytes
    pub max_blob_bytes: Option<usize>,

    /// Commit even when nothing changed
    pub allow_empty_commits: Option<bool>,
}

impl PublishDefaults {
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("publish.concurrency", self.concurrency),
            ("publish.tree_chunk_size", self.tree_chunk_size),
            ("publish.max_blob_bytes", self.max_blob_bytes),
        ] {
            if value == Some(0) {
                return Err(ConfigError::InvalidValue(format!(
                    "{} must be greater than zero",
                    key
                )));
            }
        }
        Ok(())
    }
}

/// Retry tuning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct RetryConfig {
    /// Total attempts per idempotent request, including the first
    pub max_attempts: Option<u32>,

    /// Wait before the first retry, in milliseconds
    pub initial_backoff_ms: Option<u64>,

    /// Cap on any single wait, in milliseconds
    pub max_backoff_ms: Option<u64>,
}

impl RetryConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == Some(0) {
            return Err(ConfigError::InvalidValue(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if let (Some(initial), Some(max)) = (self.initial_backoff_ms, self.max_backoff_ms) {
            if initial > max {
                return Err(ConfigError::InvalidValue(format!(
                    "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                    initial, max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_global() {
        let config: GlobalConfig = toml::from_str(
            r#"
            api_base = "https://ghe.example.com/api/v3"
            interactive = false

            [publish]
            concurrency = 4
            allow_empty_commits = true

            [retry]
            max_attempts = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.interactive, Some(false));
        let publish = config.publish.as_ref().unwrap();
        assert_eq!(publish.concurrency, Some(4));
        assert_eq!(publish.tree_chunk_size, None);
        assert_eq!(config.retry.as_ref().unwrap().max_attempts, Some(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn token_is_not_a_config_key() {
        let result: Result<GlobalConfig, _> = toml::from_str(r#"token = "ghp_secret""#);
        assert!(result.is_err());
        let result: Result<ProjectConfig, _> = toml::from_str(r#"token = "ghp_secret""#);
        assert!(result.is_err());
    }

    #[test]
    fn zero_concurrency_rejected() {
        let config = GlobalConfig {
            publish: Some(PublishDefaults {
                concurrency: Some(0),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn bad_api_base_rejected() {
        let config = GlobalConfig {
            api_base: Some("ftp://example.com".into()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn retry_bounds_checked() {
        let retry = RetryConfig {
            initial_backoff_ms: Some(5000),
            max_backoff_ms: Some(100),
            ..Default::default()
        };
        assert!(retry.validate().is_err());
        assert!(RetryConfig {
            max_attempts: Some(0),
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn project_values_validated() {
        let ok = ProjectConfig {
            repo: Some("https://github.com/octocat/site.git".into()),
            branch: Some("gh-pages".into()),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let bad_branch = ProjectConfig {
            branch: Some("bad..branch".into()),
            ..Default::default()
        };
        assert!(bad_branch.validate().is_err());

        let bad_repo = ProjectConfig {
            repo: Some("no-slash".into()),
            ..Default::default()
        };
        assert!(bad_repo.validate().is_err());
    }
}
