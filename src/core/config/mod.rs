//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! treepush has two configuration scopes:
//! - **Global**: User-level settings (API base, publish and retry tuning)
//! - **Project**: Where the current directory publishes to
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Project config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$TREEPUSH_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/treepush/config.toml`
//! 3. `~/.treepush/config.toml`
//!
//! # Project Config Locations
//!
//! Searched in order:
//! 1. `.treepush.toml` (canonical)
//! 2. `treepush.toml` (compatibility, warns)
//!
//! Tokens are never read from or written to configuration.
//!
//! # Example
//!
//! ```no_run
//! use treepush::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("."))).unwrap();
//! let config = result.config;
//!
//! if let Some(branch) = config.branch() {
//!     println!("Publishing to: {}", branch);
//! }
//! println!("Concurrency: {}", config.publish_options().concurrency);
//! ```

pub mod schema;

pub use schema::{GlobalConfig, ProjectConfig, PublishDefaults, RetryConfig};

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::forge::github::DEFAULT_API_BASE;
use crate::forge::RetryPolicy;
use crate::publish::PublishOptions;

/// Canonical project config file name.
pub const PROJECT_FILE: &str = ".treepush.toml";

/// Compatibility project config file name.
pub const PROJECT_FILE_COMPAT: &str = "treepush.toml";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("invalid config value: {0}")]
    InvalidValue(String),
}

/// Warnings generated during config loading.
#[derive(Debug, Clone)]
pub struct ConfigWarning {
    /// The warning message.
    pub message: String,
    /// The path that triggered the warning.
    pub path: PathBuf,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
    /// Any warnings generated during loading.
    pub warnings: Vec<ConfigWarning>,
}

/// Merged configuration from all sources.
///
/// Accessor methods apply precedence rules and defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Project configuration (if found)
    pub project: Option<ProjectConfig>,
    pub(crate) global_path: Option<PathBuf>,
    pub(crate) project_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `project_dir` is provided, also loads the project config there.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or hold
    /// invalid values. Missing config files are not an error.
    pub fn load(project_dir: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        Self::load_from(Self::find_global().as_deref(), project_dir)
    }

    /// Load configuration from an explicit global file.
    pub fn load_from(
        global_file: Option<&Path>,
        project_dir: Option<&Path>,
    ) -> Result<ConfigLoadResult, ConfigError> {
        let mut warnings = Vec::new();

        let (global, global_path) = match global_file {
            Some(path) if path.exists() => {
                (read_toml::<GlobalConfig>(path)?, Some(path.to_path_buf()))
            }
            _ => (GlobalConfig::default(), None),
        };

        let (project, project_path) = match project_dir {
            Some(dir) => Self::load_project(dir, &mut warnings)?,
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref p) = project {
            p.validate()?;
        }

        Ok(ConfigLoadResult {
            config: Config {
                global,
                project,
                global_path,
                project_path,
            },
            warnings,
        })
    }

    /// First global config file that exists.
    fn find_global() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("TREEPUSH_CONFIG") {
            return Some(PathBuf::from(path));
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("treepush/config.toml");
            if path.exists() {
                return Some(path);
            }
        }

        dirs::home_dir()
            .map(|home| home.join(".treepush/config.toml"))
            .filter(|path| path.exists())
    }

    fn load_project(
        dir: &Path,
        warnings: &mut Vec<ConfigWarning>,
    ) -> Result<(Option<ProjectConfig>, Option<PathBuf>), ConfigError> {
        let canonical = dir.join(PROJECT_FILE);
        if canonical.exists() {
            let config = read_toml(&canonical)?;
            return Ok((Some(config), Some(canonical)));
        }

        let compat = dir.join(PROJECT_FILE_COMPAT);
        if compat.exists() {
            warnings.push(ConfigWarning {
                message: format!(
                    "Using deprecated config location. Please rename to '{}'",
                    PROJECT_FILE
                ),
                path: compat.clone(),
            });
            let config = read_toml(&compat)?;
            return Ok((Some(config), Some(compat)));
        }

        Ok((None, None))
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// API base URL. Defaults to the public GitHub API.
    pub fn api_base(&self) -> &str {
        self.global.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    /// Whether prompting is allowed. Defaults to `true`.
    pub fn interactive(&self) -> bool {
        self.global.interactive.unwrap_or(true)
    }

    /// Target repository from the project config.
    pub fn repo(&self) -> Option<&str> {
        self.project.as_ref().and_then(|p| p.repo.as_deref())
    }

    /// Target branch from the project config.
    pub fn branch(&self) -> Option<&str> {
        self.project.as_ref().and_then(|p| p.branch.as_deref())
    }

    /// Default commit message from the project config.
    pub fn message(&self) -> Option<&str> {
        self.project.as_ref().and_then(|p| p.message.as_deref())
    }

    /// Path prefix from the project config. Defaults to none.
    pub fn prefix(&self) -> &str {
        self.project
            .as_ref()
            .and_then(|p| p.prefix.as_deref())
            .unwrap_or("")
    }

    /// Publish options with defaults filled in.
    pub fn publish_options(&self) -> PublishOptions {
        let defaults = PublishOptions::default();
        let Some(p) = &self.global.publish else {
            return defaults;
        };
        PublishOptions {
            concurrency: p.concurrency.unwrap_or(defaults.concurrency),
            tree_chunk_size: p.tree_chunk_size.unwrap_or(defaults.tree_chunk_size),
            max_blob_bytes: p.max_blob_bytes.unwrap_or(defaults.max_blob_bytes),
            allow_empty_commits: p.allow_empty_commits.unwrap_or(defaults.allow_empty_commits),
        }
    }

    /// Retry policy with defaults filled in.
    pub fn retry_policy(&self) -> RetryPolicy {
        let defaults = RetryPolicy::default();
        let Some(r) = &self.global.retry else {
            return defaults;
        };
        RetryPolicy {
            max_attempts: r.max_attempts.unwrap_or(defaults.max_attempts),
            initial_backoff: r
                .initial_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_backoff),
            max_backoff: r
                .max_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_backoff),
        }
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded project config file.
    pub fn project_config_loaded_from(&self) -> Option<&Path> {
        self.project_path.as_deref()
    }
}

fn read_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    // Message only; the source snippet could echo a misplaced token.
    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })
}
