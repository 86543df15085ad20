//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Resolves configuration and command-specific arguments
//! 2. Calls the publisher
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! `publish` and `check` do network I/O. Each builds a tokio runtime and
//! blocks on its async implementation.

mod check;
mod config_cmd;
mod publish;
mod token;

pub use check::check;
pub use config_cmd::config;
pub use publish::{publish, PublishArgs};
pub use token::{credential, pick_token};

use std::process::ExitCode;

use anyhow::{anyhow, Context as _, Result};

use super::args::{Command, TargetArgs};
use super::Context;
use crate::core::config::{Config, ConfigLoadResult};
use crate::core::types::{BranchName, RepoId};
use crate::forge::github::GitHubClient;
use crate::ui::output;

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<ExitCode> {
    match command {
        Command::Publish {
            target,
            message,
            manifest,
            dir,
            prefix,
            concurrency,
            allow_empty,
            json,
        } => publish::publish(
            ctx,
            PublishArgs {
                target,
                message,
                manifest,
                dir,
                prefix,
                concurrency,
                allow_empty,
                json,
            },
        ),
        Command::Check { target, json } => check::check(ctx, &target, json),
        Command::Config => config_cmd::config(ctx),
    }
}

/// Load config for the working directory, printing any warnings.
pub(crate) fn load_config(ctx: &Context) -> Result<Config> {
    let cwd = ctx.cwd()?;
    let ConfigLoadResult { config, warnings } =
        Config::load(Some(&cwd)).context("Failed to load configuration")?;
    for warning in warnings {
        output::warn(
            format!("{} ({})", warning.message, warning.path.display()),
            ctx.verbosity(),
        );
    }
    Ok(config)
}

/// Repository and branch from flags, falling back to project config.
pub(crate) fn resolve_target(config: &Config, target: &TargetArgs) -> Result<(RepoId, BranchName)> {
    let repo = target
        .repo
        .as_deref()
        .or(config.repo())
        .ok_or_else(|| anyhow!("No repository given. Use --repo OWNER/NAME or set 'repo' in .treepush.toml"))?;
    let branch = target
        .branch
        .as_deref()
        .or(config.branch())
        .ok_or_else(|| anyhow!("No branch given. Use --branch NAME or set 'branch' in .treepush.toml"))?;

    let repo: RepoId = repo.parse().context("Invalid repository")?;
    let branch = BranchName::new(branch).context("Invalid branch name")?;
    Ok((repo, branch))
}

/// HTTP client for `repo` configured from `config`.
pub(crate) fn client_for(config: &Config, repo: RepoId) -> GitHubClient {
    GitHubClient::new(repo)
        .with_api_base(config.api_base())
        .with_retry(config.retry_policy())
}
