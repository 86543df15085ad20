//! config command - Show effective configuration

use std::process::ExitCode;

use anyhow::Result;

use super::load_config;
use crate::cli::Context;

/// Print effective configuration and the files it came from.
pub fn config(ctx: &Context) -> Result<ExitCode> {
    let config = load_config(ctx)?;
    let options = config.publish_options();
    let retry = config.retry_policy();

    println!("# Sources");
    println!(
        "global  = {}",
        config
            .global_config_loaded_from()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!(
        "project = {}",
        config
            .project_config_loaded_from()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );

    println!();
    println!("# Target");
    println!("repo    = {}", config.repo().unwrap_or("(not set)"));
    println!("branch  = {}", config.branch().unwrap_or("(not set)"));
    println!("message = {}", config.message().unwrap_or("(default)"));
    println!("prefix  = {}", config.prefix());

    println!();
    println!("# Publish");
    println!("api_base            = {}", config.api_base());
    println!("concurrency         = {}", options.concurrency);
    println!("tree_chunk_size     = {}", options.tree_chunk_size);
    println!("max_blob_bytes      = {}", options.max_blob_bytes);
    println!("allow_empty_commits = {}", options.allow_empty_commits);

    println!();
    println!("# Retry");
    println!("max_attempts       = {}", retry.max_attempts);
    println!("initial_backoff_ms = {}", retry.initial_backoff.as_millis());
    println!("max_backoff_ms     = {}", retry.max_backoff.as_millis());

    Ok(ExitCode::SUCCESS)
}
