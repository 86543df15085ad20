//! publish command - Publish files to a branch as one commit

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{client_for, credential, load_config, resolve_target};
use crate::auth::TokenScope;
use crate::cli::args::TargetArgs;
use crate::cli::Context;
use crate::core::input::{self, FileEntry};
use crate::publish::{PublishJob, PublishRequest, Publisher};
use crate::ui::{output, prompts};
use crate::ui::progress::TerminalProgress;

/// Arguments of `treepush publish`.
#[derive(Debug, Clone)]
pub struct PublishArgs {
    pub target: TargetArgs,
    pub message: Option<String>,
    pub manifest: Option<PathBuf>,
    pub dir: Option<PathBuf>,
    pub prefix: Option<String>,
    pub concurrency: Option<usize>,
    pub allow_empty: bool,
    pub json: bool,
}

/// Run the publish command.
///
/// This is a synchronous wrapper that uses tokio to run the async implementation.
pub fn publish(ctx: &Context, args: PublishArgs) -> Result<ExitCode> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(publish_async(ctx, args))
}

async fn publish_async(ctx: &Context, args: PublishArgs) -> Result<ExitCode> {
    let config = load_config(ctx)?;
    let (repo, branch) = resolve_target(&config, &args.target)?;

    let files = read_files(ctx, &args)?;
    let prefix = args.prefix.as_deref().unwrap_or(config.prefix());
    let files = input::apply_prefix(files, prefix).context("Invalid --prefix")?;
    debug!(files = files.len(), "input loaded");

    let interactive = ctx.interactive && config.interactive();
    let message = match args.message.as_deref().or(config.message()) {
        Some(m) => m.to_string(),
        None if interactive && !args.json => {
            prompts::input("Commit message", Some(&default_message(files.len())), true)
                .context("Failed to read commit message")?
        }
        None => default_message(files.len()),
    };

    let mut options = config.publish_options();
    if let Some(n) = args.concurrency {
        if n == 0 {
            bail!("--concurrency must be greater than zero");
        }
        options.concurrency = n;
    }
    options.allow_empty_commits |= args.allow_empty;

    let cred = credential(interactive, args.target.token.as_deref(), TokenScope::RepoWrite)?;
    let publisher = Publisher::new(Arc::new(client_for(&config, repo))).with_options(options);
    let request = PublishRequest {
        branch: branch.clone(),
        message,
        files,
    };

    let progress = TerminalProgress::new(!ctx.quiet && !args.json);
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let mut job = PublishJob::new();
    let result = publisher
        .publish(&mut job, &cred, &request, &progress, &cancel)
        .await;
    interrupt.abort();
    progress.finish();
    drop(cred);

    if args.json {
        output::json(&job.report())?;
    }
    match result {
        Ok(outcome) => {
            if !args.json {
                output::print(
                    output::format_outcome(&outcome, branch.as_str()),
                    ctx.verbosity(),
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            if !args.json {
                output::error(output::format_failure(&err));
            }
            Ok(ExitCode::FAILURE)
        }
    }
}

fn read_files(ctx: &Context, args: &PublishArgs) -> Result<Vec<FileEntry>> {
    let cwd = ctx.cwd()?;
    match (&args.manifest, &args.dir) {
        (Some(manifest), _) => {
            input::load_manifest(&cwd.join(manifest)).context("Failed to load manifest")
        }
        (None, Some(dir)) => input::collect_dir(&cwd.join(dir)).context("Failed to read directory"),
        (None, None) => bail!("Nothing to publish. Use --manifest FILE or --dir DIR"),
    }
}

fn default_message(files: usize) -> String {
    format!(
        "Publish {} file{}",
        files,
        if files == 1 { "" } else { "s" }
    )
}
