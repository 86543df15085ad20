//! check command - Validate repository and branch without writing

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use serde::Serialize;

use super::{client_for, credential, load_config, resolve_target};
use crate::auth::TokenScope;
use crate::cli::args::TargetArgs;
use crate::cli::Context;
use crate::core::types::Oid;
use crate::publish::{ErrorReport, Publisher};
use crate::ui::output;

#[derive(Debug, Serialize)]
struct CheckReport {
    repository: String,
    branch: String,
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    can_push: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    head: Option<Oid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_tree: Option<Oid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorReport>,
}

/// Run the check command.
pub fn check(ctx: &Context, target: &TargetArgs, json: bool) -> Result<ExitCode> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(check_async(ctx, target, json))
}

async fn check_async(ctx: &Context, target: &TargetArgs, json: bool) -> Result<ExitCode> {
    let config = load_config(ctx)?;
    let (repo, branch) = resolve_target(&config, target)?;
    let interactive = ctx.interactive && config.interactive();
    let cred = credential(interactive, target.token.as_deref(), TokenScope::RepoRead)?;

    let mut report = CheckReport {
        repository: repo.to_string(),
        branch: branch.to_string(),
        ok: false,
        default_branch: None,
        can_push: None,
        head: None,
        base_tree: None,
        error: None,
    };

    let publisher = Publisher::new(Arc::new(client_for(&config, repo)));
    let result = publisher.check(&cred, &branch).await;
    drop(cred);

    match &result {
        Ok(found) => {
            report.ok = true;
            report.default_branch = Some(found.repository.default_branch.clone());
            report.can_push = found.repository.can_push;
            report.head = Some(found.branch.head.clone());
            report.base_tree = Some(found.branch.base_tree.clone());
        }
        Err(err) => report.error = Some(ErrorReport::from(err)),
    }

    if json {
        output::json(&report)?;
    } else {
        match &result {
            Ok(found) => {
                let v = ctx.verbosity();
                output::print(format!("repository: {}", found.repository.full_name), v);
                output::print(format!("branch:     {}", report.branch), v);
                output::print(format!("head:       {}", found.branch.head), v);
                output::print(format!("tree:       {}", found.branch.base_tree), v);
                if found.repository.can_push == Some(false) {
                    output::warn("token cannot push to this repository", v);
                }
            }
            Err(err) => output::error(output::format_failure(err)),
        }
    }

    Ok(if result.is_ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
