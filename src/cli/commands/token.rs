//! Credential resolution for a single run.
//!
//! Order: `--token`, `$TREEPUSH_TOKEN`, `$GITHUB_TOKEN`, masked prompt. The
//! resulting [`Credential`] lives only as long as the command.

use anyhow::{bail, Context as _, Result};

use crate::auth::{Credential, TokenScope};
use crate::ui::prompts;

/// Environment variables consulted, in order.
pub const TOKEN_ENV_VARS: [&str; 2] = ["TREEPUSH_TOKEN", "GITHUB_TOKEN"];

/// The first non-empty token from the flag or the environment.
pub fn pick_token(flag: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Option<String> {
    flag.map(str::to_string)
        .into_iter()
        .chain(TOKEN_ENV_VARS.iter().filter_map(|name| env(name)))
        .find(|token| !token.trim().is_empty())
}

/// Build the credential for this run, prompting only when `interactive`.
pub fn credential(interactive: bool, flag: Option<&str>, scope: TokenScope) -> Result<Credential> {
    let token = match pick_token(flag, |name| std::env::var(name).ok()) {
        Some(token) => token,
        None if interactive => prompts::password("GitHub token", true)
            .context("Failed to read token")?,
        None => bail!(
            "No token. Use --token, set {} or {}, or run interactively.",
            TOKEN_ENV_VARS[0],
            TOKEN_ENV_VARS[1]
        ),
    };
    Credential::new(token, scope).context("Invalid token")
}
