//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--no-interactive`: Never prompt
//! - `--quiet` / `-q`: Minimal output

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// treepush - publish a set of files to a GitHub branch as one atomic commit
#[derive(Parser, Debug)]
#[command(name = "treepush")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if treepush was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output; implies --no-interactive
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable interactive prompts
    #[arg(long, global = true)]
    pub no_interactive: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Determine if interactive mode is enabled.
    ///
    /// True unless `--no-interactive` or `--quiet` was set, and only when
    /// stdin is a terminal.
    pub fn interactive(&self) -> bool {
        !(self.no_interactive || self.quiet) && std::io::stdin().is_terminal()
    }
}

/// Where to publish and with which credential.
#[derive(Args, Clone, Default)]
pub struct TargetArgs {
    /// Target repository as owner/name or a GitHub URL
    #[arg(long, value_name = "OWNER/NAME")]
    pub repo: Option<String>,

    /// Target branch (must already exist)
    #[arg(long, short)]
    pub branch: Option<String>,

    /// Access token (prefer $TREEPUSH_TOKEN or $GITHUB_TOKEN)
    #[arg(long, value_name = "TOKEN")]
    pub token: Option<String>,
}

impl std::fmt::Debug for TargetArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetArgs")
            .field("repo", &self.repo)
            .field("branch", &self.branch)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Publish files to a branch as one commit
    #[command(
        name = "publish",
        long_about = "Publish files to a branch as one commit.\n\n\
            Uploads every file as a blob, builds a tree on top of the branch head, \
            creates a single commit and advances the branch to it. The branch either \
            moves to a commit containing all files or does not move at all. If someone \
            else pushes to the branch during the publish, nothing is changed and the \
            command fails with a concurrent-modification error.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Publish a built site directory to gh-pages
    treepush publish --repo octocat/site --branch gh-pages --dir ./public -m \"Deploy\"

    # Publish generated files listed in a JSON manifest under docs/
    treepush publish --manifest files.json --prefix docs -m \"Regenerate docs\"

    # Machine-readable result for scripts
    treepush publish --dir out --json

TOKENS:
    The token is read from --token, $TREEPUSH_TOKEN, $GITHUB_TOKEN, or a masked
    prompt, in that order. It is used for this run only and never stored."
    )]
    Publish {
        #[command(flatten)]
        target: TargetArgs,

        /// Commit message
        #[arg(long, short)]
        message: Option<String>,

        /// JSON manifest of {path, content} entries
        #[arg(long, value_name = "FILE", conflicts_with = "dir", required_unless_present = "dir")]
        manifest: Option<PathBuf>,

        /// Directory to publish (hidden and .gitignored files are skipped)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Place all files under this directory in the repository
        #[arg(long)]
        prefix: Option<String>,

        /// Maximum concurrent blob uploads
        #[arg(long)]
        concurrency: Option<usize>,

        /// Create a commit even when nothing changed
        #[arg(long)]
        allow_empty: bool,

        /// Print the job report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Check that a branch can be published to, without writing
    #[command(name = "check")]
    Check {
        #[command(flatten)]
        target: TargetArgs,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show effective configuration and where it came from
    #[command(name = "config")]
    Config,
}
