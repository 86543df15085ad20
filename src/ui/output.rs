//! ui::output
//!
//! Output formatting and display.
//!
//! # Design
//!
//! Output is formatted consistently and respects the quiet flag.
//! When `--json` is enabled, output is machine-readable JSON on stdout and
//! human-readable text is suppressed.

use std::fmt::Display;

use serde::Serialize;

use crate::publish::{PublishError, PublishOutcome};

/// Output verbosity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Quiet mode - minimal output
    Quiet,
    /// Normal mode - standard output
    Normal,
    /// Debug mode - verbose output
    Debug,
}

impl Verbosity {
    /// Create verbosity from flags.
    pub fn from_flags(quiet: bool, debug: bool) -> Self {
        if quiet {
            Verbosity::Quiet
        } else if debug {
            Verbosity::Debug
        } else {
            Verbosity::Normal
        }
    }
}

/// Print a message (respects quiet mode).
pub fn print(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        println!("{}", message);
    }
}

/// Print an error message (always shown).
pub fn error(message: impl Display) {
    eprintln!("error: {}", message);
}

/// Print a warning message (respects quiet mode).
pub fn warn(message: impl Display, verbosity: Verbosity) {
    if verbosity != Verbosity::Quiet {
        eprintln!("warning: {}", message);
    }
}

/// Print a value as pretty JSON on stdout.
pub fn json<T: Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One-line summary of a publish outcome.
pub fn format_outcome(outcome: &PublishOutcome, branch: &str) -> String {
    match outcome {
        PublishOutcome::Published {
            commit,
            parent,
            files,
            ..
        } => format!(
            "Published {} file{} to {} ({} -> {})",
            files,
            if *files == 1 { "" } else { "s" },
            branch,
            parent.short(7),
            commit.short(7)
        ),
        PublishOutcome::Unchanged { head, .. } => format!(
            "Nothing to publish: {} already matches ({})",
            branch,
            head.short(7)
        ),
    }
}

/// Multi-line description of a failed publish, with guidance when available.
pub fn format_failure(err: &PublishError) -> String {
    let mut out = format!("[{}] {}", err.class(), err);
    if let Some(guidance) = err.guidance() {
        out.push_str("\n  hint: ");
        out.push_str(&guidance);
    }
    out
}
