//! ui::prompts
//!
//! Interactive prompts.
//!
//! # Design
//!
//! Prompts are only shown in interactive mode. In non-interactive mode,
//! values that would be prompted for must come from flags, environment or
//! config, or the command fails with a clear error message.

use std::io::{self, BufRead, Write};

use thiserror::Error;

/// Errors from prompts.
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt cancelled by user")]
    Cancelled,

    #[error("not in interactive mode")]
    NotInteractive,

    #[error("IO error: {0}")]
    IoError(String),
}

/// Prompt for a line of text.
///
/// An empty answer returns `default` when there is one.
pub fn input(message: &str, default: Option<&str>, interactive: bool) -> Result<String, PromptError> {
    if !interactive {
        return Err(PromptError::NotInteractive);
    }
    match default {
        Some(d) => eprint!("{} [{}]: ", message, d),
        None => eprint!("{}: ", message),
    }
    io::stderr()
        .flush()
        .map_err(|e| PromptError::IoError(e.to_string()))?;

    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| PromptError::IoError(e.to_string()))?;
    if read == 0 {
        return Err(PromptError::Cancelled);
    }
    let line = line.trim();
    match (line.is_empty(), default) {
        (true, Some(d)) => Ok(d.to_string()),
        _ => Ok(line.to_string()),
    }
}

/// Prompt for masked input (tokens).
///
/// The input is not echoed to the terminal.
pub fn password(message: &str, interactive: bool) -> Result<String, PromptError> {
    if !interactive {
        return Err(PromptError::NotInteractive);
    }
    let value = rpassword::prompt_password(format!("{}: ", message))
        .map_err(|e| PromptError::IoError(e.to_string()))?;
    if value.is_empty() {
        return Err(PromptError::Cancelled);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_interactive_refuses() {
        assert!(matches!(
            password("Token", false),
            Err(PromptError::NotInteractive)
        ));
        assert!(matches!(
            input("Message", Some("x"), false),
            Err(PromptError::NotInteractive)
        ));
    }
}
