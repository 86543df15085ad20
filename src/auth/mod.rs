//! auth
//!
//! Credentials for talking to the repository host.
//!
//! # Security
//!
//! Tokens must never appear in:
//! - logs (including `--debug`)
//! - JSON outputs
//! - error messages
//! - debug output
//!
//! A token lives exactly as long as the publish that uses it; nothing in
//! this crate persists it.

mod credential;

pub use credential::{Credential, CredentialError, TokenScope};
