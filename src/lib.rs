//! treepush - Publish a set of files to a GitHub branch as one atomic commit
//!
//! treepush takes a flat list of `{path, content}` files and writes them to
//! an existing branch through the host's object API: blobs, then a tree
//! layered on the current head, then a single-parent commit, then a
//! fast-forward ref update. Either the branch moves to a commit holding every
//! file, or it does not move at all.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to the publisher)
//! - [`publish`] - The publish state machine and its steps
//! - [`forge`] - Repository host abstraction (GitHub, in-memory)
//! - [`core`] - Domain types, input loading, configuration
//! - [`auth`] - Per-call credentials
//! - [`ui`] - Output, prompts and progress display
//!
//! # Correctness Invariants
//!
//! 1. The branch ref is the only externally visible change, and it is written last
//! 2. The ref only ever fast-forwards from the head that was read
//! 3. Tokens are never logged, persisted or echoed

pub mod auth;
pub mod cli;
pub mod core;
pub mod forge;
pub mod publish;
pub mod ui;
