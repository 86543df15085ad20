//! core
//!
//! Core domain types, input loading and configuration.
//!
//! # Modules
//!
//! - [`types`] - Strong types: BranchName, Oid, RepoId, RepoPath
//! - [`input`] - File lists from manifests and directories
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Schemas are strict and reject unknown keys

pub mod config;
pub mod input;
pub mod types;
