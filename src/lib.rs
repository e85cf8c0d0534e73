//! Release and patch-submission toolkit.
//!
//! This crate turns a tagged revision of a project into a signed,
//! reproducible source tarball, publishes it, and helps prepare patch
//! series and bug reports for downstream packagers. It is used by the
//! `relpipe` binary and can be driven programmatically for testing.
//!
//! # Modules
//!
//! - [`announce`] - Release announcements from `$NAME` templates
//! - [`bug_report`] - Bug reports for the distribution tracker
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - `relpipe.toml` loading
//! - [`error`] - Error types
//! - [`exec`] - External command execution
//! - [`git`] - Repository access, cloning and branching
//! - [`patches`] - Patch series generation
//! - [`release`] - Archive, compress, sign and publish stages

pub mod announce;
pub mod bug_report;
pub mod cli;
pub mod config;
pub mod error;
pub mod exec;
pub mod git;
pub mod patches;
pub mod release;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
