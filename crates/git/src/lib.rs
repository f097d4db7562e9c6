//! Git infrastructure adapter for the platform deploy hook.
//!
//! Implements [`deploy::RepositoryOpener`], [`deploy::GitRepository`] and
//! [`deploy::GitRemote`] by running the `git` executable through
//! `tokio::process`. Fetch results are derived by diffing the remote-tracking
//! and tag references before and after the fetch, and are reported with the
//! [`deploy::RefUpdateFlags`] encoding the synchronizer understands.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Process spawning and output parsing live here. The
//! [`deploy`] crate sees only the port traits.

mod command;
mod refs;

pub use command::GitCli;
