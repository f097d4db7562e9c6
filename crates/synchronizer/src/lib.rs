//! Deploy synchronizer for the platform deploy hook.
//!
//! This crate provides [`DeploySynchronizer`], the implementation of
//! [`deploy::WebhookHandler`] that turns an admitted push delivery into a
//! fetch → pull → stamp → CI-script copy → reload sequence, and
//! [`RepoLocks`], which serialises those sequences per repository path.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** The synchronizer sequences calls between the
//! business rules in the [`deploy`] crate and the infrastructure ports (git,
//! filesystem, service manager). It performs no I/O of its own.

pub mod locks;
pub mod handler;

pub use locks::RepoLocks;
pub use handler::DeploySynchronizer;
