//! Host platform adapter for the deploy hook.
//!
//! Implements [`deploy::ArtifactPublisher`] with [`FsArtifactPublisher`]
//! (deploy stamp and CI script replica on the local filesystem) and
//! [`deploy::ServiceReloader`] with [`CommandReloader`] (a detached
//! `sudo service platform reload`, or any configured command).
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Filesystem and process control only; no deploy rules.

pub mod artifacts;
pub mod reload;

pub use artifacts::{stamp_contents, ArtifactPaths, FsArtifactPublisher};
pub use reload::CommandReloader;
