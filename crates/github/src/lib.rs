//! GitHub infrastructure adapter for the deploy hook.
//!
//! Implements [`deploy::HookRangeSource`] with [`GitHubMetaClient`], which
//! reads the `hooks` array from GitHub's meta endpoint
//! (`https://api.github.com/meta`): the CIDR blocks webhook deliveries
//! originate from.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** HTTP transport, headers, timeouts and response parsing
//! live here. The [`deploy`] crate sees only [`deploy::HookRangeSource`].
//!
//! No caching: GitHub rotates these ranges, and a revoked range must stop
//! being accepted on the very next delivery.

pub mod meta;

pub use meta::{GitHubMetaClient, DEFAULT_META_URL};
