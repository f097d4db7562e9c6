//! Core domain for the platform deploy hook.
//!
//! This crate contains every domain concept, newtype identifier, value type,
//! error type and port trait used by the webhook receiver and the deploy
//! synchronizer. Infrastructure crates implement the traits defined here; they
//! never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! Signature verification and range matching are pure functions over bytes
//! and addresses.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`DeliveryId`, `CommitSha`, `BranchName`, etc.) |
//! | [`types`] | Value types (`RefUpdateFlags`, `FetchInfo`, `WebhookDelivery`, `DeployOutcome`) |
//! | [`errors`] | Admission, deploy and port error types |
//! | [`signature`] | Keyed-hash verification of webhook bodies |
//! | [`allowlist`] | Caller-address matching against published ranges |
//! | [`ports`] | Traits implemented by infrastructure crates |

pub mod allowlist;
pub mod errors;
pub mod identifiers;
pub mod ports;
pub mod signature;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use allowlist::{is_allowed, HookRanges};
pub use errors::{
    AdmissionError, ArtifactError, DeployError, DeployErrorKind, GitError, InvalidRange,
    RangeSourceError, ReloadError,
};
pub use identifiers::{BranchName, CommitSha, DeliveryId, EventName, RemoteName};
pub use ports::{
    ArtifactPublisher, GitRemote, GitRepository, HookRangeSource, RepositoryOpener,
    ServiceReloader, WebhookHandler,
};
pub use signature::SignatureAlgorithm;
pub use types::{
    DeployOutcome, DeploySettings, FetchInfo, PushPayload, PushPusher, PushRepository,
    RefUpdateFlags, WebhookDelivery,
};
