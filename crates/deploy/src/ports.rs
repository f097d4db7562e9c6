//! Port traits implemented by the infrastructure crates.
//!
//! The deploy domain defines *what* it needs from the outside world; `git`,
//! `platform`, `github` and `synchronizer` define *how* to supply it. Tests
//! substitute in-memory fakes for every trait here.

use std::path::Path;

use async_trait::async_trait;

use crate::{
    ArtifactError, BranchName, CommitSha, DeployOutcome, FetchInfo, GitError, RangeSourceError,
    ReloadError, RemoteName, WebhookDelivery,
};

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// Source of the provider's published webhook origin ranges.
///
/// Called once per admission check; implementations must not cache.
#[async_trait]
pub trait HookRangeSource: Send + Sync {
    /// Returns the current list of CIDR strings.
    async fn hook_ranges(&self) -> Result<Vec<String>, RangeSourceError>;
}

/// Handles a delivery that has passed admission.
#[async_trait]
pub trait WebhookHandler: Send + Sync {
    async fn handle(&self, delivery: WebhookDelivery) -> DeployOutcome;
}

// ---------------------------------------------------------------------------
// Repository
// ---------------------------------------------------------------------------

/// Opens local git checkouts.
#[async_trait]
pub trait RepositoryOpener: Send + Sync {
    /// Opens the working tree rooted at `path`.
    ///
    /// # Errors
    ///
    /// [`GitError::NotARepository`] if `path` is not a git working tree.
    async fn open(&self, path: &Path) -> Result<Box<dyn GitRepository>, GitError>;
}

/// An opened checkout.
#[async_trait]
pub trait GitRepository: Send + Sync {
    /// Resolves a configured remote.
    ///
    /// # Errors
    ///
    /// [`GitError::RemoteMissing`] if no remote of that name exists.
    async fn remote(&self, name: &RemoteName) -> Result<Box<dyn GitRemote>, GitError>;
}

/// A remote of an opened checkout.
#[async_trait]
pub trait GitRemote: Send + Sync {
    /// Fetches from the remote. Returns one entry per updated reference; an
    /// up-to-date remote yields an empty list.
    async fn fetch(&self) -> Result<Vec<FetchInfo>, GitError>;

    /// Fast-forwards `branch` from the remote. The first entry describes the
    /// branch head after the pull.
    async fn pull(&self, branch: &BranchName) -> Result<Vec<FetchInfo>, GitError>;
}

// ---------------------------------------------------------------------------
// Deploy side effects
// ---------------------------------------------------------------------------

/// Writes the files derived from a successful pull.
#[async_trait]
pub trait ArtifactPublisher: Send + Sync {
    /// Overwrites the deploy stamp with a binding to `commit`.
    async fn write_stamp(&self, commit: &CommitSha) -> Result<(), ArtifactError>;

    /// Copies the CI driver script from the checkout to its served location.
    async fn sync_ci_script(&self) -> Result<(), ArtifactError>;
}

/// Requests a reload of the running platform service.
///
/// Implementations must return as soon as the request is issued; they never
/// wait for the reload itself.
pub trait ServiceReloader: Send + Sync {
    fn request_reload(&self) -> Result<(), ReloadError>;
}
