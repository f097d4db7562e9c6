//! Error types for the deploy domain.
//!
//! [`AdmissionError`] covers every reason an inbound call is refused before it
//! reaches the deploy handler. [`DeployError`] covers every reason an admitted
//! delivery ends in [`crate::DeployOutcome::Failed`]. Port-level errors
//! ([`GitError`], [`RangeSourceError`], [`ArtifactError`], [`ReloadError`]) are
//! what the infrastructure adapters report; the synchronizer folds them into
//! [`DeployError`].
//!
//! None of these are fatal to the serving process: every one of them ends in a
//! response to the caller.

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::{RefUpdateFlags, RemoteName};

// ---------------------------------------------------------------------------
// Admission
// ---------------------------------------------------------------------------

/// Reasons the webhook gate refuses an inbound call.
#[derive(Debug, Error)]
pub enum AdmissionError {
    /// A required header is absent.
    #[error("{header} not in headers!")]
    MissingHeader {
        /// Canonical name of the missing header.
        header: &'static str,
    },

    /// The body is not declared as JSON.
    #[error("Request is not JSON!")]
    NotJson,

    /// The `User-Agent` does not carry the expected vendor prefix.
    #[error("User-Agent does not begin with {expected_prefix}: {user_agent}")]
    UntrustedUserAgent {
        user_agent: String,
        expected_prefix: String,
    },

    /// The caller address could not be determined.
    #[error("Caller address is unknown")]
    UnknownOrigin,

    /// The caller address is outside every published hook range.
    #[error("Unauthorized attempt to deploy by IP {ip}")]
    UntrustedOrigin { ip: IpAddr },

    /// The hook ranges could not be fetched.
    #[error("Hook ranges unavailable: {0}")]
    RangeSource(#[from] RangeSourceError),

    /// The hook range metadata contains an entry that is not a network.
    #[error(transparent)]
    InvalidRange(#[from] InvalidRange),
}

impl AdmissionError {
    /// Returns `true` for rejections caused by configuration or upstream
    /// metadata rather than by the caller.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::RangeSource(_) | Self::InvalidRange(_))
    }
}

/// A hook range entry that is neither a CIDR block nor a bare address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid network range in hook metadata: {entry:?}")]
pub struct InvalidRange {
    /// The offending entry, verbatim.
    pub entry: String,
}

/// Failures fetching the provider's published hook ranges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangeSourceError {
    /// Transport-level failure (DNS, TLS, connection reset).
    #[error("Metadata request failed: {message}")]
    Transport { message: String },

    /// The metadata endpoint answered with a non-success status.
    #[error("Metadata endpoint returned HTTP {status}")]
    Status { status: u16 },

    /// The metadata endpoint did not answer within the configured timeout.
    #[error("Metadata request timed out")]
    Timeout,

    /// The response body is not the expected JSON document.
    #[error("Metadata response is malformed: {message}")]
    Malformed { message: String },
}

// ---------------------------------------------------------------------------
// Deploy
// ---------------------------------------------------------------------------

/// Coarse classification of [`DeployError`], used for log levels and metrics
/// labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeployErrorKind {
    /// The body was not signed with the shared secret.
    SignatureInvalid,
    /// The body is not a usable push payload.
    PayloadInvalid,
    /// The checkout or its remote is misconfigured; needs an operator.
    RepositoryError,
    /// The remote had nothing new, or the update was refused.
    SyncNoOp,
    /// A git command, timeout or artifact write failed.
    Operational,
}

/// Reasons an admitted delivery ends without deploying.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
    #[error("Deploy signature failed")]
    SignatureInvalid,

    #[error("Deploy payload is invalid: {message}")]
    PayloadInvalid { message: String },

    #[error("Folder is not a valid git directory")]
    NotARepository { path: PathBuf },

    #[error("Remote {remote} does not exist")]
    RemoteMissing { remote: RemoteName },

    #[error("Didn't fetch any information from remote!")]
    NothingFetched,

    #[error("Didn't pull any information from remote!")]
    NothingPulled,

    #[error("Pull from remote reported an error (flags {flags})")]
    PullRejected { flags: RefUpdateFlags },

    #[error("Git command failed: {message}")]
    Git { message: String },

    /// The git process was killed mid-operation and may have left
    /// `.git/*.lock` files behind.
    #[error(
        "{operation} did not finish within {after:?} and was stopped; \
         check {} for stale .git/*.lock files",
        .repo.display()
    )]
    Timeout {
        operation: &'static str,
        after: Duration,
        repo: PathBuf,
    },

    #[error("Could not update deploy artifacts: {message}")]
    Artifact { message: String },
}

impl DeployError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            Self::SignatureInvalid => DeployErrorKind::SignatureInvalid,
            Self::PayloadInvalid { .. } => DeployErrorKind::PayloadInvalid,
            Self::NotARepository { .. } | Self::RemoteMissing { .. } => {
                DeployErrorKind::RepositoryError
            }
            Self::NothingFetched | Self::NothingPulled | Self::PullRejected { .. } => {
                DeployErrorKind::SyncNoOp
            }
            Self::Git { .. } | Self::Timeout { .. } | Self::Artifact { .. } => {
                DeployErrorKind::Operational
            }
        }
    }
}

impl From<GitError> for DeployError {
    fn from(error: GitError) -> Self {
        match error {
            GitError::NotARepository { path } => Self::NotARepository { path },
            GitError::RemoteMissing { remote } => Self::RemoteMissing { remote },
            other => Self::Git {
                message: other.to_string(),
            },
        }
    }
}

impl From<ArtifactError> for DeployError {
    fn from(error: ArtifactError) -> Self {
        Self::Artifact {
            message: error.to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Port errors
// ---------------------------------------------------------------------------

/// Failures reported by a [`crate::ports::RepositoryOpener`] and the handles it returns.
#[derive(Debug, Error)]
pub enum GitError {
    #[error("{path} is not a git repository")]
    NotARepository { path: PathBuf },

    #[error("remote {remote} is not configured")]
    RemoteMissing { remote: RemoteName },

    /// The git executable could not be started.
    #[error("could not run git: {message}")]
    Spawn { message: String },

    /// A git command exited unsuccessfully.
    #[error("`{command}` failed: {stderr}")]
    Command { command: String, stderr: String },

    /// Git produced output this adapter does not understand.
    #[error("unexpected git output: {message}")]
    UnexpectedOutput { message: String },
}

/// Failures writing the stamp file or the CI script replica.
#[derive(Debug, Error)]
#[error("{action} {path}: {source}")]
pub struct ArtifactError {
    /// What was being attempted, e.g. `"writing stamp"`.
    pub action: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Failures requesting a service reload.
#[derive(Debug, Error)]
pub enum ReloadError {
    #[error("reload command is empty")]
    EmptyCommand,

    #[error("could not start `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deploy_error_kinds_follow_the_taxonomy() {
        assert_eq!(DeployError::SignatureInvalid.kind(), DeployErrorKind::SignatureInvalid);
        assert_eq!(
            DeployError::RemoteMissing {
                remote: RemoteName::new("origin").unwrap()
            }
            .kind(),
            DeployErrorKind::RepositoryError
        );
        assert_eq!(DeployError::NothingFetched.kind(), DeployErrorKind::SyncNoOp);
        assert_eq!(
            DeployError::PullRejected {
                flags: RefUpdateFlags::ERROR | RefUpdateFlags::REJECTED
            }
            .kind(),
            DeployErrorKind::SyncNoOp
        );
        assert_eq!(
            DeployError::Timeout {
                operation: "fetch",
                after: Duration::from_secs(1),
                repo: PathBuf::from("/srv/platform"),
            }
            .kind(),
            DeployErrorKind::Operational
        );
    }

    #[test]
    fn git_errors_map_onto_repository_failures() {
        let err: DeployError = GitError::NotARepository {
            path: PathBuf::from("/tmp/x"),
        }
        .into();
        assert_eq!(err.to_string(), "Folder is not a valid git directory");

        let err: DeployError = GitError::RemoteMissing {
            remote: RemoteName::new("origin").unwrap(),
        }
        .into();
        assert_eq!(err.to_string(), "Remote origin does not exist");

        let err: DeployError = GitError::Command {
            command: "git fetch".to_string(),
            stderr: "fatal: unable to access".to_string(),
        }
        .into();
        assert_eq!(err.kind(), DeployErrorKind::Operational);
    }

    #[test]
    fn admission_error_messages_name_the_cause() {
        assert_eq!(
            AdmissionError::MissingHeader {
                header: "X-Github-Event"
            }
            .to_string(),
            "X-Github-Event not in headers!"
        );
        let ip: IpAddr = "10.0.0.1".parse().unwrap();
        assert_eq!(
            AdmissionError::UntrustedOrigin { ip }.to_string(),
            "Unauthorized attempt to deploy by IP 10.0.0.1"
        );
        assert!(AdmissionError::from(InvalidRange {
            entry: "nope".to_string()
        })
        .is_configuration_error());
        assert!(!AdmissionError::NotJson.is_configuration_error());
    }
}
