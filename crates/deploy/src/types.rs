//! Shared value types for the deploy domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! structured values with invariants (ref-update flag encodings, parsed
//! payloads, handler outcomes) and participate in the deploy decision.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{BranchName, CommitSha, DeliveryId, DeployError, EventName, RemoteName};

// ---------------------------------------------------------------------------
// Ref-update flags
// ---------------------------------------------------------------------------

/// Bit set describing how a fetch or pull moved one reference.
///
/// The encoding is the one used by GitPython's `FetchInfo.flags`, so the
/// numeric values reported in logs line up with what operators of the older
/// deploy hook are used to reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct RefUpdateFlags(u32);

impl RefUpdateFlags {
    pub const NEW_TAG: Self = Self(1);
    pub const NEW_HEAD: Self = Self(2);
    pub const HEAD_UPTODATE: Self = Self(4);
    pub const TAG_UPDATE: Self = Self(8);
    pub const REJECTED: Self = Self(16);
    pub const FORCED_UPDATE: Self = Self(32);
    pub const FAST_FORWARD: Self = Self(64);
    pub const ERROR: Self = Self(128);

    /// The empty flag set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Reconstructs a flag set from its raw bits.
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns `true` if every bit of `other` is set in `self`.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns `true` when the encoded value exceeds the [`Self::ERROR`]
    /// threshold, i.e. the error bit is set together with a qualifying bit.
    pub const fn is_error(self) -> bool {
        self.0 > Self::ERROR.0
    }
}

impl std::ops::BitOr for RefUpdateFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for RefUpdateFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl std::fmt::Display for RefUpdateFlags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------

/// One reference update reported by a fetch or pull.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchInfo {
    /// The local reference that was (or would have been) updated,
    /// e.g. `"refs/remotes/origin/master"`.
    pub reference: String,

    /// How the reference moved.
    pub flags: RefUpdateFlags,

    /// The commit the reference points at after the update.
    ///
    /// `None` when the reference was deleted or the update failed before a
    /// commit could be resolved.
    pub commit: Option<CommitSha>,
}

// ---------------------------------------------------------------------------
// Webhook delivery
// ---------------------------------------------------------------------------

/// An inbound webhook call that has passed admission.
///
/// Lives only for the duration of one request.
#[derive(Debug, Clone)]
pub struct WebhookDelivery {
    /// Value of `X-GitHub-Event`.
    pub event: EventName,

    /// Value of `X-GitHub-Delivery`.
    pub delivery_id: DeliveryId,

    /// Value of `X-Hub-Signature` (`"sha1=<hex>"`).
    pub signature: String,

    /// Value of `X-Hub-Signature-256`, when GitHub sent one.
    pub signature_256: Option<String>,

    /// Raw request body exactly as received; the signature covers these bytes.
    pub body: Vec<u8>,
}

impl WebhookDelivery {
    /// Returns the signature header to verify: the SHA-256 variant when
    /// present, the legacy SHA-1 header otherwise.
    pub fn signature_header(&self) -> &str {
        self.signature_256.as_deref().unwrap_or(&self.signature)
    }
}

// ---------------------------------------------------------------------------

/// The fields of a GitHub `push` payload that the deploy handler reads.
///
/// Only `ref` is required; the rest is used for log context.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushPayload {
    /// Fully qualified ref that was pushed, e.g. `"refs/heads/master"`.
    #[serde(rename = "ref")]
    pub git_ref: String,

    /// Commit the ref pointed at before the push.
    #[serde(default)]
    pub before: Option<String>,

    /// Commit the ref points at after the push.
    #[serde(default)]
    pub after: Option<String>,

    #[serde(default)]
    pub repository: Option<PushRepository>,

    #[serde(default)]
    pub pusher: Option<PushPusher>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushRepository {
    pub full_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PushPusher {
    pub name: String,
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of handling one admitted webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployOutcome {
    /// Informational; no state changed (ping, other events, other branches).
    Acknowledged {
        /// Message returned to the caller.
        message: String,
    },

    /// Nothing changed and the delivery was logged as a failure.
    Failed(DeployError),

    /// The checkout moved to `commit` and a service reload was requested.
    Deployed {
        /// The commit now checked out.
        commit: CommitSha,
    },
}

impl DeployOutcome {
    /// Creates an [`DeployOutcome::Acknowledged`] outcome.
    pub fn acknowledged(message: impl Into<String>) -> Self {
        Self::Acknowledged {
            message: message.into(),
        }
    }

    /// The message returned to the webhook caller in the `msg` key.
    pub fn message(&self) -> String {
        match self {
            Self::Acknowledged { message } => message.clone(),
            Self::Failed(error) => error.to_string(),
            Self::Deployed { commit } => format!("Platform upgraded to commit {commit}"),
        }
    }

    /// Returns `true` if the outcome changed the deployed revision.
    pub fn is_deployed(&self) -> bool {
        matches!(self, Self::Deployed { .. })
    }
}

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Everything the deploy handler needs to know about its environment.
///
/// Built once by the composition root and injected into the synchronizer.
#[derive(Clone)]
pub struct DeploySettings {
    /// Shared secret configured on the GitHub webhook.
    pub secret: String,

    /// Working tree root of the checkout to keep in sync.
    pub repo_path: PathBuf,

    /// Remote to fetch and pull from.
    pub remote: RemoteName,

    /// The single branch this handler deploys.
    pub branch: BranchName,

    /// Upper bound for each of the fetch and pull operations.
    pub git_timeout: Duration,
}

impl std::fmt::Debug for DeploySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploySettings")
            .field("secret", &"<redacted>")
            .field("repo_path", &self.repo_path)
            .field("remote", &self.remote)
            .field("branch", &self.branch)
            .field("git_timeout", &self.git_timeout)
            .finish()
    }
}
