//! Newtype domain identifiers.
//!
//! Every string that names something in a webhook delivery or in the local
//! checkout is wrapped in a distinct newtype. This prevents accidentally
//! interchanging, for example, a [`DeliveryId`] with a [`CommitSha`] even
//! though both are plain strings on the wire.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Macro for String-wrapped newtypes.
// Generates: struct, new() returning Option<Self>, as_str(), Display.
// ---------------------------------------------------------------------------
macro_rules! string_id {
    (
        $(#[$attr:meta])*
        $name:ident
    ) => {
        $(#[$attr])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Creates a new identifier, returning `None` if the value is empty.
            pub fn new(value: impl Into<String>) -> Option<Self> {
                let v = value.into();
                if v.is_empty() { None } else { Some(Self(v)) }
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Webhook delivery identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// The GitHub event name carried in `X-GitHub-Event` (e.g. `"push"`, `"ping"`).
    EventName
}

impl EventName {
    /// Sent once by GitHub when a hook is created or its "ping" is redelivered.
    pub const PING: &'static str = "ping";

    /// The only event that triggers a deploy.
    pub const PUSH: &'static str = "push";

    /// Returns `true` for the `ping` event.
    pub fn is_ping(&self) -> bool {
        self.0 == Self::PING
    }

    /// Returns `true` for the `push` event.
    pub fn is_push(&self) -> bool {
        self.0 == Self::PUSH
    }
}

string_id! {
    /// The GUID GitHub assigns to one delivery (`X-GitHub-Delivery`).
    ///
    /// Redeliveries reuse the same id, which makes it the natural correlation
    /// key for log records.
    DeliveryId
}

// ---------------------------------------------------------------------------
// Git identifiers
// ---------------------------------------------------------------------------

string_id! {
    /// A Git commit SHA (40-character lowercase hex string).
    CommitSha
}

string_id! {
    /// A Git branch name without the `refs/heads/` prefix (e.g. `"master"`).
    BranchName
}

impl BranchName {
    /// Returns the fully qualified ref, as carried in a push payload's `ref` field.
    pub fn full_ref(&self) -> String {
        format!("refs/heads/{}", self.0)
    }

    /// Returns `true` if `git_ref` names this branch.
    pub fn matches_ref(&self, git_ref: &str) -> bool {
        git_ref
            .strip_prefix("refs/heads/")
            .is_some_and(|name| name == self.0)
    }
}

string_id! {
    /// The name of a configured remote in the local checkout (normally `"origin"`).
    RemoteName
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_identifiers_are_rejected() {
        assert!(CommitSha::new("").is_none());
        assert!(DeliveryId::new(String::new()).is_none());
        assert_eq!(RemoteName::new("origin").unwrap().as_str(), "origin");
    }

    #[test]
    fn event_name_classifies_ping_and_push() {
        assert!(EventName::new("ping").unwrap().is_ping());
        assert!(EventName::new("push").unwrap().is_push());
        let issues = EventName::new("issues").unwrap();
        assert!(!issues.is_ping());
        assert!(!issues.is_push());
    }

    #[test]
    fn branch_matches_only_its_own_head_ref() {
        let master = BranchName::new("master").unwrap();
        assert_eq!(master.full_ref(), "refs/heads/master");
        assert!(master.matches_ref("refs/heads/master"));
        assert!(!master.matches_ref("refs/heads/master-old"));
        assert!(!master.matches_ref("refs/tags/master"));
        assert!(!master.matches_ref("master"));
    }
}
