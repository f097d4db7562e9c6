//! Reference snapshots and the differences between them.
//!
//! A fetch is described by comparing the remote-tracking and tag references
//! before and after it runs. This gives full object ids and works with every
//! git version, unlike parsing the human-oriented fetch summary.

use std::collections::BTreeMap;

/// Reference name → object id.
pub(crate) type RefSnapshot = BTreeMap<String, String>;

/// Parses `git for-each-ref --format='%(objectname) %(refname)'` output.
pub(crate) fn parse_snapshot(output: &str) -> RefSnapshot {
    output
        .lines()
        .filter_map(|line| {
            let (object, name) = line.trim().split_once(' ')?;
            Some((name.to_string(), object.to_string()))
        })
        .collect()
}

/// One reference that moved between two snapshots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RefChange {
    pub(crate) name: String,
    /// `None` when the reference did not exist before.
    pub(crate) old: Option<String>,
    pub(crate) new: String,
}

impl RefChange {
    pub(crate) fn is_tag(&self) -> bool {
        self.name.starts_with("refs/tags/")
    }
}

/// Lists references that were created or moved. Deleted references are not
/// reported; a plain fetch never prunes.
pub(crate) fn changes(before: &RefSnapshot, after: &RefSnapshot) -> Vec<RefChange> {
    after
        .iter()
        .filter_map(|(name, new)| match before.get(name) {
            Some(old) if old == new => None,
            old => Some(RefChange {
                name: name.clone(),
                old: old.cloned(),
                new: new.clone(),
            }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: &str = "1111111111111111111111111111111111111111";
    const B: &str = "2222222222222222222222222222222222222222";

    #[test]
    fn parses_for_each_ref_lines() {
        let snapshot = parse_snapshot(&format!(
            "{A} refs/remotes/origin/master\n{B} refs/tags/v1.0\n\n"
        ));
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot["refs/remotes/origin/master"], A);
        assert_eq!(snapshot["refs/tags/v1.0"], B);
    }

    #[test]
    fn identical_snapshots_have_no_changes() {
        let snapshot = parse_snapshot(&format!("{A} refs/remotes/origin/master"));
        assert!(changes(&snapshot, &snapshot).is_empty());
    }

    #[test]
    fn reports_created_and_moved_refs_only() {
        let before = parse_snapshot(&format!(
            "{A} refs/remotes/origin/master\n{A} refs/remotes/origin/gone"
        ));
        let after = parse_snapshot(&format!(
            "{B} refs/remotes/origin/master\n{B} refs/tags/v2"
        ));

        let changes = changes(&before, &after);

        assert_eq!(
            changes,
            vec![
                RefChange {
                    name: "refs/remotes/origin/master".to_string(),
                    old: Some(A.to_string()),
                    new: B.to_string(),
                },
                RefChange {
                    name: "refs/tags/v2".to_string(),
                    old: None,
                    new: B.to_string(),
                },
            ]
        );
        assert!(!changes[0].is_tag());
        assert!(changes[1].is_tag());
    }
}
