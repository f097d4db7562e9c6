//! Repository ports backed by the `git` executable.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use deploy::{
    BranchName, CommitSha, FetchInfo, GitError, GitRemote, GitRepository, RefUpdateFlags,
    RemoteName, RepositoryOpener,
};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::refs::{self, RefChange};

/// Runs git commands against local checkouts.
///
/// Every command runs with `GIT_TERMINAL_PROMPT=0` so a remote that asks for
/// credentials fails instead of hanging, with `LC_ALL=C` so its messages can
/// be matched, and is killed if the caller stops waiting for it.
#[derive(Debug, Clone)]
pub struct GitCli {
    program: PathBuf,
}

impl Default for GitCli {
    fn default() -> Self {
        Self {
            program: PathBuf::from("git"),
        }
    }
}

impl GitCli {
    /// Uses `git` from `PATH`.
    pub fn new() -> Self {
        Self::default()
    }

    fn command<I, S>(&self, dir: &Path, args: I) -> (Command, String)
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let rendered = std::iter::once("git".to_string())
            .chain(args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ");

        let mut command = Command::new(&self.program);
        command
            .arg("-C")
            .arg(dir)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        (command, rendered)
    }

    /// Runs a command; returns its exit success and captured stdout/stderr.
    async fn run<I, S>(&self, dir: &Path, args: I) -> Result<RunOutput, GitError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let (mut command, rendered) = self.command(dir, args);
        debug!(command = %rendered, dir = %dir.display(), "running git");
        let output = command.output().await.map_err(|e| GitError::Spawn {
            message: e.to_string(),
        })?;
        Ok(RunOutput {
            command: rendered,
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    /// Runs a command that must succeed; returns its stdout.
    async fn run_checked<I, S>(&self, dir: &Path, args: I) -> Result<String, GitError>
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let output = self.run(dir, args).await?;
        if output.success {
            Ok(output.stdout)
        } else {
            Err(GitError::Command {
                command: output.command,
                stderr: output.stderr,
            })
        }
    }
}

struct RunOutput {
    command: String,
    success: bool,
    stdout: String,
    stderr: String,
}

#[async_trait]
impl RepositoryOpener for GitCli {
    /// Accepts `path` only if it is the top of a working tree. Parent
    /// repositories are not searched.
    async fn open(&self, path: &Path) -> Result<Box<dyn GitRepository>, GitError> {
        let not_a_repository = || GitError::NotARepository {
            path: path.to_path_buf(),
        };
        let requested = tokio::fs::canonicalize(path)
            .await
            .map_err(|_| not_a_repository())?;
        let output = self.run(path, ["rev-parse", "--show-toplevel"]).await?;
        if !output.success {
            debug!(path = %path.display(), stderr = %output.stderr, "not a git working tree");
            return Err(not_a_repository());
        }
        let toplevel = tokio::fs::canonicalize(output.stdout.trim())
            .await
            .map_err(|_| not_a_repository())?;
        if toplevel != requested {
            debug!(
                path = %path.display(),
                toplevel = %toplevel.display(),
                "path is inside a working tree but not its root"
            );
            return Err(not_a_repository());
        }
        Ok(Box::new(GitCliRepository {
            git: self.clone(),
            root: path.to_path_buf(),
        }))
    }
}

// ---------------------------------------------------------------------------

struct GitCliRepository {
    git: GitCli,
    root: PathBuf,
}

#[async_trait]
impl GitRepository for GitCliRepository {
    async fn remote(&self, name: &RemoteName) -> Result<Box<dyn GitRemote>, GitError> {
        let remotes = self.git.run_checked(&self.root, ["remote"]).await?;
        if !remotes.lines().any(|line| line.trim() == name.as_str()) {
            return Err(GitError::RemoteMissing {
                remote: name.clone(),
            });
        }
        Ok(Box::new(GitCliRemote {
            git: self.git.clone(),
            root: self.root.clone(),
            name: name.clone(),
        }))
    }
}

// ---------------------------------------------------------------------------

struct GitCliRemote {
    git: GitCli,
    root: PathBuf,
    name: RemoteName,
}

impl GitCliRemote {
    async fn snapshot(&self) -> Result<refs::RefSnapshot, GitError> {
        let tracking = format!("refs/remotes/{}/", self.name);
        let output = self
            .git
            .run_checked(
                &self.root,
                [
                    "for-each-ref",
                    "--format=%(objectname) %(refname)",
                    tracking.as_str(),
                    "refs/tags/",
                ],
            )
            .await?;
        Ok(refs::parse_snapshot(&output))
    }

    async fn head(&self) -> Option<String> {
        self.git
            .run_checked(&self.root, ["rev-parse", "HEAD"])
            .await
            .ok()
            .map(|out| out.trim().to_string())
    }

    async fn is_ancestor(&self, old: &str, new: &str) -> Result<bool, GitError> {
        let output = self
            .git
            .run(&self.root, ["merge-base", "--is-ancestor", old, new])
            .await?;
        Ok(output.success)
    }

    async fn classify(&self, change: RefChange) -> Result<FetchInfo, GitError> {
        let flags = match (&change.old, change.is_tag()) {
            (None, true) => RefUpdateFlags::NEW_TAG,
            (None, false) => RefUpdateFlags::NEW_HEAD,
            (Some(_), true) => RefUpdateFlags::TAG_UPDATE,
            (Some(old), false) => {
                if self.is_ancestor(old, &change.new).await? {
                    RefUpdateFlags::FAST_FORWARD
                } else {
                    RefUpdateFlags::FORCED_UPDATE
                }
            }
        };
        Ok(FetchInfo {
            reference: change.name,
            flags,
            commit: CommitSha::new(change.new),
        })
    }
}

#[async_trait]
impl GitRemote for GitCliRemote {
    async fn fetch(&self) -> Result<Vec<FetchInfo>, GitError> {
        let before = self.snapshot().await?;
        self.git
            .run_checked(&self.root, ["fetch", self.name.as_str()])
            .await?;
        let after = self.snapshot().await?;

        let mut updates = Vec::new();
        for change in refs::changes(&before, &after) {
            updates.push(self.classify(change).await?);
        }
        debug!(remote = %self.name, updated_refs = updates.len(), "fetch finished");
        Ok(updates)
    }

    async fn pull(&self, branch: &BranchName) -> Result<Vec<FetchInfo>, GitError> {
        let before = self.head().await;
        let output = self
            .git
            .run(
                &self.root,
                ["pull", "--ff-only", self.name.as_str(), branch.as_str()],
            )
            .await?;

        if !output.success {
            if !is_fast_forward_refusal(&output.stderr) {
                return Err(GitError::Command {
                    command: output.command,
                    stderr: output.stderr,
                });
            }
            warn!(
                remote = %self.name,
                branch = %branch,
                stderr = %output.stderr,
                "pull refused: checkout cannot be fast-forwarded"
            );
            return Ok(vec![FetchInfo {
                reference: branch.full_ref(),
                flags: RefUpdateFlags::ERROR | RefUpdateFlags::REJECTED,
                commit: None,
            }]);
        }

        let after = self.head().await.ok_or_else(|| GitError::UnexpectedOutput {
            message: "HEAD does not resolve after pull".to_string(),
        })?;
        let flags = if before.as_deref() == Some(after.as_str()) {
            RefUpdateFlags::HEAD_UPTODATE
        } else {
            RefUpdateFlags::FAST_FORWARD
        };
        Ok(vec![FetchInfo {
            reference: branch.full_ref(),
            flags,
            commit: CommitSha::new(after),
        }])
    }
}

/// `git pull --ff-only` refusing because local and remote history diverged,
/// as opposed to transport, auth or repository failures.
fn is_fast_forward_refusal(stderr: &str) -> bool {
    let stderr = stderr.to_ascii_lowercase();
    ["not possible to fast-forward", "diverging branches", "non-fast-forward"]
        .iter()
        .any(|marker| stderr.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::is_fast_forward_refusal;

    #[test]
    fn only_divergence_counts_as_a_refusal() {
        assert!(is_fast_forward_refusal(
            "hint: Diverging branches can't be fast-forwarded, you need to either:\n\
             fatal: Not possible to fast-forward, aborting."
        ));
        assert!(is_fast_forward_refusal("fatal: Not possible to fast-forward, aborting."));
        assert!(!is_fast_forward_refusal(
            "fatal: '/srv/gone' does not appear to be a git repository"
        ));
        assert!(!is_fast_forward_refusal(
            "fatal: Authentication failed for 'https://github.com/org/repo.git/'"
        ));
    }
}
