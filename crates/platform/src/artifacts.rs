//! Files derived from the deployed checkout.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use deploy::{ArtifactError, ArtifactPublisher, CommitSha};
use tracing::debug;

/// Where the stamp and the CI script live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    /// Generated source file recording the deployed commit.
    pub stamp: PathBuf,
    /// Canonical CI driver script inside the checkout.
    pub ci_script_source: PathBuf,
    /// Served replica of the CI driver script.
    pub ci_script_replica: PathBuf,
}

impl ArtifactPaths {
    /// Lays out the paths for a platform install.
    ///
    /// The CI script is read from `<install>/install/ci-vm/ci-linux/ci/runCI`
    /// and served from `<sample_repository>/vm_data/<vm_name>/runCI`.
    pub fn for_install(
        install_folder: &Path,
        sample_repository: &Path,
        vm_name: &str,
        stamp: impl Into<PathBuf>,
    ) -> Self {
        Self {
            stamp: stamp.into(),
            ci_script_source: install_folder
                .join("install")
                .join("ci-vm")
                .join("ci-linux")
                .join("ci")
                .join("runCI"),
            ci_script_replica: sample_repository
                .join("vm_data")
                .join(vm_name)
                .join("runCI"),
        }
    }
}

/// The stamp file's entire content for `commit`.
pub fn stamp_contents(commit: &CommitSha) -> String {
    format!("build_commit = \"{commit}\"")
}

/// Writes deploy artifacts to the local filesystem.
#[derive(Debug, Clone)]
pub struct FsArtifactPublisher {
    paths: ArtifactPaths,
}

impl FsArtifactPublisher {
    pub fn new(paths: ArtifactPaths) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &ArtifactPaths {
        &self.paths
    }
}

#[async_trait]
impl ArtifactPublisher for FsArtifactPublisher {
    async fn write_stamp(&self, commit: &CommitSha) -> Result<(), ArtifactError> {
        tokio::fs::write(&self.paths.stamp, stamp_contents(commit))
            .await
            .map_err(|source| ArtifactError {
                action: "writing stamp",
                path: self.paths.stamp.clone(),
                source,
            })?;
        debug!(path = %self.paths.stamp.display(), commit = %commit, "stamp written");
        Ok(())
    }

    async fn sync_ci_script(&self) -> Result<(), ArtifactError> {
        let bytes = tokio::fs::copy(&self.paths.ci_script_source, &self.paths.ci_script_replica)
            .await
            .map_err(|source| ArtifactError {
                action: "copying CI script to",
                path: self.paths.ci_script_replica.clone(),
                source,
            })?;
        debug!(
            from = %self.paths.ci_script_source.display(),
            to = %self.paths.ci_script_replica.display(),
            bytes,
            "CI script replica updated"
        );
        Ok(())
    }
}
