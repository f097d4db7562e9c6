//! The deploy state machine.
//!
//! [`DeploySynchronizer`] takes a delivery that has already passed the webhook
//! gate and decides, in order:
//!
//! 1. `ping` ⇒ acknowledge.
//! 2. anything but `push` ⇒ acknowledge.
//! 3. signature mismatch ⇒ fail.
//! 4. unparsable payload ⇒ fail.
//! 5. push to another branch ⇒ acknowledge.
//! 6. open repository, resolve remote, fetch, pull; each can fail.
//! 7. write stamp, copy CI script, request reload ⇒ deployed.
//!
//! Steps 6 and 7's file writes run under the repository's lock from
//! [`RepoLocks`]. The reload request is issued after the lock is released and
//! never awaited.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use deploy::{
    signature, ArtifactPublisher, CommitSha, DeployError, DeployErrorKind, DeployOutcome,
    DeploySettings, GitError, PushPayload, RepositoryOpener, ServiceReloader, WebhookDelivery,
    WebhookHandler,
};
use tracing::{debug, error, info, instrument, warn};

use crate::RepoLocks;

/// Applies validated push deliveries to the local checkout.
pub struct DeploySynchronizer {
    settings: DeploySettings,
    opener: Arc<dyn RepositoryOpener>,
    artifacts: Arc<dyn ArtifactPublisher>,
    reloader: Arc<dyn ServiceReloader>,
    locks: RepoLocks,
}

impl DeploySynchronizer {
    /// Creates a synchronizer with its own lock table.
    pub fn new(
        settings: DeploySettings,
        opener: Arc<dyn RepositoryOpener>,
        artifacts: Arc<dyn ArtifactPublisher>,
        reloader: Arc<dyn ServiceReloader>,
    ) -> Self {
        Self {
            settings,
            opener,
            artifacts,
            reloader,
            locks: RepoLocks::new(),
        }
    }

    /// Runs the full decision sequence for one delivery.
    #[instrument(skip_all, fields(delivery_id = %delivery.delivery_id, event = %delivery.event))]
    pub async fn handle_delivery(&self, delivery: &WebhookDelivery) -> DeployOutcome {
        if delivery.event.is_ping() {
            info!("deploy endpoint pinged");
            return DeployOutcome::acknowledged("Hi!");
        }
        if !delivery.event.is_push() {
            info!("deploy endpoint received an event other than push");
            return DeployOutcome::acknowledged("Wrong event type");
        }

        let signature_header = delivery.signature_header();
        if !signature::verify(signature_header, &delivery.body, &self.settings.secret) {
            warn!(signature = %signature_header, "deploy signature failed");
            return DeployOutcome::Failed(DeployError::SignatureInvalid);
        }

        let payload: PushPayload = match serde_json::from_slice(&delivery.body) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, "deploy payload is invalid");
                return DeployOutcome::Failed(DeployError::PayloadInvalid {
                    message: e.to_string(),
                });
            }
        };

        if !self.settings.branch.matches_ref(&payload.git_ref) {
            info!(git_ref = %payload.git_ref, "push to an untracked ref ignored");
            return DeployOutcome::acknowledged(format!("Not {}; ignoring", self.settings.branch));
        }

        let synced = {
            let _guard = self.locks.lock(&self.settings.repo_path).await;
            self.sync(&payload).await
        };

        match synced {
            Ok(commit) => {
                if let Err(e) = self.reloader.request_reload() {
                    error!(error = %e, "could not request platform reload");
                }
                info!(commit = %commit, "platform upgraded");
                DeployOutcome::Deployed { commit }
            }
            Err(e) => {
                log_failure(&e);
                DeployOutcome::Failed(e)
            }
        }
    }

    async fn sync(&self, payload: &PushPayload) -> Result<CommitSha, DeployError> {
        debug!(
            after = payload.after.as_deref().unwrap_or("-"),
            repository = payload.repository.as_ref().map_or("-", |r| r.full_name.as_str()),
            pusher = payload.pusher.as_ref().map_or("-", |p| p.name.as_str()),
            "syncing checkout"
        );

        let repository = self.opener.open(&self.settings.repo_path).await?;
        let remote = repository.remote(&self.settings.remote).await?;

        let fetched = self.bounded("fetch", remote.fetch()).await?;
        if fetched.is_empty() {
            return Err(DeployError::NothingFetched);
        }
        debug!(updated_refs = fetched.len(), "fetched from remote");

        let pulled = self
            .bounded("pull", remote.pull(&self.settings.branch))
            .await?;
        let head = pulled.first().ok_or(DeployError::NothingPulled)?;
        if head.flags.is_error() {
            return Err(DeployError::PullRejected { flags: head.flags });
        }
        let commit = head.commit.clone().ok_or(DeployError::NothingPulled)?;

        self.artifacts.write_stamp(&commit).await?;
        self.artifacts.sync_ci_script().await?;
        Ok(commit)
    }

    async fn bounded<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = Result<T, GitError>>,
    ) -> Result<T, DeployError> {
        let after = self.settings.git_timeout;
        match tokio::time::timeout(after, future).await {
            Ok(result) => result.map_err(DeployError::from),
            Err(_) => Err(DeployError::Timeout {
                operation,
                after,
                repo: self.settings.repo_path.clone(),
            }),
        }
    }
}

fn log_failure(e: &DeployError) {
    match e.kind() {
        DeployErrorKind::SyncNoOp => warn!(error = %e, "deploy made no change"),
        DeployErrorKind::SignatureInvalid | DeployErrorKind::PayloadInvalid => {
            warn!(error = %e, "deploy rejected")
        }
        DeployErrorKind::RepositoryError | DeployErrorKind::Operational => {
            error!(error = %e, "deploy failed")
        }
    }
}

#[async_trait]
impl WebhookHandler for DeploySynchronizer {
    async fn handle(&self, delivery: WebhookDelivery) -> DeployOutcome {
        self.handle_delivery(&delivery).await
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
