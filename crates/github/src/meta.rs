//! Client for GitHub's meta endpoint.

use std::time::Duration;

use async_trait::async_trait;
use deploy::{HookRangeSource, RangeSourceError};
use reqwest::header::ACCEPT;
use serde::Deserialize;
use tracing::{debug, instrument};

/// Public GitHub meta endpoint.
pub const DEFAULT_META_URL: &str = "https://api.github.com/meta";

/// The part of the meta document this client reads.
#[derive(Debug, Deserialize)]
struct MetaDocument {
    hooks: Vec<String>,
}

/// Fetches webhook origin ranges from a GitHub meta endpoint.
#[derive(Debug, Clone)]
pub struct GitHubMetaClient {
    http: reqwest::Client,
    meta_url: String,
}

impl GitHubMetaClient {
    /// Creates a client for `meta_url`.
    ///
    /// GitHub rejects API requests without a `User-Agent`, so one is always
    /// sent. `timeout` bounds the whole request including the body.
    ///
    /// # Errors
    ///
    /// [`RangeSourceError::Transport`] if the HTTP client cannot be built
    /// (e.g. TLS backend initialisation failure).
    pub fn new(
        meta_url: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, RangeSourceError> {
        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| RangeSourceError::Transport {
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            meta_url: meta_url.into(),
        })
    }
}

fn transport_error(e: reqwest::Error) -> RangeSourceError {
    if e.is_timeout() {
        RangeSourceError::Timeout
    } else {
        RangeSourceError::Transport {
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl HookRangeSource for GitHubMetaClient {
    #[instrument(skip(self), fields(url = %self.meta_url))]
    async fn hook_ranges(&self) -> Result<Vec<String>, RangeSourceError> {
        let response = self
            .http
            .get(&self.meta_url)
            .header(ACCEPT, "application/vnd.github+json")
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RangeSourceError::Status {
                status: status.as_u16(),
            });
        }

        let document: MetaDocument = response.json().await.map_err(|e| {
            if e.is_timeout() {
                RangeSourceError::Timeout
            } else {
                RangeSourceError::Malformed {
                    message: e.to_string(),
                }
            }
        })?;
        debug!(ranges = document.hooks.len(), "hook ranges fetched");
        Ok(document.hooks)
    }
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
