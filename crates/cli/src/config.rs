//! `deployhook.toml` loading and validation.
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:5000"
//!
//! [deploy]
//! install_folder = "/opt/platform"
//! sample_repository = "/srv/sample-platform"
//! vm_name = "linux-ci"
//! ```
//!
//! Everything except the secret and the three deploy paths has a default.
//! The secret may come from the file or from `DEPLOYHOOK_SECRET`; the
//! environment wins.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use axum::http::StatusCode;
use deploy::{BranchName, DeploySettings, RemoteName};
use listener::GateSettings;
use platform::ArtifactPaths;
use serde::Deserialize;
use thiserror::Error;

/// Environment variable that supplies or overrides `deploy.secret`.
pub const SECRET_ENV: &str = "DEPLOYHOOK_SECRET";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("deploy.secret is empty; set it in the file or via {SECRET_ENV}")]
    MissingSecret,

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("server.reject_status {status} is not a 4xx or 5xx status")]
    InvalidRejectStatus { status: u16 },

    #[error("{field} must be greater than zero")]
    ZeroTimeout { field: &'static str },
}

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub bind: SocketAddr,
    /// Status returned for every gate rejection.
    pub reject_status: u16,
    /// Take the caller IP from `X-Forwarded-For` (reverse proxy deployments).
    pub trust_forwarded_for: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 5000)),
            reject_status: listener::DEFAULT_REJECT_STATUS.as_u16(),
            trust_forwarded_for: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GitHubSection {
    pub meta_url: String,
    /// Sent on metadata requests.
    pub user_agent: String,
    /// Required prefix of the inbound `User-Agent`.
    pub user_agent_prefix: String,
    pub timeout_secs: u64,
}

impl Default for GitHubSection {
    fn default() -> Self {
        Self {
            meta_url: github::DEFAULT_META_URL.to_string(),
            user_agent: concat!("deployhook/", env!("CARGO_PKG_VERSION")).to_string(),
            user_agent_prefix: listener::GITHUB_USER_AGENT_PREFIX.to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeploySection {
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_remote")]
    pub remote: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default = "default_git_timeout_secs")]
    pub git_timeout_secs: u64,
    /// Root of the platform checkout: synced by git and source of the CI
    /// script.
    pub install_folder: PathBuf,
    pub sample_repository: PathBuf,
    pub vm_name: String,
    #[serde(default = "default_stamp_path")]
    pub stamp_path: PathBuf,
    #[serde(default = "default_reload_command")]
    pub reload_command: Vec<String>,
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "master".to_string()
}

fn default_git_timeout_secs() -> u64 {
    120
}

fn default_stamp_path() -> PathBuf {
    PathBuf::from("build_commit.py")
}

fn default_reload_command() -> Vec<String> {
    ["sudo", "service", "platform", "reload"]
        .into_iter()
        .map(String::from)
        .collect()
}

impl std::fmt::Debug for DeploySection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploySection")
            .field("secret", &"<redacted>")
            .field("remote", &self.remote)
            .field("branch", &self.branch)
            .field("git_timeout_secs", &self.git_timeout_secs)
            .field("install_folder", &self.install_folder)
            .field("sample_repository", &self.sample_repository)
            .field("vm_name", &self.vm_name)
            .field("stamp_path", &self.stamp_path)
            .field("reload_command", &self.reload_command)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySection {
    pub log_format: LogFormat,
    /// OTLP gRPC collector; spans are only exported when set.
    pub otlp_endpoint: Option<String>,
    pub service_name: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Pretty,
            otlp_endpoint: None,
            service_name: "deployhook".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// CliConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CliConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub github: GitHubSection,
    pub deploy: DeploySection,
    #[serde(default)]
    pub telemetry: TelemetrySection,
}

impl CliConfig {
    /// Reads `path`, applies `DEPLOYHOOK_SECRET` and validates the result.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = toml::from_str::<Self>(&text)
            .map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
            .with_secret_override(std::env::var(SECRET_ENV).ok());
        config.validate()?;
        Ok(config)
    }

    /// Replaces the secret when `secret` is set and non-empty.
    pub fn with_secret_override(mut self, secret: Option<String>) -> Self {
        if let Some(secret) = secret.filter(|s| !s.is_empty()) {
            self.deploy.secret = secret;
        }
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.deploy.secret.is_empty() {
            return Err(ConfigError::MissingSecret);
        }
        for (field, value) in [
            ("deploy.remote", self.deploy.remote.as_str()),
            ("deploy.branch", self.deploy.branch.as_str()),
            ("deploy.vm_name", self.deploy.vm_name.as_str()),
        ] {
            if value.is_empty() {
                return Err(ConfigError::EmptyField { field });
            }
        }
        if self.deploy.reload_command.first().map_or(true, String::is_empty) {
            return Err(ConfigError::EmptyField {
                field: "deploy.reload_command",
            });
        }
        if !(400..=599).contains(&self.server.reject_status) {
            return Err(ConfigError::InvalidRejectStatus {
                status: self.server.reject_status,
            });
        }
        if self.deploy.git_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout {
                field: "deploy.git_timeout_secs",
            });
        }
        if self.github.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout {
                field: "github.timeout_secs",
            });
        }
        Ok(())
    }

    pub fn deploy_settings(&self) -> Result<DeploySettings, ConfigError> {
        let remote = RemoteName::new(self.deploy.remote.as_str()).ok_or(ConfigError::EmptyField {
            field: "deploy.remote",
        })?;
        let branch = BranchName::new(self.deploy.branch.as_str()).ok_or(ConfigError::EmptyField {
            field: "deploy.branch",
        })?;
        Ok(DeploySettings {
            secret: self.deploy.secret.clone(),
            repo_path: self.deploy.install_folder.clone(),
            remote,
            branch,
            git_timeout: Duration::from_secs(self.deploy.git_timeout_secs),
        })
    }

    pub fn gate_settings(&self) -> Result<GateSettings, ConfigError> {
        let reject_status = StatusCode::from_u16(self.server.reject_status)
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .ok_or(ConfigError::InvalidRejectStatus {
                status: self.server.reject_status,
            })?;
        Ok(GateSettings {
            reject_status,
            user_agent_prefix: self.github.user_agent_prefix.clone(),
            trust_forwarded_for: self.server.trust_forwarded_for,
        })
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        ArtifactPaths::for_install(
            &self.deploy.install_folder,
            &self.deploy.sample_repository,
            &self.deploy.vm_name,
            self.deploy.stamp_path.clone(),
        )
    }

    pub fn metadata_timeout(&self) -> Duration {
        Duration::from_secs(self.github.timeout_secs)
    }
}
