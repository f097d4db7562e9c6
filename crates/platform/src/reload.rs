//! Detached service reload.

use std::process::Stdio;

use deploy::{ReloadError, ServiceReloader};
use tokio::process::Command;
use tracing::{debug, info};

/// Requests a reload by running a command and not waiting for it.
///
/// The child is reaped on a background task that logs its exit status at
/// debug level; nothing else looks at the result.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandReloader {
    program: String,
    args: Vec<String>,
}

impl CommandReloader {
    /// The stock reload command: `sudo service platform reload`.
    pub fn platform_service() -> Self {
        Self {
            program: "sudo".to_string(),
            args: vec![
                "service".to_string(),
                "platform".to_string(),
                "reload".to_string(),
            ],
        }
    }

    /// Builds a reloader from a program and its arguments.
    ///
    /// # Errors
    ///
    /// [`ReloadError::EmptyCommand`] if `command` is empty.
    pub fn from_command(command: &[String]) -> Result<Self, ReloadError> {
        let (program, args) = command.split_first().ok_or(ReloadError::EmptyCommand)?;
        if program.is_empty() {
            return Err(ReloadError::EmptyCommand);
        }
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    fn rendered(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl ServiceReloader for CommandReloader {
    fn request_reload(&self) -> Result<(), ReloadError> {
        let command = self.rendered();
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ReloadError::Spawn {
                command: command.clone(),
                source,
            })?;
        info!(command = %command, "platform reload requested");

        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) => debug!(command = %command, %status, "reload command exited"),
                Err(e) => debug!(command = %command, error = %e, "reload command could not be awaited"),
            }
        });
        Ok(())
    }
}
