// ABOUTME: RemoteSession implementation for the russh-backed Session.
// ABOUTME: Maps SSH errors onto the connect/exec/transfer contract and builds sessions from profiles.

use super::client::{Session, SessionConfig, in_dir};
use crate::config::ServerProfile;
use crate::remote::{
    ConnectError, ExcludeRules, ExecError, LineStream, RemoteSession, SessionFactory,
    TransferError, TransferSummary,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[async_trait]
impl RemoteSession for Session {
    async fn connect(&self) -> Result<(), ConnectError> {
        Session::connect(self).await.map_err(ConnectError::from)
    }

    async fn execute(&self, command: &str, working_dir: Option<&str>) -> Result<String, ExecError> {
        let full = in_dir(command, working_dir);
        let output = self.exec(&full).await?;
        if output.success() {
            return Ok(output.stdout);
        }

        let stderr = match output.stderr.trim() {
            "" => output.stdout.trim().to_string(),
            s => s.to_string(),
        };
        Err(ExecError::NonZeroExit {
            command: command.to_string(),
            code: output.exit_code,
            stderr,
        })
    }

    async fn file_exists(&self, path: &str) -> bool {
        match Session::file_exists(self, path).await {
            Ok(exists) => exists,
            Err(e) => {
                tracing::debug!("existence check for {} failed: {}", path, e);
                false
            }
        }
    }

    async fn upload_tree(
        &self,
        local_dir: &Path,
        remote_dir: &str,
        exclude: &ExcludeRules,
    ) -> Result<TransferSummary, TransferError> {
        Session::upload_tree(self, local_dir, remote_dir, exclude).await
    }

    async fn upload_files(
        &self,
        local_root: &Path,
        files: &[PathBuf],
        remote_dir: &str,
    ) -> Result<TransferSummary, TransferError> {
        Session::upload_files(self, local_root, files, remote_dir).await
    }

    async fn stream_lines(&self, command: &str) -> Result<LineStream, ExecError> {
        Session::stream_lines(self, command).await
    }

    async fn disconnect(&self) {
        if let Err(e) = Session::disconnect(self).await {
            tracing::warn!("SSH disconnect from {} failed: {}", self.config().host, e);
        }
    }
}

/// Creates russh sessions from server profiles.
#[derive(Debug, Clone, Default)]
pub struct SshSessionFactory {
    known_hosts_path: Option<PathBuf>,
    command_timeout: Option<Duration>,
}

impl SshSessionFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = Some(timeout);
        self
    }

    pub fn session_config(&self, profile: &ServerProfile) -> SessionConfig {
        let mut config = SessionConfig::from_profile(profile);
        if let Some(path) = &self.known_hosts_path {
            config = config.known_hosts_path(path.clone());
        }
        if let Some(timeout) = self.command_timeout {
            config = config.command_timeout(timeout);
        }
        config
    }
}

impl SessionFactory for SshSessionFactory {
    fn create(&self, profile: &ServerProfile) -> Box<dyn RemoteSession> {
        Box::new(Session::new(self.session_config(profile)))
    }
}
