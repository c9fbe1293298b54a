// ABOUTME: Capability contract for one authenticated remote connection.
// ABOUTME: Defines RemoteSession, SessionFactory and the connect/exec/transfer error types.

mod exclude;
mod shell;

pub use exclude::ExcludeRules;
pub use shell::quote;

use crate::config::ServerProfile;
use async_trait::async_trait;
use futures::Stream;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

/// Lines produced by a long-running remote command, ending when the command exits.
pub type LineStream = Pin<Box<dyn Stream<Item = Result<String, ExecError>> + Send>>;

/// One remote connection, exclusively owned by its caller.
///
/// All operations take `&self` so a single stage may issue independent
/// queries concurrently.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Establish and authenticate the connection.
    async fn connect(&self) -> Result<(), ConnectError>;

    /// Run a command, optionally inside `working_dir`, returning stdout.
    ///
    /// A non-zero exit status is always an error carrying stderr.
    async fn execute(&self, command: &str, working_dir: Option<&str>) -> Result<String, ExecError>;

    /// Whether `path` exists remotely. Failures of any kind read as `false`.
    async fn file_exists(&self, path: &str) -> bool;

    /// Recursively copy `local_dir` into `remote_dir`, skipping entries matched by `exclude`.
    async fn upload_tree(
        &self,
        local_dir: &Path,
        remote_dir: &str,
        exclude: &ExcludeRules,
    ) -> Result<TransferSummary, TransferError>;

    /// Copy `files` (relative to `local_root`) into `remote_dir`, keeping their relative layout.
    async fn upload_files(
        &self,
        local_root: &Path,
        files: &[PathBuf],
        remote_dir: &str,
    ) -> Result<TransferSummary, TransferError>;

    /// Start a command and stream its stdout line by line.
    async fn stream_lines(&self, command: &str) -> Result<LineStream, ExecError>;

    /// Close the connection. Safe to call repeatedly or before `connect`.
    async fn disconnect(&self);
}

/// Builds unconnected sessions for a profile.
pub trait SessionFactory: Send + Sync {
    fn create(&self, profile: &ServerProfile) -> Box<dyn RemoteSession>;
}

/// Totals from a completed transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub files: usize,
    pub bytes: u64,
}

/// Errors establishing a session.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error("connection failed: {0}")]
    Network(String),

    #[error("host key for {0} rejected (not in known_hosts or changed)")]
    HostKeyRejected(String),

    #[error("authentication failed for {0}")]
    Authentication(String),

    #[error("invalid credential: {0}")]
    Credential(String),
}

/// Errors running a remote command.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("`{command}` exited with status {code}: {stderr}")]
    NonZeroExit {
        command: String,
        code: u32,
        stderr: String,
    },

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("channel error: {0}")]
    Channel(String),

    #[error("session is not connected")]
    NotConnected,
}

impl ExecError {
    /// Exit status when the command ran to completion and failed.
    pub fn exit_code(&self) -> Option<u32> {
        match self {
            ExecError::NonZeroExit { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Errors transferring files.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("cannot read {}: {source}", path.display())]
    Local {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {reason}")]
    Remote { path: String, reason: String },

    #[error(transparent)]
    Exec(#[from] ExecError),
}
