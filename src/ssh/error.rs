// ABOUTME: SSH-specific error types.
// ABOUTME: Covers connection, authentication, host key verification and channel failures.

use crate::remote::{ConnectError, ExecError};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("host key verification failed for {0}")]
    HostKeyRejected(String),

    #[error("authentication failed for {0}")]
    AuthenticationFailed(String),

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("failed to decode inline private key: {0}")]
    KeyDecodeFailed(String),

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("command timed out after {0:?}")]
    CommandTimeout(std::time::Duration),

    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    #[error("session is not connected")]
    NotConnected,

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for ConnectError {
    fn from(err: Error) -> Self {
        match err {
            Error::HostKeyRejected(host) => ConnectError::HostKeyRejected(host),
            Error::AuthenticationFailed(who) => ConnectError::Authentication(who),
            Error::KeyLoadFailed { .. } | Error::KeyDecodeFailed(_) | Error::Key(_) => {
                ConnectError::Credential(err.to_string())
            }
            other => ConnectError::Network(other.to_string()),
        }
    }
}

impl From<Error> for ExecError {
    fn from(err: Error) -> Self {
        match err {
            Error::CommandTimeout(timeout) => ExecError::Timeout(timeout),
            Error::NotConnected => ExecError::NotConnected,
            other => ExecError::Channel(other.to_string()),
        }
    }
}
