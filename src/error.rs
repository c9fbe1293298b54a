// ABOUTME: Application-wide error types for skiff.
// ABOUTME: Aggregates module errors so every command returns one Result type.

use crate::config::ConfigError;
use crate::deploy::DeployError;
use crate::logs::LogsError;
use crate::remote::ConnectError;
use crate::types::{ServerNameError, UnknownEnvironment};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error(transparent)]
    Logs(#[from] LogsError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Environment(#[from] UnknownEnvironment),

    #[error(transparent)]
    ServerName(#[from] ServerNameError),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("prompt failed: {0}")]
    Prompt(#[from] dialoguer::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
