// ABOUTME: Deployment error types with SNAFU pattern.
// ABOUTME: Every variant knows the stage it failed in and maps to a coarse error kind.

use snafu::Snafu;
use std::path::PathBuf;

use super::stage::Stage;
use crate::config::ConfigError;
use crate::local::LocalCommandError;
use crate::remote::{ConnectError, ExecError, TransferError};
use crate::repository::RepositoryError;
use crate::types::{Environment, UnknownEnvironment};

/// Fatal failure of a deployment run.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DeployError {
    #[snafu(display("{source}"))]
    InvalidEnvironment { source: UnknownEnvironment },

    #[snafu(display("{} is not a git repository", path.display()))]
    NotARepository { path: PathBuf },

    #[snafu(display("no server profile configured for environment {environment}"))]
    ProfileNotFound { environment: Environment },

    #[snafu(display("failed to load server profile: {source}"))]
    ProfileStore { source: ConfigError },

    #[snafu(display("failed to read repository state: {source}"))]
    RepositoryStatus { source: RepositoryError },

    #[snafu(display("failed to switch to branch {branch}: {source}"))]
    Checkout {
        branch: String,
        source: RepositoryError,
    },

    #[snafu(display("failed to pull {branch}: {source}"))]
    Pull {
        branch: String,
        source: RepositoryError,
    },

    #[snafu(display("deployment cancelled"))]
    Cancelled { stage: Stage },

    #[snafu(display("local build failed: {source}"))]
    LocalBuild { source: LocalCommandError },

    #[snafu(display("failed to connect to {address}: {source}"))]
    Connect {
        address: String,
        source: ConnectError,
    },

    #[snafu(display("{stage} failed: {source}"))]
    RemoteCommand { stage: Stage, source: ExecError },

    #[snafu(display("upload failed: {source}"))]
    Transfer { source: TransferError },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployErrorKind {
    /// Bad environment name or not inside a repository. Nothing was touched.
    Validation,
    /// Profile missing or store unreadable.
    Config,
    /// Repository query, branch switch or pull failed.
    RepositoryState,
    /// Could not establish the remote session.
    Connection,
    /// A local or remote command, or a transfer, failed.
    RemoteExecution,
    /// The operator declined a prompt.
    Cancelled,
}

impl DeployError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::InvalidEnvironment { .. } | DeployError::NotARepository { .. } => {
                DeployErrorKind::Validation
            }
            DeployError::ProfileNotFound { .. } | DeployError::ProfileStore { .. } => {
                DeployErrorKind::Config
            }
            DeployError::RepositoryStatus { .. }
            | DeployError::Checkout { .. }
            | DeployError::Pull { .. } => DeployErrorKind::RepositoryState,
            DeployError::Cancelled { .. } => DeployErrorKind::Cancelled,
            DeployError::Connect { .. } => DeployErrorKind::Connection,
            DeployError::LocalBuild { .. }
            | DeployError::RemoteCommand { .. }
            | DeployError::Transfer { .. } => DeployErrorKind::RemoteExecution,
        }
    }

    /// The stage the run stopped in.
    pub fn stage(&self) -> Stage {
        match self {
            DeployError::InvalidEnvironment { .. } | DeployError::NotARepository { .. } => {
                Stage::ValidateEnvironment
            }
            DeployError::ProfileNotFound { .. } | DeployError::ProfileStore { .. } => {
                Stage::LoadProfile
            }
            DeployError::RepositoryStatus { .. }
            | DeployError::Checkout { .. }
            | DeployError::Pull { .. } => Stage::CheckRepositoryState,
            DeployError::Cancelled { stage } | DeployError::RemoteCommand { stage, .. } => *stage,
            DeployError::LocalBuild { .. } => Stage::BuildLocal,
            DeployError::Connect { .. } => Stage::Connect,
            DeployError::Transfer { .. } => Stage::Upload,
        }
    }

    /// Remote exit status, when a command ran and failed.
    pub fn exit_code(&self) -> Option<u32> {
        match self {
            DeployError::RemoteCommand { source, .. } => source.exit_code(),
            _ => None,
        }
    }
}
