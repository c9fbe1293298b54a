// ABOUTME: Deployment state marker types for the type state pattern.
// ABOUTME: Each state carries exactly the data resolved so far, so later stages cannot run early.

use crate::config::ServerProfile;
use crate::repository::RepositoryState;
use crate::types::Environment;
use chrono::{DateTime, Utc};

/// Initial state: nothing checked yet.
/// Available actions: `validate()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Requested;

/// Environment name is valid and the working directory is a repository.
/// Available actions: `load_profile()`
#[derive(Debug, Clone)]
pub struct Validated {
    pub(crate) environment: Environment,
}

/// Server profile resolved.
/// Available actions: `prepare_repository()`
#[derive(Debug, Clone)]
pub struct ProfileLoaded {
    pub(crate) environment: Environment,
    pub(crate) profile: ServerProfile,
}

/// Target branch checked out and pulled.
/// Available actions: `confirm()`
#[derive(Debug, Clone)]
pub struct RepositoryReady {
    pub(crate) environment: Environment,
    pub(crate) profile: ServerProfile,
    pub(crate) repository: RepositoryState,
}

/// Operator agreed, or confirmation was not required.
/// Available actions: `simulate()`, `execute()`
#[derive(Debug, Clone)]
pub struct Confirmed {
    pub(crate) environment: Environment,
    pub(crate) profile: ServerProfile,
    pub(crate) repository: RepositoryState,
}

/// Pipeline finished successfully.
/// Available actions: `finish()`
#[derive(Debug, Clone)]
pub struct Completed {
    pub(crate) environment: Environment,
    pub(crate) profile: ServerProfile,
    pub(crate) backup_name: Option<String>,
    pub(crate) completed_at: DateTime<Utc>,
}
