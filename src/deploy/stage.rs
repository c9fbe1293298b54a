// ABOUTME: Pipeline stage names and per-stage outcomes.
// ABOUTME: A stage either completes, is skipped, is simulated, warns, or fails the run.

use super::error::DeployError;
use serde::Serialize;
use std::fmt;

/// Every named step of a deployment, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ValidateEnvironment,
    LoadProfile,
    CheckRepositoryState,
    ConfirmDeployment,
    BuildLocal,
    Connect,
    Backup,
    Upload,
    InstallAndBuildRemote,
    RestartService,
    Verify,
}

impl Stage {
    /// Sub-stages walked by both execution and simulation.
    pub const EXECUTION: [Stage; 7] = [
        Stage::BuildLocal,
        Stage::Connect,
        Stage::Backup,
        Stage::Upload,
        Stage::InstallAndBuildRemote,
        Stage::RestartService,
        Stage::Verify,
    ];

    /// Operator-facing description, used in progress lines and error reports.
    pub fn description(&self) -> &'static str {
        match self {
            Stage::ValidateEnvironment => "validating environment",
            Stage::LoadProfile => "loading server profile",
            Stage::CheckRepositoryState => "checking repository state",
            Stage::ConfirmDeployment => "confirming deployment",
            Stage::BuildLocal => "building locally",
            Stage::Connect => "connecting to server",
            Stage::Backup => "backing up current deployment",
            Stage::Upload => "uploading files",
            Stage::InstallAndBuildRemote => "installing and building on server",
            Stage::RestartService => "restarting service",
            Stage::Verify => "verifying deployment",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// Non-fatal result of a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "message", rename_all = "snake_case")]
pub enum StageOutcome {
    Completed,
    /// Nothing to do, e.g. an empty command.
    Skipped,
    /// Dry run.
    Simulated,
    /// Finished with a problem that does not fail the run.
    Warned(String),
}

impl StageOutcome {
    pub fn is_warning(&self) -> bool {
        matches!(self, StageOutcome::Warned(_))
    }
}

/// `Err` is fatal: the remaining stages are not run.
pub type StageResult = Result<StageOutcome, DeployError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: Stage,
    #[serde(flatten)]
    pub outcome: StageOutcome,
}

impl StageRecord {
    pub fn new(stage: Stage, outcome: StageOutcome) -> Self {
        Self { stage, outcome }
    }
}

/// Receives stage progress as the pipeline runs.
pub trait StageObserver: Send + Sync {
    fn stage_started(&self, _stage: Stage) {}

    fn stage_finished(&self, _record: &StageRecord) {}

    fn stage_failed(&self, _stage: Stage, _error: &DeployError) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct Silent;

impl StageObserver for Silent {}
