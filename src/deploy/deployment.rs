// ABOUTME: Generic deployment struct parameterized by state marker.
// ABOUTME: Carries the request, the stage log and collected warnings through every transition.

use super::request::DeploymentRequest;
use super::stage::{Stage, StageObserver, StageOutcome, StageRecord};
use super::state::{Confirmed, ProfileLoaded, RepositoryReady, Requested};
use crate::config::ServerProfile;
use crate::diagnostics::Diagnostics;
use crate::repository::RepositoryState;
use crate::types::Environment;

/// A deployment in progress, parameterized by its current state.
///
/// The state type parameter `S` carries the data resolved so far (the
/// environment, the profile, the repository snapshot), so a profile can
/// only be read once it has been loaded and execution can only start
/// after confirmation.
#[derive(Debug)]
pub struct Deployment<S> {
    pub(crate) request: DeploymentRequest,
    pub(crate) stages: Vec<StageRecord>,
    pub(crate) diagnostics: Diagnostics,
    pub(crate) state: S,
}

impl Deployment<Requested> {
    pub fn new(request: DeploymentRequest) -> Self {
        Deployment {
            request,
            stages: Vec::new(),
            diagnostics: Diagnostics::default(),
            state: Requested,
        }
    }
}

impl<S> Deployment<S> {
    pub fn request(&self) -> &DeploymentRequest {
        &self.request
    }

    /// Stages finished so far, in order.
    pub fn stages(&self) -> &[StageRecord] {
        &self.stages
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub(crate) fn record(
        &mut self,
        observer: &dyn StageObserver,
        stage: Stage,
        outcome: StageOutcome,
    ) {
        let record = StageRecord::new(stage, outcome);
        tracing::info!("{}: {:?}", stage, record.outcome);
        observer.stage_finished(&record);
        self.stages.push(record);
    }

    /// Move to the next state, keeping the request and stage log.
    pub(crate) fn advance<T>(self, next: impl FnOnce(S) -> T) -> Deployment<T> {
        Deployment {
            request: self.request,
            stages: self.stages,
            diagnostics: self.diagnostics,
            state: next(self.state),
        }
    }
}

// State-specific accessors
impl Deployment<ProfileLoaded> {
    pub fn profile(&self) -> &ServerProfile {
        &self.state.profile
    }
}

impl Deployment<RepositoryReady> {
    pub fn environment(&self) -> Environment {
        self.state.environment
    }

    pub fn profile(&self) -> &ServerProfile {
        &self.state.profile
    }

    pub fn repository(&self) -> &RepositoryState {
        &self.state.repository
    }
}

impl Deployment<Confirmed> {
    pub fn environment(&self) -> Environment {
        self.state.environment
    }

    pub fn profile(&self) -> &ServerProfile {
        &self.state.profile
    }

    pub fn repository(&self) -> &RepositoryState {
        &self.state.repository
    }
}
