// ABOUTME: State transition methods for the checks that precede any remote work.
// ABOUTME: Each method consumes self and returns the next state on success.

use snafu::{OptionExt, ResultExt};

use super::Deployment;
use super::error::{
    CancelledSnafu, CheckoutSnafu, DeployError, InvalidEnvironmentSnafu, NotARepositorySnafu,
    ProfileNotFoundSnafu, ProfileStoreSnafu, PullSnafu, RepositoryStatusSnafu,
};
use super::prompt::Prompter;
use super::stage::{Stage, StageObserver, StageOutcome};
use super::state::{Confirmed, ProfileLoaded, RepositoryReady, Requested, Validated};
use crate::config::ProfileSource;
use crate::diagnostics::Warning;
use crate::repository::RepositoryProvider;
use crate::types::Environment;

// =============================================================================
// Requested -> Validated
// =============================================================================

impl Deployment<Requested> {
    /// Check the environment name, then that the working directory is a repository.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::InvalidEnvironment` for a name outside the closed
    /// set, before any other collaborator is consulted, and
    /// `DeployError::NotARepository` when git does not recognise the directory.
    #[must_use = "deployment state must be used"]
    pub async fn validate(
        mut self,
        repository: &dyn RepositoryProvider,
        observer: &dyn StageObserver,
    ) -> Result<Deployment<Validated>, DeployError> {
        observer.stage_started(Stage::ValidateEnvironment);

        let environment: Environment = self
            .request
            .environment
            .parse()
            .context(InvalidEnvironmentSnafu)?;

        if !repository.is_repository().await {
            return NotARepositorySnafu {
                path: repository.workdir(),
            }
            .fail();
        }

        self.record(observer, Stage::ValidateEnvironment, StageOutcome::Completed);
        Ok(self.advance(|_| Validated { environment }))
    }
}

// =============================================================================
// Validated -> ProfileLoaded
// =============================================================================

impl Deployment<Validated> {
    /// Resolve the server profile for the validated environment.
    #[must_use = "deployment state must be used"]
    pub fn load_profile(
        mut self,
        profiles: &dyn ProfileSource,
        observer: &dyn StageObserver,
    ) -> Result<Deployment<ProfileLoaded>, DeployError> {
        observer.stage_started(Stage::LoadProfile);
        let environment = self.state.environment;

        let profile = profiles
            .resolve(environment)
            .context(ProfileStoreSnafu)?
            .context(ProfileNotFoundSnafu { environment })?;

        tracing::debug!("resolved {} to {}", environment, profile.address());
        self.record(observer, Stage::LoadProfile, StageOutcome::Completed);
        Ok(self.advance(|_| ProfileLoaded {
            environment,
            profile,
        }))
    }
}

// =============================================================================
// ProfileLoaded -> RepositoryReady
// =============================================================================

impl Deployment<ProfileLoaded> {
    /// Settle uncommitted changes, switch to the target branch and pull it.
    ///
    /// A branch switch is not undone if a later step fails.
    ///
    /// # Errors
    ///
    /// Returns `DeployError::Cancelled` when the operator declines to continue
    /// with uncommitted changes, and a repository error when the checkout or
    /// pull fails.
    #[must_use = "deployment state must be used"]
    pub async fn prepare_repository(
        mut self,
        repository: &dyn RepositoryProvider,
        prompter: &dyn Prompter,
        observer: &dyn StageObserver,
    ) -> Result<Deployment<RepositoryReady>, DeployError> {
        observer.stage_started(Stage::CheckRepositoryState);
        let branch = self.request.target_branch.clone();

        let mut snapshot = repository.state().await.context(RepositoryStatusSnafu)?;

        if snapshot.has_uncommitted_changes {
            if self.request.force {
                self.diagnostics.warn(Warning::uncommitted_changes(format!(
                    "deploying {} with uncommitted changes",
                    snapshot.current_branch
                )));
            } else if !prompter.confirm("You have uncommitted changes. Continue anyway?") {
                return CancelledSnafu {
                    stage: Stage::CheckRepositoryState,
                }
                .fail();
            }
        }

        if snapshot.current_branch != branch {
            tracing::info!("switching from {} to {}", snapshot.current_branch, branch);
            repository
                .checkout(&branch)
                .await
                .context(CheckoutSnafu { branch: &branch })?;
            snapshot = repository.state().await.context(RepositoryStatusSnafu)?;
        }

        repository
            .pull(&branch)
            .await
            .context(PullSnafu { branch: &branch })?;

        self.record(observer, Stage::CheckRepositoryState, StageOutcome::Completed);
        Ok(self.advance(|loaded| RepositoryReady {
            environment: loaded.environment,
            profile: loaded.profile,
            repository: snapshot,
        }))
    }
}

// =============================================================================
// RepositoryReady -> Confirmed
// =============================================================================

impl Deployment<RepositoryReady> {
    /// Ask the operator to approve the resolved target.
    ///
    /// Not asked for forced runs or dry runs; the stage is then recorded as skipped.
    #[must_use = "deployment state must be used"]
    pub fn confirm(
        mut self,
        prompter: &dyn Prompter,
        observer: &dyn StageObserver,
    ) -> Result<Deployment<Confirmed>, DeployError> {
        observer.stage_started(Stage::ConfirmDeployment);

        let outcome = if self.request.force || self.request.dry_run {
            StageOutcome::Skipped
        } else {
            let message = format!(
                "Deploy branch {} to {} ({}, {})?",
                self.request.target_branch,
                self.state.environment,
                self.state.profile.host,
                self.state.profile.deploy_path
            );
            if !prompter.confirm(&message) {
                return CancelledSnafu {
                    stage: Stage::ConfirmDeployment,
                }
                .fail();
            }
            StageOutcome::Completed
        };

        self.record(observer, Stage::ConfirmDeployment, outcome);
        Ok(self.advance(|ready| Confirmed {
            environment: ready.environment,
            profile: ready.profile,
            repository: ready.repository,
        }))
    }
}
