// ABOUTME: Drives a deployment request through every state to a report.
// ABOUTME: Owns the collaborators and decides between simulation and execution.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;

use super::Deployment;
use super::error::DeployError;
use super::execute::ExecuteContext;
use super::prompt::Prompter;
use super::request::DeploymentRequest;
use super::stage::{Silent, StageObserver, StageRecord};
use super::state::Completed;
use crate::config::ProfileSource;
use crate::diagnostics::Warning;
use crate::local::LocalShell;
use crate::remote::SessionFactory;
use crate::repository::RepositoryProvider;
use crate::types::Environment;

/// Pause between simulated stages so a dry run reads like a real one.
pub const DEFAULT_SIMULATE_STEP_DELAY: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy)]
pub struct DeployOptions {
    pub simulate_step_delay: Duration,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            simulate_step_delay: DEFAULT_SIMULATE_STEP_DELAY,
        }
    }
}

/// Summary of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentReport {
    pub environment: Environment,
    pub branch: String,
    pub host: String,
    pub dry_run: bool,
    pub stages: Vec<StageRecord>,
    pub warnings: Vec<Warning>,
    pub completed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_name: Option<String>,
}

impl DeploymentReport {
    /// True when verification did not pass cleanly.
    pub fn is_unverified(&self) -> bool {
        self.stages.iter().any(|r| r.outcome.is_warning())
    }
}

impl Deployment<Completed> {
    /// Consume the deployment and produce its report.
    pub fn finish(self) -> DeploymentReport {
        DeploymentReport {
            environment: self.state.environment,
            branch: self.request.target_branch,
            host: self.state.profile.host,
            dry_run: self.request.dry_run,
            stages: self.stages,
            warnings: self.diagnostics.into_warnings(),
            completed_at: self.state.completed_at,
            public_url: self.state.profile.public_url,
            backup_name: self.state.backup_name,
        }
    }
}

/// Runs deployments against injected collaborators.
///
/// Nothing here is global: the profile source, repository, session factory,
/// local shell and prompter are all passed in, so every decision the
/// pipeline makes can be exercised with fakes.
pub struct Deployer<'a> {
    profiles: &'a dyn ProfileSource,
    repository: &'a dyn RepositoryProvider,
    sessions: &'a dyn SessionFactory,
    shell: &'a dyn LocalShell,
    prompter: &'a dyn Prompter,
    observer: &'a dyn StageObserver,
    options: DeployOptions,
}

impl<'a> Deployer<'a> {
    pub fn new(
        profiles: &'a dyn ProfileSource,
        repository: &'a dyn RepositoryProvider,
        sessions: &'a dyn SessionFactory,
        shell: &'a dyn LocalShell,
        prompter: &'a dyn Prompter,
    ) -> Self {
        Self {
            profiles,
            repository,
            sessions,
            shell,
            prompter,
            observer: &Silent,
            options: DeployOptions::default(),
        }
    }

    pub fn observer(mut self, observer: &'a dyn StageObserver) -> Self {
        self.observer = observer;
        self
    }

    pub fn options(mut self, options: DeployOptions) -> Self {
        self.options = options;
        self
    }

    /// Run one deployment to completion.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error; [`DeployError::stage`] names where the
    /// run stopped. A session opened by the run is always closed before this
    /// returns.
    pub async fn run(&self, request: DeploymentRequest) -> Result<DeploymentReport, DeployError> {
        let result = self.drive(request).await;
        if let Err(e) = &result {
            tracing::error!("deployment failed while {}: {}", e.stage(), e);
            self.observer.stage_failed(e.stage(), e);
        }
        result
    }

    async fn drive(&self, request: DeploymentRequest) -> Result<DeploymentReport, DeployError> {
        let dry_run = request.dry_run;

        let confirmed = Deployment::new(request)
            .validate(self.repository, self.observer)
            .await?
            .load_profile(self.profiles, self.observer)?
            .prepare_repository(self.repository, self.prompter, self.observer)
            .await?
            .confirm(self.prompter, self.observer)?;

        let completed = if dry_run {
            confirmed
                .simulate(self.options.simulate_step_delay, self.observer)
                .await
        } else {
            let ctx = ExecuteContext {
                sessions: self.sessions,
                shell: self.shell,
                workdir: self.repository.workdir(),
                observer: self.observer,
            };
            confirmed.execute(&ctx).await?
        };

        Ok(completed.finish())
    }
}
