// ABOUTME: Execution phase: local build, then every remote stage inside one session scope.
// ABOUTME: The session is disconnected exactly once after a successful connect, on every exit path.

use chrono::{DateTime, SecondsFormat, Utc};
use futures::FutureExt;
use snafu::ResultExt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};

use super::Deployment;
use super::error::{ConnectSnafu, DeployError, LocalBuildSnafu, RemoteCommandSnafu, TransferSnafu};
use super::stage::{Stage, StageObserver, StageOutcome, StageResult};
use super::state::{Completed, Confirmed};
use crate::config::UploadMode;
use crate::diagnostics::Warning;
use crate::local::LocalShell;
use crate::remote::{ExcludeRules, RemoteSession, SessionFactory, quote};

/// Collaborators the execution phase needs.
pub(crate) struct ExecuteContext<'a> {
    pub sessions: &'a dyn SessionFactory,
    pub shell: &'a dyn LocalShell,
    pub workdir: &'a Path,
    pub observer: &'a dyn StageObserver,
}

/// Directory name for a backup taken at `at`.
///
/// RFC 3339 UTC with milliseconds, with `:` and `.` replaced so the name is
/// safe in any shell or filesystem.
pub fn backup_name(at: DateTime<Utc>) -> String {
    let stamp = at
        .to_rfc3339_opts(SecondsFormat::Millis, true)
        .replace([':', '.'], "-");
    format!("backup-{stamp}")
}

impl Deployment<Confirmed> {
    /// Run the seven execution sub-stages against the real target.
    ///
    /// # Errors
    ///
    /// Returns the first fatal stage error. A failed verification is not an
    /// error; it is recorded as a warning on the completed deployment.
    ///
    /// # Panics
    ///
    /// A panic inside a remote stage is re-raised after the session has been
    /// disconnected.
    pub(crate) async fn execute(
        mut self,
        ctx: &ExecuteContext<'_>,
    ) -> Result<Deployment<Completed>, DeployError> {
        ctx.observer.stage_started(Stage::BuildLocal);
        let outcome = self.build_local(ctx).await?;
        self.record(ctx.observer, Stage::BuildLocal, outcome);

        ctx.observer.stage_started(Stage::Connect);
        let session = ctx.sessions.create(&self.state.profile);
        session.connect().await.context(ConnectSnafu {
            address: self.state.profile.address(),
        })?;
        self.record(ctx.observer, Stage::Connect, StageOutcome::Completed);

        let scoped = AssertUnwindSafe(self.remote_stages(session.as_ref(), ctx))
            .catch_unwind()
            .await;
        session.disconnect().await;

        let backup_name = match scoped {
            Ok(result) => result?,
            Err(panic) => std::panic::resume_unwind(panic),
        };

        Ok(self.advance(|confirmed| Completed {
            environment: confirmed.environment,
            profile: confirmed.profile,
            backup_name,
            completed_at: Utc::now(),
        }))
    }

    /// Backup through verify. Returns the backup name, if one was taken.
    async fn remote_stages(
        &mut self,
        session: &dyn RemoteSession,
        ctx: &ExecuteContext<'_>,
    ) -> Result<Option<String>, DeployError> {
        let observer = ctx.observer;

        observer.stage_started(Stage::Backup);
        let backup_name = self.backup(session).await?;
        let outcome = match backup_name {
            Some(_) => StageOutcome::Completed,
            None => StageOutcome::Skipped,
        };
        self.record(observer, Stage::Backup, outcome);

        observer.stage_started(Stage::Upload);
        let outcome = self.upload(session, ctx.workdir).await?;
        self.record(observer, Stage::Upload, outcome);

        observer.stage_started(Stage::InstallAndBuildRemote);
        let outcome = self.install(session).await?;
        self.record(observer, Stage::InstallAndBuildRemote, outcome);

        observer.stage_started(Stage::RestartService);
        let outcome = self.restart(session).await?;
        self.record(observer, Stage::RestartService, outcome);

        observer.stage_started(Stage::Verify);
        let outcome = self.verify(session).await;
        if let StageOutcome::Warned(message) = &outcome {
            self.diagnostics
                .warn(Warning::verification(format!("deployment unverified: {message}")));
        }
        self.record(observer, Stage::Verify, outcome);

        Ok(backup_name)
    }

    async fn build_local(&self, ctx: &ExecuteContext<'_>) -> StageResult {
        let Some(command) = self.state.profile.commands.build_local() else {
            return Ok(StageOutcome::Skipped);
        };
        ctx.shell
            .run(command, ctx.workdir)
            .await
            .context(LocalBuildSnafu)?;
        Ok(StageOutcome::Completed)
    }

    /// Copy the live deployment aside and return the backup's name.
    ///
    /// `None` when nothing is deployed yet.
    async fn backup(&self, session: &dyn RemoteSession) -> Result<Option<String>, DeployError> {
        let profile = &self.state.profile;
        remote(session, Stage::Backup, &mkdir(profile.backup_path.as_str()), None).await?;

        let name = backup_name(Utc::now());
        let target = profile.backup_path.join(&name);
        let stdout = remote(
            session,
            Stage::Backup,
            &copy_if_present(profile.deploy_path.as_str(), &target),
            None,
        )
        .await?;

        if stdout.trim() == ABSENT {
            tracing::info!("{} does not exist yet, nothing to back up", profile.deploy_path);
            return Ok(None);
        }

        tracing::info!("backed up {} to {}", profile.deploy_path, target);
        Ok(Some(name))
    }

    async fn upload(&self, session: &dyn RemoteSession, workdir: &Path) -> StageResult {
        let deploy_path = self.state.profile.deploy_path.as_str();
        remote(session, Stage::Upload, &mkdir(deploy_path), None).await?;

        let summary = match &self.state.profile.upload {
            UploadMode::Tree { local_dir } => {
                let local = workdir.join(local_dir);
                session
                    .upload_tree(&local, deploy_path, &ExcludeRules::deploy_default())
                    .await
            }
            UploadMode::Files { files } => {
                let files: Vec<PathBuf> = files.iter().cloned().collect();
                session.upload_files(workdir, &files, deploy_path).await
            }
        }
        .context(TransferSnafu)?;

        tracing::info!(
            "uploaded {} file(s), {} bytes to {}",
            summary.files,
            summary.bytes,
            deploy_path
        );
        Ok(StageOutcome::Completed)
    }

    async fn install(&self, session: &dyn RemoteSession) -> StageResult {
        let commands = &self.state.profile.commands;
        let steps: Vec<&str> = [commands.install_remote(), commands.build_remote()]
            .into_iter()
            .flatten()
            .collect();
        if steps.is_empty() {
            return Ok(StageOutcome::Skipped);
        }

        let dir = Some(self.state.profile.deploy_path.as_str());
        for command in steps {
            remote(session, Stage::InstallAndBuildRemote, command, dir).await?;
        }
        Ok(StageOutcome::Completed)
    }

    /// Restart, then wait for the service to settle before verification.
    async fn restart(&self, session: &dyn RemoteSession) -> StageResult {
        let profile = &self.state.profile;
        let Some(command) = profile.commands.restart_remote() else {
            return Ok(StageOutcome::Skipped);
        };

        remote(
            session,
            Stage::RestartService,
            command,
            Some(profile.deploy_path.as_str()),
        )
        .await?;

        if !profile.settle_time.is_zero() {
            tracing::debug!("waiting {:?} for service to settle", profile.settle_time);
            tokio::time::sleep(profile.settle_time).await;
        }
        Ok(StageOutcome::Completed)
    }

    /// Never fatal: a failing check downgrades to a warning.
    async fn verify(&self, session: &dyn RemoteSession) -> StageOutcome {
        let profile = &self.state.profile;
        let Some(command) = profile.commands.verify_remote() else {
            return StageOutcome::Skipped;
        };

        match session
            .execute(command, Some(profile.deploy_path.as_str()))
            .await
        {
            Ok(_) => StageOutcome::Completed,
            Err(e) => StageOutcome::Warned(e.to_string()),
        }
    }
}

fn mkdir(path: &str) -> String {
    format!("mkdir -p {}", quote(path))
}

/// Printed by [`copy_if_present`] when there is nothing to copy.
const ABSENT: &str = "absent";

/// Existence check and copy in one command, so a failed check is a failed backup.
fn copy_if_present(source: &str, target: &str) -> String {
    let source = quote(source);
    format!(
        "if [ -e {source} ]; then cp -r {source} {}; else echo {ABSENT}; fi",
        quote(target)
    )
}

async fn remote(
    session: &dyn RemoteSession,
    stage: Stage,
    command: &str,
    working_dir: Option<&str>,
) -> Result<String, DeployError> {
    session
        .execute(command, working_dir)
        .await
        .context(RemoteCommandSnafu { stage })
}
