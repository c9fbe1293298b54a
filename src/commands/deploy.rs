// ABOUTME: Deploy command implementation.
// ABOUTME: Wires the git repository, profile store, SSH factory and terminal prompter into a Deployer.

use skiff::config::ProfileStore;
use skiff::deploy::{Deployer, DeploymentReport, DeploymentRequest, TerminalPrompter};
use skiff::error::Result;
use skiff::local::ShellRunner;
use skiff::output::Output;
use skiff::repository::GitRepository;
use skiff::ssh::SshSessionFactory;
use std::env;

/// Run one deployment from the current directory.
pub async fn deploy(request: DeploymentRequest, mut output: Output) -> Result<()> {
    output.start_timer();

    let store = ProfileStore::open_default()?;
    let repository = GitRepository::new(env::current_dir()?);
    let sessions = SshSessionFactory::new();

    output.progress(&format!(
        "{} {} to {}",
        if request.dry_run {
            "Simulating deployment of"
        } else {
            "Deploying"
        },
        request.target_branch,
        request.environment
    ));

    let deployer = Deployer::new(
        &store,
        &repository,
        &sessions,
        &ShellRunner,
        &TerminalPrompter,
    )
    .observer(&output);
    let report = deployer.run(request).await?;

    finish(&report, &output);
    Ok(())
}

/// Print warnings and the final summary for a successful run.
fn finish(report: &DeploymentReport, output: &Output) {
    for warning in &report.warnings {
        output.warning(&warning.message);
    }
    output.json(report);

    let mut summary = if report.dry_run {
        format!(
            "Dry run complete: {} → {} ({})",
            report.branch, report.environment, report.host
        )
    } else {
        format!(
            "Deployed {} to {} ({}) at {}",
            report.branch,
            report.environment,
            report.host,
            report.completed_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
    };
    if report.is_unverified() {
        summary.push_str(" [unverified]");
    }
    output.success(&summary);

    if let Some(url) = &report.public_url {
        output.progress(&format!("  {url}"));
    }
    if let Some(backup) = &report.backup_name {
        output.progress(&format!("  Backup: {backup}"));
    }
}
