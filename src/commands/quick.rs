// ABOUTME: Quick command implementation.
// ABOUTME: Asks for environment, branch and dry-run, then hands off to deploy.

use super::deploy;
use dialoguer::{Confirm, Input, Select};
use skiff::deploy::{DEFAULT_BRANCH, DeploymentRequest};
use skiff::error::Result;
use skiff::output::Output;
use skiff::types::Environment;

pub async fn quick(output: Output) -> Result<()> {
    let environments: Vec<&str> = Environment::ALL.iter().map(Environment::as_str).collect();
    let choice = Select::new()
        .with_prompt("Deploy to")
        .items(&environments)
        .default(1)
        .interact()?;

    let branch: String = Input::new()
        .with_prompt("Branch")
        .default(DEFAULT_BRANCH.to_string())
        .interact_text()?;

    let dry_run = Confirm::new()
        .with_prompt("Dry run?")
        .default(false)
        .interact()?;

    let request = DeploymentRequest::new(environments[choice])
        .branch(branch)
        .dry_run(dry_run);
    deploy(request, output).await
}
