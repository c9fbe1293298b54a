// ABOUTME: Status command implementation.
// ABOUTME: Resolves the environment's profile and prints a best-effort server snapshot.

use skiff::config::{ConfigError, ProfileSource, ProfileStore};
use skiff::error::Result;
use skiff::output::{Output, OutputMode};
use skiff::ssh::SshSessionFactory;
use skiff::status;
use skiff::types::Environment;

pub async fn status(env: &str, output: &Output) -> Result<()> {
    let environment: Environment = env.parse()?;
    let store = ProfileStore::open_default()?;
    let profile = store
        .resolve(environment)?
        .ok_or(ConfigError::NoProfile(environment))?;

    output.progress(&format!("  → Connecting to {}...", profile.address()));
    let snapshot = status::gather(&SshSessionFactory::new(), &profile).await?;

    match output.mode() {
        OutputMode::Json => output.json(&snapshot),
        _ => output.line(&snapshot.render()),
    }
    Ok(())
}
