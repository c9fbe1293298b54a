// ABOUTME: Logs command implementation.
// ABOUTME: Prints the tail of the remote log, or follows it until Ctrl-C.

use skiff::config::{ConfigError, ProfileSource, ProfileStore};
use skiff::error::Result;
use skiff::logs;
use skiff::output::Output;
use skiff::ssh::SshSessionFactory;
use skiff::types::Environment;

pub async fn logs(env: &str, lines: usize, follow: bool, output: &Output) -> Result<()> {
    let environment: Environment = env.parse()?;
    let store = ProfileStore::open_default()?;
    let profile = store
        .resolve(environment)?
        .ok_or(ConfigError::NoProfile(environment))?;
    let sessions = SshSessionFactory::new();

    if !follow {
        for line in logs::recent(&sessions, &profile, lines).await? {
            output.line(&line);
        }
        return Ok(());
    }

    output.progress(&format!(
        "Following {} on {} (Ctrl-C to stop)",
        profile.log_file(),
        profile.host
    ));
    let interrupted = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("cannot listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    logs::follow(&sessions, &profile, lines, |line| output.line(line), interrupted).await?;
    Ok(())
}
