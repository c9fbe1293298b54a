// ABOUTME: Local shell command execution for the build stage.
// ABOUTME: Runs `sh -c <command>` in the working tree and captures its output.

use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum LocalCommandError {
    #[error("failed to start `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` exited with {}: {stderr}", exit_code.map_or("a signal".to_string(), |c| format!("status {c}")))]
    Failed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },
}

/// Output of a successful local command.
#[derive(Debug, Clone, Default)]
pub struct LocalOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs commands on the operator's machine.
#[async_trait]
pub trait LocalShell: Send + Sync {
    async fn run(&self, command: &str, dir: &Path) -> Result<LocalOutput, LocalCommandError>;
}

/// `sh -c` via tokio.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

#[async_trait]
impl LocalShell for ShellRunner {
    async fn run(&self, command: &str, dir: &Path) -> Result<LocalOutput, LocalCommandError> {
        tracing::info!("running local command in {}: {}", dir.display(), command);

        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| LocalCommandError::Spawn {
                command: command.to_string(),
                source,
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            tracing::warn!(
                "local command failed with exit code {:?}",
                output.status.code()
            );
            return Err(LocalCommandError::Failed {
                command: command.to_string(),
                exit_code: output.status.code(),
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(LocalOutput { stdout, stderr })
    }
}
