// ABOUTME: Local version-control state provider.
// ABOUTME: Reads branch, dirty flag and ahead/behind counts from git; checks out and pulls branches.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("failed to run git: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("`git {args}` failed: {stderr}")]
    Git { args: String, stderr: String },
}

/// Snapshot of the working tree taken once per run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryState {
    pub current_branch: String,
    pub has_uncommitted_changes: bool,
    pub ahead: u32,
    pub behind: u32,
}

/// Query and branch operations the orchestrator needs from version control.
///
/// Every call reads live state; nothing is cached between calls.
#[async_trait]
pub trait RepositoryProvider: Send + Sync {
    /// Working tree root used for local builds and uploads.
    fn workdir(&self) -> &Path;

    async fn is_repository(&self) -> bool;

    async fn state(&self) -> Result<RepositoryState, RepositoryError>;

    async fn checkout(&self, branch: &str) -> Result<(), RepositoryError>;

    /// Bring `branch` up to date with its upstream.
    async fn pull(&self, branch: &str) -> Result<(), RepositoryError>;
}

/// `git` CLI in a fixed directory.
#[derive(Debug, Clone)]
pub struct GitRepository {
    dir: PathBuf,
    remote: String,
}

impl GitRepository {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            remote: "origin".to_string(),
        }
    }

    pub fn remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    async fn git(&self, args: &[&str]) -> Result<String, RepositoryError> {
        tracing::debug!("git {}", args.join(" "));
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.dir)
            .output()
            .await?;

        if !output.status.success() {
            return Err(RepositoryError::Git {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    /// Commits ahead of and behind the upstream; zero when no upstream is set.
    async fn divergence(&self) -> (u32, u32) {
        match self
            .git(&["rev-list", "--left-right", "--count", "HEAD...@{upstream}"])
            .await
        {
            Ok(counts) => parse_divergence(&counts).unwrap_or((0, 0)),
            Err(e) => {
                tracing::debug!("no upstream divergence available: {}", e);
                (0, 0)
            }
        }
    }
}

fn parse_divergence(counts: &str) -> Option<(u32, u32)> {
    let mut parts = counts.split_whitespace();
    let ahead = parts.next()?.parse().ok()?;
    let behind = parts.next()?.parse().ok()?;
    Some((ahead, behind))
}

#[async_trait]
impl RepositoryProvider for GitRepository {
    fn workdir(&self) -> &Path {
        &self.dir
    }

    async fn is_repository(&self) -> bool {
        matches!(
            self.git(&["rev-parse", "--is-inside-work-tree"]).await.as_deref(),
            Ok("true")
        )
    }

    async fn state(&self) -> Result<RepositoryState, RepositoryError> {
        let current_branch = self.git(&["rev-parse", "--abbrev-ref", "HEAD"]).await?;
        let status = self.git(&["status", "--porcelain"]).await?;
        let (ahead, behind) = self.divergence().await;

        Ok(RepositoryState {
            current_branch,
            has_uncommitted_changes: !status.is_empty(),
            ahead,
            behind,
        })
    }

    async fn checkout(&self, branch: &str) -> Result<(), RepositoryError> {
        self.git(&["checkout", branch]).await.map(|_| ())
    }

    async fn pull(&self, branch: &str) -> Result<(), RepositoryError> {
        self.git(&["pull", &self.remote, branch]).await.map(|_| ())
    }
}
