// ABOUTME: Best-effort snapshot of a deployment target for `skiff status`.
// ABOUTME: Checks run concurrently on one session; any failing check is reported as unknown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ServerProfile;
use crate::remote::{ConnectError, RemoteSession, SessionFactory, quote};
use crate::types::Environment;

/// Marker file inside `deploy_path` written by deployment tooling.
pub const MARKER_FILE: &str = ".skiff-status.json";

/// Contents of the marker file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployMarker {
    pub deployed_at: DateTime<Utc>,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
}

impl DeployMarker {
    /// `None` for anything that is not a valid marker document.
    pub fn parse(text: &str) -> Option<Self> {
        match serde_json::from_str(text) {
            Ok(marker) => Some(marker),
            Err(e) => {
                tracing::debug!("ignoring malformed status marker: {}", e);
                None
            }
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerStatus {
    pub environment: Environment,
    pub address: String,
    pub deploy_path: String,
    pub deployed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<DeployMarker>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_url: Option<String>,
}

/// Connect, inspect, and always disconnect.
pub async fn gather(
    sessions: &dyn SessionFactory,
    profile: &ServerProfile,
) -> Result<ServerStatus, ConnectError> {
    let session = sessions.create(profile);
    session.connect().await?;
    let status = inspect(session.as_ref(), profile).await;
    session.disconnect().await;
    Ok(status)
}

/// Run every check concurrently on a connected session.
pub async fn inspect(session: &dyn RemoteSession, profile: &ServerProfile) -> ServerStatus {
    let deploy_path = profile.deploy_path.as_str();
    let marker_path = profile.deploy_path.join(MARKER_FILE);
    let marker_cmd = format!("cat {}", quote(&marker_path));
    let disk_cmd = format!("df -h {} | tail -n 1", quote(deploy_path));

    let (deployed, marker, uptime, disk) = futures::join!(
        session.file_exists(deploy_path),
        optional(session, &marker_cmd),
        optional(session, "uptime"),
        optional(session, &disk_cmd),
    );

    ServerStatus {
        environment: profile.environment,
        address: profile.address(),
        deploy_path: deploy_path.to_string(),
        deployed,
        marker: marker.as_deref().and_then(DeployMarker::parse),
        uptime,
        disk,
        public_url: profile.public_url.clone(),
    }
}

async fn optional(session: &dyn RemoteSession, command: &str) -> Option<String> {
    match session.execute(command, None).await {
        Ok(stdout) => {
            let trimmed = stdout.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Err(e) => {
            tracing::debug!("status check `{}` failed: {}", command, e);
            None
        }
    }
}

impl ServerStatus {
    /// Human-readable multi-line summary.
    pub fn render(&self) -> String {
        let unknown = "unknown";
        let mut lines = vec![
            format!("Environment: {}", self.environment),
            format!("Server:      {}", self.address),
            format!(
                "Deploy path: {} ({})",
                self.deploy_path,
                if self.deployed { "present" } else { "missing" }
            ),
        ];

        match &self.marker {
            Some(marker) => {
                let branch = marker
                    .branch
                    .as_deref()
                    .map(|b| format!(" from {b}"))
                    .unwrap_or_default();
                lines.push(format!(
                    "Last deploy: {} (version {}{})",
                    marker.deployed_at.to_rfc3339(),
                    marker.version,
                    branch
                ));
            }
            None => lines.push(format!("Last deploy: {unknown}")),
        }

        lines.push(format!("Uptime:      {}", self.uptime.as_deref().unwrap_or(unknown)));
        lines.push(format!("Disk:        {}", self.disk.as_deref().unwrap_or(unknown)));
        if let Some(url) = &self.public_url {
            lines.push(format!("URL:         {url}"));
        }
        lines.join("\n")
    }
}
