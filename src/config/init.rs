// ABOUTME: Config scaffolding for a new profile store.
// ABOUTME: Writes a commented servers.yml template with one staging profile.

use std::path::Path;

use super::{ConfigError, Result};

pub(super) const TEMPLATE: &str = r#"# skiff server profiles
#
# Each entry maps a server name to the profile used when deploying to its
# environment (development, staging or production). At most one server per
# environment.
servers:
  web-staging:
    environment: staging
    host: staging.example.com
    port: 22
    username: deploy
    # Exactly one of: password, private_key (inline PEM), private_key_path
    private_key_path: ~/.ssh/id_ed25519
    deploy_path: /srv/app
    backup_path: /srv/backups
    upload:
      mode: tree
      local_dir: dist
    commands:
      build_local: npm run build
      install_remote: npm ci --omit=dev
      restart_remote: sudo systemctl restart app
      verify_remote: curl -fsS http://localhost:3000/health
    public_url: https://staging.example.com
    # Pause after restart before verification
    settle_time: 3s
"#;

pub(super) fn write_template(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(ConfigError::AlreadyExists(path.to_path_buf()));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, TEMPLATE)?;
    tracing::info!("wrote profile template to {}", path.display());

    Ok(())
}
