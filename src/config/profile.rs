// ABOUTME: Server profile record: connection, credential, paths and per-stage commands.
// ABOUTME: Deserialized through a raw form so credential exclusivity is checked once, at load.

use crate::types::{Environment, RemotePath};
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Connection and command configuration for one target environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawProfile", into = "RawProfile")]
pub struct ServerProfile {
    pub environment: Environment,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub credential: Credential,
    pub deploy_path: RemotePath,
    pub backup_path: RemotePath,
    pub upload: UploadMode,
    pub commands: StageCommands,
    pub public_url: Option<String>,
    /// Remote log file followed by `skiff logs`. Defaults to `<deploy_path>/logs/app.log`.
    pub log_path: Option<String>,
    /// Pause after a successful restart before verification runs.
    pub settle_time: Duration,
    pub trust_first_connection: bool,
}

impl ServerProfile {
    /// `user@host:port`, for display.
    pub fn address(&self) -> String {
        format!("{}@{}:{}", self.username, self.host, self.port)
    }

    pub fn log_file(&self) -> String {
        self.log_path
            .clone()
            .unwrap_or_else(|| self.deploy_path.join("logs/app.log"))
    }
}

/// Exactly one way of authenticating to the remote host.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    Password(String),
    PrivateKey {
        key: KeyMaterial,
        passphrase: Option<String>,
    },
}

// Secrets stay out of logs and panics.
impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Password(_) => f.write_str("Password(<redacted>)"),
            Credential::PrivateKey { key, passphrase } => f
                .debug_struct("PrivateKey")
                .field("key", key)
                .field("passphrase", &passphrase.as_ref().map(|_| "<redacted>"))
                .finish(),
        }
    }
}

/// Where private key material lives.
#[derive(Clone, PartialEq, Eq)]
pub enum KeyMaterial {
    /// PEM/OpenSSH key text embedded in the profile store.
    Inline(String),
    /// Path to a key file, read when connecting.
    File(PathBuf),
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyMaterial::Inline(_) => f.write_str("Inline(<redacted>)"),
            KeyMaterial::File(path) => f.debug_tuple("File").field(path).finish(),
        }
    }
}

/// How the local build output reaches `deploy_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum UploadMode {
    /// Recursively copy a local directory, skipping dot-files, `node_modules` and VCS metadata.
    Tree {
        #[serde(default = "default_local_dir")]
        local_dir: PathBuf,
    },
    /// Copy an explicit list of files, relative to the working tree.
    Files {
        #[serde(with = "nonempty_paths")]
        files: NonEmpty<PathBuf>,
    },
}

impl Default for UploadMode {
    fn default() -> Self {
        UploadMode::Tree {
            local_dir: default_local_dir(),
        }
    }
}

fn default_local_dir() -> PathBuf {
    PathBuf::from(".")
}

/// Shell commands run by the deployment stages. Blank entries mean "skip".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCommands {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_local: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_remote: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verify_remote: Option<String>,
}

impl StageCommands {
    pub fn build_local(&self) -> Option<&str> {
        non_blank(&self.build_local)
    }

    pub fn install_remote(&self) -> Option<&str> {
        non_blank(&self.install_remote)
    }

    pub fn build_remote(&self) -> Option<&str> {
        non_blank(&self.build_remote)
    }

    pub fn restart_remote(&self) -> Option<&str> {
        non_blank(&self.restart_remote)
    }

    pub fn verify_remote(&self) -> Option<&str> {
        non_blank(&self.verify_remote)
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

pub const DEFAULT_PORT: u16 = 22;

/// Wait after a restart when the profile does not say otherwise.
pub const DEFAULT_SETTLE_TIME: Duration = Duration::from_secs(3);

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_settle_time() -> Duration {
    DEFAULT_SETTLE_TIME
}

fn default_trust_first_connection() -> bool {
    true
}

/// On-disk shape of a profile. Credential fields are flat here and folded
/// into [`Credential`] during conversion.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawProfile {
    environment: Environment,
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    private_key_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    passphrase: Option<String>,
    deploy_path: RemotePath,
    backup_path: RemotePath,
    #[serde(default)]
    upload: UploadMode,
    #[serde(default)]
    commands: StageCommands,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    public_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    log_path: Option<String>,
    #[serde(default = "default_settle_time", with = "humantime_serde")]
    settle_time: Duration,
    #[serde(default = "default_trust_first_connection")]
    trust_first_connection: bool,
}

impl TryFrom<RawProfile> for ServerProfile {
    type Error = String;

    fn try_from(raw: RawProfile) -> Result<Self, Self::Error> {
        if raw.host.trim().is_empty() {
            return Err("host cannot be empty".to_string());
        }
        if raw.username.trim().is_empty() {
            return Err("username cannot be empty".to_string());
        }

        let credential = match (raw.password, raw.private_key, raw.private_key_path) {
            (Some(password), None, None) => {
                if raw.passphrase.is_some() {
                    return Err("passphrase is only valid with a private key".to_string());
                }
                Credential::Password(password)
            }
            (None, Some(key), None) => Credential::PrivateKey {
                key: KeyMaterial::Inline(key),
                passphrase: raw.passphrase,
            },
            (None, None, Some(path)) => Credential::PrivateKey {
                key: KeyMaterial::File(path),
                passphrase: raw.passphrase,
            },
            (None, None, None) => {
                return Err(
                    "a credential is required: set one of password, private_key, private_key_path"
                        .to_string(),
                );
            }
            _ => {
                return Err(
                    "only one of password, private_key, private_key_path may be set".to_string(),
                );
            }
        };

        Ok(ServerProfile {
            environment: raw.environment,
            host: raw.host,
            port: raw.port,
            username: raw.username,
            credential,
            deploy_path: raw.deploy_path,
            backup_path: raw.backup_path,
            upload: raw.upload,
            commands: raw.commands,
            public_url: raw.public_url,
            log_path: raw.log_path,
            settle_time: raw.settle_time,
            trust_first_connection: raw.trust_first_connection,
        })
    }
}

impl From<ServerProfile> for RawProfile {
    fn from(profile: ServerProfile) -> Self {
        let (password, private_key, private_key_path, passphrase) = match profile.credential {
            Credential::Password(p) => (Some(p), None, None, None),
            Credential::PrivateKey { key, passphrase } => match key {
                KeyMaterial::Inline(k) => (None, Some(k), None, passphrase),
                KeyMaterial::File(path) => (None, None, Some(path), passphrase),
            },
        };

        RawProfile {
            environment: profile.environment,
            host: profile.host,
            port: profile.port,
            username: profile.username,
            password,
            private_key,
            private_key_path,
            passphrase,
            deploy_path: profile.deploy_path,
            backup_path: profile.backup_path,
            upload: profile.upload,
            commands: profile.commands,
            public_url: profile.public_url,
            log_path: profile.log_path,
            settle_time: profile.settle_time,
            trust_first_connection: profile.trust_first_connection,
        }
    }
}

mod nonempty_paths {
    use nonempty::NonEmpty;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::path::PathBuf;

    pub fn serialize<S: Serializer>(
        files: &NonEmpty<PathBuf>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        files.iter().collect::<Vec<_>>().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<NonEmpty<PathBuf>, D::Error> {
        let files: Vec<PathBuf> = Vec::deserialize(deserializer)?;
        NonEmpty::from_vec(files)
            .ok_or_else(|| serde::de::Error::custom("upload file list cannot be empty"))
    }
}
