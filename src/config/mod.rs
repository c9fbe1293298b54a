// ABOUTME: Server profile store backed by a YAML file.
// ABOUTME: Resolves an environment to exactly one profile; supports add, list, remove.

mod init;
mod profile;
mod server;

pub use profile::{
    Credential, DEFAULT_PORT, DEFAULT_SETTLE_TIME, KeyMaterial, ServerProfile, StageCommands,
    UploadMode,
};
pub use server::ServerAddress;

use crate::types::{Environment, ServerName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable overriding the store location.
pub const CONFIG_ENV_VAR: &str = "SKIFF_CONFIG";
pub const CONFIG_DIR: &str = "skiff";
pub const CONFIG_FILENAME: &str = "servers.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("profile store not found at {0} (run `skiff config --init`)")]
    StoreNotFound(PathBuf),

    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("unknown server: {0}")]
    UnknownServer(String),

    #[error("server already exists: {0}")]
    DuplicateServer(String),

    #[error("no server profile configured for environment {0}")]
    NoProfile(Environment),

    #[error("multiple servers configured for environment {environment}: {names}")]
    AmbiguousEnvironment {
        environment: Environment,
        names: String,
    },

    #[error("cannot determine configuration directory")]
    NoConfigDir,

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Read-side contract the orchestrator depends on.
///
/// Implementations re-read their source on every call.
pub trait ProfileSource: Send + Sync {
    fn resolve(&self, environment: Environment) -> Result<Option<ServerProfile>>;
}

/// Contents of the store file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreFile {
    #[serde(default)]
    pub servers: BTreeMap<ServerName, ServerProfile>,
}

impl StoreFile {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(ConfigError::from)
    }

    /// Profile for an environment, erroring when more than one matches.
    pub fn for_environment(&self, environment: Environment) -> Result<Option<&ServerProfile>> {
        let matches: Vec<_> = self
            .servers
            .iter()
            .filter(|(_, profile)| profile.environment == environment)
            .collect();

        match matches.as_slice() {
            [] => Ok(None),
            [(_, profile)] => Ok(Some(profile)),
            _ => Err(ConfigError::AmbiguousEnvironment {
                environment,
                names: matches
                    .iter()
                    .map(|(name, _)| name.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

/// Profile store file on disk.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$SKIFF_CONFIG`, or `<config dir>/skiff/servers.yml`.
    pub fn open_default() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV_VAR)
            && !path.is_empty()
        {
            return Ok(Self::new(path));
        }

        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::new(dir.join(CONFIG_DIR).join(CONFIG_FILENAME)))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> Result<StoreFile> {
        if !self.exists() {
            return Err(ConfigError::StoreNotFound(self.path.clone()));
        }
        let content = std::fs::read_to_string(&self.path)?;
        StoreFile::from_yaml(&content)
    }

    pub fn save(&self, store: &StoreFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let yaml = serde_yaml::to_string(store)?;
        std::fs::write(&self.path, yaml)?;
        tracing::debug!(
            "saved {} server profile(s) to {}",
            store.servers.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Load the store, or start an empty one if the file does not exist yet.
    fn load_or_default(&self) -> Result<StoreFile> {
        match self.load() {
            Err(ConfigError::StoreNotFound(_)) => Ok(StoreFile::default()),
            other => other,
        }
    }

    pub fn list(&self) -> Result<Vec<(ServerName, ServerProfile)>> {
        Ok(self.load()?.servers.into_iter().collect())
    }

    pub fn add(&self, name: ServerName, profile: ServerProfile, overwrite: bool) -> Result<()> {
        let mut store = self.load_or_default()?;
        if store.servers.contains_key(&name) && !overwrite {
            return Err(ConfigError::DuplicateServer(name.to_string()));
        }
        store.servers.insert(name, profile);
        self.save(&store)
    }

    pub fn remove(&self, name: &str) -> Result<ServerProfile> {
        let mut store = self.load()?;
        let key =
            ServerName::new(name).map_err(|_| ConfigError::UnknownServer(name.to_string()))?;
        let removed = store
            .servers
            .remove(&key)
            .ok_or_else(|| ConfigError::UnknownServer(name.to_string()))?;
        self.save(&store)?;
        Ok(removed)
    }

    /// Write the starter template.
    pub fn init(&self, force: bool) -> Result<()> {
        init::write_template(&self.path, force)
    }
}

impl ProfileSource for ProfileStore {
    fn resolve(&self, environment: Environment) -> Result<Option<ServerProfile>> {
        let store = self.load()?;
        Ok(store.for_environment(environment)?.cloned())
    }
}
