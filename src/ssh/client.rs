// ABOUTME: SSH session management using russh.
// ABOUTME: Handles connection, password or key authentication, and command execution.

use super::error::{Error, Result};
use crate::config::{Credential, KeyMaterial, ServerProfile};
use crate::remote::quote;
use parking_lot::Mutex;
use russh::client::{self, Config, Handle, Msg};
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, decode_secret_key, load_secret_key, ssh_key};
use russh::{Channel, ChannelMsg, Disconnect};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// How the session proves its identity.
#[derive(Clone)]
pub enum SessionAuth {
    Password(String),
    KeyFile {
        path: PathBuf,
        passphrase: Option<String>,
    },
    KeyInline {
        key: String,
        passphrase: Option<String>,
    },
}

impl std::fmt::Debug for SessionAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionAuth::Password(_) => f.write_str("Password"),
            SessionAuth::KeyFile { path, .. } => f.debug_struct("KeyFile").field("path", path).finish(),
            SessionAuth::KeyInline { .. } => f.write_str("KeyInline"),
        }
    }
}

impl From<&Credential> for SessionAuth {
    fn from(credential: &Credential) -> Self {
        match credential {
            Credential::Password(password) => SessionAuth::Password(password.clone()),
            Credential::PrivateKey { key, passphrase } => match key {
                KeyMaterial::File(path) => SessionAuth::KeyFile {
                    path: expand_home(path),
                    passphrase: passphrase.clone(),
                },
                KeyMaterial::Inline(key) => SessionAuth::KeyInline {
                    key: key.clone(),
                    passphrase: passphrase.clone(),
                },
            },
        }
    }
}

/// Configuration for establishing an SSH session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Remote host to connect to.
    pub host: String,
    /// SSH port (default: 22).
    pub port: u16,
    /// Username for authentication.
    pub user: String,
    pub auth: SessionAuth,
    /// Whether to accept unknown hosts (Trust On First Use).
    /// If false, connection to unknown hosts will fail.
    pub trust_on_first_use: bool,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Timeout for command execution (default: 5 minutes).
    pub command_timeout: Duration,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>, auth: SessionAuth) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            auth,
            trust_on_first_use: false,
            known_hosts_path: None,
            command_timeout: Duration::from_secs(300), // 5 minutes
        }
    }

    pub fn from_profile(profile: &ServerProfile) -> Self {
        Self::new(
            &profile.host,
            &profile.username,
            SessionAuth::from(&profile.credential),
        )
        .port(profile.port)
        .trust_on_first_use(profile.trust_first_connection)
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    fn target(&self) -> String {
        format!("{}@{}:{}", self.user, self.host, self.port)
    }
}

/// Output from a remote command execution.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code of the command.
    pub exit_code: u32,
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// SSH client handler for russh.
pub(crate) struct SshHandler {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    known_hosts_path: Option<PathBuf>,
}

impl SshHandler {
    fn new(
        host: String,
        port: u16,
        trust_on_first_use: bool,
        known_hosts_path: Option<PathBuf>,
    ) -> Self {
        Self {
            host,
            port,
            trust_on_first_use,
            known_hosts_path,
        }
    }
}

impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let check_result = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match check_result {
            Ok(true) => Ok(true),
            Ok(false) => {
                // Host not in known_hosts
                if self.trust_on_first_use {
                    tracing::warn!(
                        "Trust-On-First-Use: accepting unknown host key for {}:{}",
                        self.host,
                        self.port
                    );
                    let learn_result = match &self.known_hosts_path {
                        Some(path) => {
                            learn_known_hosts_path(&self.host, self.port, server_public_key, path)
                        }
                        None => learn_known_hosts(&self.host, self.port, server_public_key),
                    };
                    if let Err(e) = learn_result {
                        tracing::warn!("Failed to save host key to known_hosts: {}", e);
                    }
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::error!("host key for {}:{} has changed", self.host, self.port);
                Ok(false)
            }
            Err(_) => Ok(self.trust_on_first_use),
        }
    }
}

/// Key or password resolved from config.
enum AuthMethod {
    Password(String),
    Key(Arc<ssh_key::PrivateKey>),
}

/// An SSH session. Created unconnected; `connect` opens it and `disconnect` closes it.
pub struct Session {
    config: SessionConfig,
    handle: Mutex<Option<Arc<Handle<SshHandler>>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            handle: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.handle.lock().is_some()
    }

    /// Connect and authenticate. A no-op when already connected.
    pub async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }

        let config = &self.config;
        // Resolve credentials before touching the network.
        let auth_method = Self::resolve_auth_method(config)?;

        let russh_config = Config {
            inactivity_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };

        let handler = SshHandler::new(
            config.host.clone(),
            config.port,
            config.trust_on_first_use,
            config.known_hosts_path.clone(),
        );

        tracing::debug!("connecting to {}", config.target());
        let mut session = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            handler,
        )
        .await
        .map_err(|e| match e {
            russh::Error::UnknownKey => Error::HostKeyRejected(config.host.clone()),
            e if e.to_string().contains("Connection refused") => Error::Connection(format!(
                "connection refused to {}:{}",
                config.host, config.port
            )),
            e => Error::Connection(e.to_string()),
        })?;

        let authenticated = match Self::authenticate(&mut session, config, auth_method).await {
            Ok(success) => success,
            Err(e) => {
                let _ = session.disconnect(Disconnect::ByApplication, "", "en").await;
                return Err(e);
            }
        };
        if !authenticated {
            let _ = session.disconnect(Disconnect::ByApplication, "", "en").await;
            return Err(Error::AuthenticationFailed(config.target()));
        }

        tracing::debug!("authenticated as {}", config.target());
        *self.handle.lock() = Some(Arc::new(session));
        Ok(())
    }

    fn resolve_auth_method(config: &SessionConfig) -> Result<AuthMethod> {
        match &config.auth {
            SessionAuth::Password(password) => Ok(AuthMethod::Password(password.clone())),
            SessionAuth::KeyFile { path, passphrase } => {
                let key = load_secret_key(path, passphrase.as_deref()).map_err(|e| {
                    Error::KeyLoadFailed {
                        path: path.clone(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(AuthMethod::Key(Arc::new(key)))
            }
            SessionAuth::KeyInline { key, passphrase } => {
                let key = decode_secret_key(key, passphrase.as_deref())
                    .map_err(|e| Error::KeyDecodeFailed(e.to_string()))?;
                Ok(AuthMethod::Key(Arc::new(key)))
            }
        }
    }

    async fn authenticate(
        session: &mut Handle<SshHandler>,
        config: &SessionConfig,
        auth_method: AuthMethod,
    ) -> Result<bool> {
        match auth_method {
            AuthMethod::Password(password) => {
                let result = session
                    .authenticate_password(&config.user, password)
                    .await
                    .map_err(Error::Protocol)?;
                Ok(result.success())
            }
            AuthMethod::Key(key) => {
                let hash_alg = session
                    .best_supported_rsa_hash()
                    .await
                    .map_err(Error::Protocol)?
                    .flatten();

                let result = session
                    .authenticate_publickey(&config.user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await
                    .map_err(Error::Protocol)?;

                Ok(result.success())
            }
        }
    }

    pub(crate) fn handle(&self) -> Result<Arc<Handle<SshHandler>>> {
        self.handle.lock().as_ref().map(Arc::clone).ok_or(Error::NotConnected)
    }

    /// Check if a file or directory exists on the remote host.
    pub async fn file_exists(&self, path: &str) -> Result<bool> {
        let output = self
            .exec(&format!("test -e {} && echo exists", quote(path)))
            .await?;
        Ok(output.success() && output.stdout.trim() == "exists")
    }

    /// Execute a command on the remote host.
    pub async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.exec_with_timeout(command, self.config.command_timeout)
            .await
    }

    /// Execute a command with a custom timeout.
    pub async fn exec_with_timeout(
        &self,
        command: &str,
        timeout: Duration,
    ) -> Result<CommandOutput> {
        match tokio::time::timeout(timeout, self.exec_inner(command)).await {
            Ok(result) => result,
            Err(_) => Err(Error::CommandTimeout(timeout)),
        }
    }

    async fn exec_inner(&self, command: &str) -> Result<CommandOutput> {
        tracing::debug!("exec: {}", command);
        let mut channel = self.open_exec(command).await?;
        collect_output(&mut channel).await
    }

    /// Open a session channel and start `command` on it.
    pub(crate) async fn open_exec(&self, command: &str) -> Result<Channel<Msg>> {
        let handle = self.handle()?;
        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;

        Ok(channel)
    }

    /// Disconnect the session. Calling it again, or before connecting, does nothing.
    pub async fn disconnect(&self) -> Result<()> {
        let handle = self.handle.lock().take();
        let Some(handle) = handle else {
            return Ok(());
        };

        tracing::debug!("disconnecting from {}", self.config.target());
        handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await
            .map_err(Error::Protocol)?;
        Ok(())
    }
}

/// Drain a channel until the command has exited and its output is closed.
pub(crate) async fn collect_output(channel: &mut Channel<Msg>) -> Result<CommandOutput> {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let mut exit_code = 0u32;

    let mut got_exit_status = false;
    let mut got_eof = false;

    loop {
        match channel.wait().await {
            Some(ChannelMsg::Data { data }) => {
                stdout.extend_from_slice(&data);
            }
            Some(ChannelMsg::ExtendedData { data, ext }) => {
                if ext == 1 {
                    // stderr
                    stderr.extend_from_slice(&data);
                }
            }
            Some(ChannelMsg::ExitStatus { exit_status }) => {
                exit_code = exit_status;
                got_exit_status = true;
                if got_eof {
                    break;
                }
            }
            Some(ChannelMsg::Eof) => {
                got_eof = true;
                if got_exit_status {
                    break;
                }
            }
            Some(ChannelMsg::Close) => {
                break;
            }
            Some(_) => {}
            None => break,
        }
    }

    // No exit status means the channel died under us (timeout, network).
    if !got_exit_status {
        return Err(Error::ChannelClosed);
    }

    Ok(CommandOutput {
        exit_code,
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr: String::from_utf8_lossy(&stderr).to_string(),
    })
}

/// Prefix `command` with a `cd` into `dir`.
pub(crate) fn in_dir(command: &str, dir: Option<&str>) -> String {
    match dir {
        Some(dir) => format!("cd {} && {}", quote(dir), command),
        None => command.to_string(),
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
