// ABOUTME: Config command implementation.
// ABOUTME: Template init, interactive add-server wizard, list and remove against the profile store.

use dialoguer::{Confirm, Input, Password, Select};
use skiff::config::{
    Credential, DEFAULT_SETTLE_TIME, KeyMaterial, ProfileStore, ServerAddress, ServerProfile,
    StageCommands, UploadMode,
};
use skiff::error::{Error, Result};
use skiff::output::Output;
use skiff::types::{Environment, RemotePath, ServerName};
use std::path::PathBuf;

pub fn config_init(force: bool, output: &Output) -> Result<()> {
    let store = ProfileStore::open_default()?;
    store.init(force)?;
    output.success(&format!("Wrote template to {}", store.path().display()));
    Ok(())
}

pub fn config_list(output: &Output) -> Result<()> {
    let store = ProfileStore::open_default()?;
    let servers = store.list()?;

    if servers.is_empty() {
        output.success(&format!("No servers configured in {}", store.path().display()));
        return Ok(());
    }

    for (name, profile) in &servers {
        output.line(&format!(
            "{:<20} {:<12} {:<32} {}",
            name.as_str(),
            profile.environment.as_str(),
            profile.address(),
            profile.deploy_path
        ));
    }
    Ok(())
}

pub fn config_remove(name: &str, output: &Output) -> Result<()> {
    let store = ProfileStore::open_default()?;
    let removed = store.remove(name)?;
    output.success(&format!("Removed {name} ({})", removed.environment));
    Ok(())
}

pub fn config_add_server(name: &str, force: bool, output: &Output) -> Result<()> {
    let name = ServerName::new(name)?;
    let store = ProfileStore::open_default()?;

    output.progress(&format!("Adding server {name}"));
    let profile = prompt_profile(&name)?;

    let environment = profile.environment;
    store.add(name.clone(), profile, force)?;
    output.success(&format!(
        "Saved {name} for {environment} to {}",
        store.path().display()
    ));
    Ok(())
}

fn prompt_profile(name: &ServerName) -> Result<ServerProfile> {
    let environments: Vec<&str> = Environment::ALL.iter().map(Environment::as_str).collect();
    let choice = Select::new()
        .with_prompt("Environment")
        .items(&environments)
        .default(1)
        .interact()?;
    let environment = Environment::ALL[choice];

    let address: String = Input::new()
        .with_prompt("Server ([user@]host[:port])")
        .interact_text()?;
    let address = ServerAddress::parse(&address).map_err(Error::InvalidInput)?;
    let username = match address.user {
        Some(user) => user,
        None => Input::new()
            .with_prompt("Username")
            .default("deploy".to_string())
            .interact_text()?,
    };
    let credential = prompt_credential()?;

    let deploy_path = prompt_remote_path("Deploy path", format!("/srv/{name}"))?;
    let backup_path = prompt_remote_path("Backup path", format!("/srv/backups/{name}"))?;

    let local_dir: String = Input::new()
        .with_prompt("Local directory to upload")
        .default(".".to_string())
        .interact_text()?;

    let commands = StageCommands {
        build_local: optional_input("Local build command")?,
        install_remote: optional_input("Remote install command")?,
        build_remote: optional_input("Remote build command")?,
        restart_remote: optional_input("Restart command")?,
        verify_remote: optional_input("Verify command")?,
    };
    let public_url = optional_input("Public URL")?;

    let trust_first_connection = Confirm::new()
        .with_prompt("Trust the host key on first connection?")
        .default(true)
        .interact()?;

    Ok(ServerProfile {
        environment,
        host: address.host,
        port: address.port,
        username,
        credential,
        deploy_path,
        backup_path,
        upload: UploadMode::Tree {
            local_dir: PathBuf::from(local_dir),
        },
        commands,
        public_url,
        log_path: None,
        settle_time: DEFAULT_SETTLE_TIME,
        trust_first_connection,
    })
}

fn prompt_credential() -> Result<Credential> {
    let kinds = ["Private key file", "Password"];
    let kind = Select::new()
        .with_prompt("Authentication")
        .items(&kinds)
        .default(0)
        .interact()?;

    if kind == 1 {
        let password = Password::new().with_prompt("Password").interact()?;
        return Ok(Credential::Password(password));
    }

    let path: String = Input::new()
        .with_prompt("Private key path")
        .default("~/.ssh/id_ed25519".to_string())
        .interact_text()?;
    let passphrase = Password::new()
        .with_prompt("Key passphrase (empty for none)")
        .allow_empty_password(true)
        .interact()?;

    Ok(Credential::PrivateKey {
        key: KeyMaterial::File(PathBuf::from(path)),
        passphrase: (!passphrase.is_empty()).then_some(passphrase),
    })
}

fn prompt_remote_path(prompt: &str, default: String) -> Result<RemotePath> {
    let value: String = Input::new()
        .with_prompt(prompt)
        .default(default)
        .interact_text()?;
    RemotePath::new(&value).map_err(|e| Error::InvalidInput(e.to_string()))
}

fn optional_input(prompt: &str) -> Result<Option<String>> {
    let value: String = Input::new()
        .with_prompt(format!("{prompt} (empty to skip)"))
        .allow_empty(true)
        .interact_text()?;
    let value = value.trim();
    Ok((!value.is_empty()).then(|| value.to_string()))
}
