// ABOUTME: Command module aggregator for the skiff CLI.
// ABOUTME: Re-exports deploy, config, status, logs and quick command handlers.

mod config;
mod deploy;
mod logs;
mod quick;
mod status;

pub use config::{config_add_server, config_init, config_list, config_remove};
pub use deploy::deploy;
pub use logs::logs;
pub use quick::quick;
pub use status::status;
