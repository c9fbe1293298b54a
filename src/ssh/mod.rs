// ABOUTME: SSH client module for remote server connections.
// ABOUTME: Password or key authentication with known_hosts verification, exec, transfer, streaming.

mod adapter;
mod client;
mod error;
mod stream;
mod transfer;

pub use adapter::SshSessionFactory;
pub use client::{CommandOutput, Session, SessionAuth, SessionConfig};
pub use error::{Error, Result};
pub use transfer::MAX_PARALLEL_TRANSFERS;
