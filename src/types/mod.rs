// ABOUTME: Validated domain types shared across modules.
// ABOUTME: Environment names, profile names, and absolute remote paths.

mod environment;
mod remote_path;
mod server_name;

pub use environment::{Environment, UnknownEnvironment};
pub use remote_path::{RemotePath, RemotePathError};
pub use server_name::{ServerName, ServerNameError};
