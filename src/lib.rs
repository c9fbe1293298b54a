// ABOUTME: Library root for skiff - exposes the deployment engine and its collaborators.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod deploy;
pub mod diagnostics;
pub mod error;
pub mod local;
pub mod logs;
pub mod output;
pub mod remote;
pub mod repository;
pub mod ssh;
pub mod status;
pub mod types;
