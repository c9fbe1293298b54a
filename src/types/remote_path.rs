// ABOUTME: Absolute path on the remote host.
// ABOUTME: Rejects empty and relative paths so shell commands always target a fixed location.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RemotePathError {
    #[error("remote path cannot be empty")]
    Empty,

    #[error("remote path must be absolute: {0}")]
    NotAbsolute(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath(String);

impl RemotePath {
    pub fn new(value: &str) -> Result<Self, RemotePathError> {
        let value = value.trim();
        if value.is_empty() {
            return Err(RemotePathError::Empty);
        }
        if !value.starts_with('/') {
            return Err(RemotePathError::NotAbsolute(value.to_string()));
        }

        // Keep "/" intact, drop trailing slashes elsewhere so joins stay clean.
        let trimmed = value.trim_end_matches('/');
        let normalized = if trimmed.is_empty() { "/" } else { trimmed };
        Ok(Self(normalized.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a relative segment.
    pub fn join(&self, segment: &str) -> String {
        let segment = segment.trim_start_matches('/');
        if self.0 == "/" {
            format!("/{segment}")
        } else {
            format!("{}/{}", self.0, segment)
        }
    }
}

impl fmt::Display for RemotePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for RemotePath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RemotePath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        RemotePath::new(&value).map_err(serde::de::Error::custom)
    }
}
