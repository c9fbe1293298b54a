// ABOUTME: Validated name of a server profile in the profile store.
// ABOUTME: Lowercase alphanumerics, hyphens and underscores, at most 63 characters.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerNameError {
    #[error("server name cannot be empty")]
    Empty,

    #[error("server name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("server name cannot start with a hyphen")]
    StartsWithHyphen,

    #[error("server name must be lowercase")]
    NotLowercase,

    #[error("invalid character in server name: '{0}'")]
    InvalidChar(char),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerName(String);

impl ServerName {
    pub fn new(value: &str) -> Result<Self, ServerNameError> {
        if value.is_empty() {
            return Err(ServerNameError::Empty);
        }

        if value.len() > 63 {
            return Err(ServerNameError::TooLong);
        }

        if value.starts_with('-') {
            return Err(ServerNameError::StartsWithHyphen);
        }

        for c in value.chars() {
            if c.is_ascii_uppercase() {
                return Err(ServerNameError::NotLowercase);
            }
            if !c.is_ascii_lowercase() && !c.is_ascii_digit() && c != '-' && c != '_' {
                return Err(ServerNameError::InvalidChar(c));
            }
        }

        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for ServerName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ServerName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        ServerName::new(&value).map_err(serde::de::Error::custom)
    }
}
