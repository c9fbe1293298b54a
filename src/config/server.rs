// ABOUTME: Parses shorthand server addresses entered in the add-server wizard.
// ABOUTME: Accepts "host", "user@host", "host:port", "user@host:port".

use super::DEFAULT_PORT;

/// A host, optional port and optional user parsed from shorthand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
}

impl ServerAddress {
    pub fn parse(s: &str) -> Result<Self, String> {
        let s = s.trim();
        if s.is_empty() {
            return Err("server address cannot be empty".to_string());
        }

        // Parse format: [user@]host[:port]
        let (user_part, rest) = if let Some(at_pos) = s.find('@') {
            (Some(&s[..at_pos]), &s[at_pos + 1..])
        } else {
            (None, s)
        };

        let (host, port) = if let Some(colon_pos) = rest.rfind(':') {
            let port_str = &rest[colon_pos + 1..];
            let port = port_str
                .parse::<u16>()
                .map_err(|_| format!("invalid port: {}", port_str))?;
            (&rest[..colon_pos], port)
        } else {
            (rest, DEFAULT_PORT)
        };

        if host.is_empty() {
            return Err("hostname cannot be empty".to_string());
        }

        if let Some(user) = user_part
            && user.is_empty()
        {
            return Err("user cannot be empty".to_string());
        }

        Ok(ServerAddress {
            host: host.to_string(),
            port,
            user: user_part.map(|s| s.to_string()),
        })
    }
}
