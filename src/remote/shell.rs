// ABOUTME: POSIX shell quoting for paths and arguments embedded in remote commands.
// ABOUTME: Wraps in single quotes, escaping embedded quotes as '\''.

/// Quote `value` so `sh` reads it as one literal word.
pub fn quote(value: &str) -> String {
    if !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "/._-+=:@,".contains(c))
    {
        return value.to_string();
    }
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_paths_are_left_alone() {
        assert_eq!(quote("/srv/app"), "/srv/app");
        assert_eq!(quote("backup-2026-01-01T00-00-00-000Z"), "backup-2026-01-01T00-00-00-000Z");
    }

    #[test]
    fn spaces_and_quotes_are_escaped() {
        assert_eq!(quote("/srv/my app"), "'/srv/my app'");
        assert_eq!(quote("it's"), "'it'\\''s'");
        assert_eq!(quote(""), "''");
        assert_eq!(quote("$HOME"), "'$HOME'");
    }
}
