// ABOUTME: Exclusion rules for whole-tree uploads.
// ABOUTME: Skips dot-files, dependency folders and version-control metadata by name.

use std::ffi::OsStr;
use std::path::Path;

const DEFAULT_EXCLUDED_NAMES: [&str; 5] = ["node_modules", ".git", ".svn", ".hg", "CVS"];

/// Name-based predicate deciding which tree entries are not uploaded.
///
/// A matching directory is skipped with everything beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludeRules {
    hidden: bool,
    names: Vec<String>,
}

impl ExcludeRules {
    /// Rules used by the Upload stage.
    pub fn deploy_default() -> Self {
        Self {
            hidden: true,
            names: DEFAULT_EXCLUDED_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Exclude nothing.
    pub fn none() -> Self {
        Self {
            hidden: false,
            names: Vec::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Whether an entry with this file name is excluded.
    pub fn excludes_name(&self, name: &OsStr) -> bool {
        let name = name.to_string_lossy();
        if self.hidden && name.starts_with('.') && name != "." && name != ".." {
            return true;
        }
        self.names.iter().any(|n| *n == name)
    }

    /// Whether any component of a path relative to the upload root is excluded.
    pub fn excludes(&self, relative: &Path) -> bool {
        relative
            .components()
            .any(|c| self.excludes_name(c.as_os_str()))
    }
}

impl Default for ExcludeRules {
    fn default() -> Self {
        Self::deploy_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rules_skip_dotfiles_and_vcs() {
        let rules = ExcludeRules::deploy_default();
        assert!(rules.excludes(Path::new(".env")));
        assert!(rules.excludes(Path::new(".git/config")));
        assert!(rules.excludes(Path::new("node_modules/react/index.js")));
        assert!(rules.excludes(Path::new("assets/.DS_Store")));
        assert!(!rules.excludes(Path::new("index.html")));
        assert!(!rules.excludes(Path::new("assets/app.js")));
    }

    #[test]
    fn current_dir_component_is_not_hidden() {
        let rules = ExcludeRules::deploy_default();
        assert!(!rules.excludes(Path::new("./dist/app.js")));
    }

    #[test]
    fn extra_names_are_excluded() {
        let rules = ExcludeRules::none().with_name("coverage");
        assert!(rules.excludes(Path::new("coverage/lcov.info")));
        assert!(!rules.excludes(Path::new(".env")));
    }
}
