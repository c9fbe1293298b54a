// ABOUTME: File transfer over SSH exec channels.
// ABOUTME: Streams local bytes into `cat > path`; tree uploads copy files with bounded parallelism.

use super::client::{Session, SshHandler, collect_output};
use crate::remote::{ExcludeRules, ExecError, TransferError, TransferSummary, quote};
use futures::{StreamExt, TryStreamExt};
use ignore::WalkBuilder;
use russh::client::Handle;
use std::collections::BTreeSet;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on files in flight during one transfer.
pub const MAX_PARALLEL_TRANSFERS: usize = 8;

/// Directories per `mkdir -p` invocation.
const MKDIR_BATCH: usize = 200;

/// Local files and the remote directories they need, relative to the upload root.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct TransferPlan {
    pub dirs: BTreeSet<String>,
    pub files: Vec<(PathBuf, String)>,
}

impl TransferPlan {
    /// Walk `root`, pruning excluded entries.
    pub(crate) fn for_tree(root: &Path, exclude: &ExcludeRules) -> Result<Self, TransferError> {
        if !root.is_dir() {
            return Err(TransferError::Local {
                path: root.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "upload directory does not exist",
                ),
            });
        }

        let rules = exclude.clone();
        let walker = WalkBuilder::new(root)
            .standard_filters(false)
            .follow_links(false)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                entry.depth() == 0 || !rules.excludes_name(entry.file_name())
            })
            .build();

        let mut plan = TransferPlan::default();
        for entry in walker {
            let entry = entry.map_err(|e| TransferError::Local {
                path: root.to_path_buf(),
                source: std::io::Error::other(e.to_string()),
            })?;
            if entry.depth() == 0 {
                continue;
            }

            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let relative = to_remote_relative(relative);

            match entry.file_type() {
                Some(ft) if ft.is_dir() => {
                    plan.dirs.insert(relative);
                }
                Some(ft) if ft.is_file() => {
                    plan.files.push((entry.path().to_path_buf(), relative));
                }
                _ => {
                    tracing::debug!("skipping non-regular entry {}", entry.path().display());
                }
            }
        }

        Ok(plan)
    }

    /// Plan for an explicit file list under `root`.
    pub(crate) fn for_files(root: &Path, files: &[PathBuf]) -> Result<Self, TransferError> {
        let mut plan = TransferPlan::default();
        for file in files {
            if file.components().any(|c| c == Component::ParentDir) {
                return Err(TransferError::Local {
                    path: file.clone(),
                    source: std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        "path leaves the working tree",
                    ),
                });
            }

            let local = root.join(file);
            if !local.is_file() {
                return Err(TransferError::Local {
                    path: local,
                    source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a file"),
                });
            }

            let relative = if file.is_absolute() {
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            } else {
                to_remote_relative(file)
            };

            if let Some((parent, _)) = relative.rsplit_once('/') {
                plan.dirs.insert(parent.to_string());
            }
            plan.files.push((local, relative));
        }
        Ok(plan)
    }
}

/// Relative local path as a `/`-separated remote suffix, dropping `.`.
fn to_remote_relative(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn remote_join(base: &str, relative: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), relative)
}

impl Session {
    /// Copy a local tree into `remote_dir`.
    pub async fn upload_tree(
        &self,
        local_dir: &Path,
        remote_dir: &str,
        exclude: &ExcludeRules,
    ) -> Result<TransferSummary, TransferError> {
        let plan = TransferPlan::for_tree(local_dir, exclude)?;
        tracing::info!(
            "uploading {} file(s) from {} to {}",
            plan.files.len(),
            local_dir.display(),
            remote_dir
        );
        self.run_plan(plan, remote_dir).await
    }

    /// Copy listed files, relative to `local_root`, into `remote_dir`.
    pub async fn upload_files(
        &self,
        local_root: &Path,
        files: &[PathBuf],
        remote_dir: &str,
    ) -> Result<TransferSummary, TransferError> {
        let plan = TransferPlan::for_files(local_root, files)?;
        self.run_plan(plan, remote_dir).await
    }

    async fn run_plan(
        &self,
        plan: TransferPlan,
        remote_dir: &str,
    ) -> Result<TransferSummary, TransferError> {
        self.create_remote_dirs(remote_dir, &plan.dirs).await?;

        let handle = self.handle().map_err(ExecError::from)?;
        let timeout = self.config().command_timeout;

        futures::stream::iter(plan.files.into_iter().map(|(local, relative)| {
            let handle = Arc::clone(&handle);
            let remote = remote_join(remote_dir, &relative);
            async move { upload_file(&handle, &local, &remote, timeout).await }
        }))
        .buffer_unordered(MAX_PARALLEL_TRANSFERS)
        .try_fold(TransferSummary::default(), |mut total, bytes| async move {
            total.files += 1;
            total.bytes += bytes;
            Ok(total)
        })
        .await
    }

    async fn create_remote_dirs(
        &self,
        remote_dir: &str,
        dirs: &BTreeSet<String>,
    ) -> Result<(), TransferError> {
        let mut targets = vec![remote_dir.to_string()];
        targets.extend(dirs.iter().map(|d| remote_join(remote_dir, d)));

        for batch in targets.chunks(MKDIR_BATCH) {
            let args: Vec<String> = batch.iter().map(|d| quote(d)).collect();
            let output = self
                .exec(&format!("mkdir -p {}", args.join(" ")))
                .await
                .map_err(ExecError::from)?;
            if !output.success() {
                return Err(TransferError::Remote {
                    path: remote_dir.to_string(),
                    reason: output.stderr.trim().to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Stream one local file into `remote` and return its size.
async fn upload_file(
    handle: &Handle<SshHandler>,
    local: &Path,
    remote: &str,
    timeout: Duration,
) -> Result<u64, TransferError> {
    let file = tokio::fs::File::open(local)
        .await
        .map_err(|source| TransferError::Local {
            path: local.to_path_buf(),
            source,
        })?;
    let size = file.metadata().await.map(|m| m.len()).unwrap_or(0);

    let remote_err = |reason: String| TransferError::Remote {
        path: remote.to_string(),
        reason,
    };

    let copy = async {
        let mut channel = handle
            .channel_open_session()
            .await
            .map_err(|e| remote_err(format!("failed to open channel: {e}")))?;
        channel
            .exec(true, format!("cat > {}", quote(remote)))
            .await
            .map_err(|e| remote_err(e.to_string()))?;
        channel
            .data(file)
            .await
            .map_err(|e| remote_err(e.to_string()))?;
        channel.eof().await.map_err(|e| remote_err(e.to_string()))?;

        let output = collect_output(&mut channel)
            .await
            .map_err(|e| remote_err(e.to_string()))?;
        if !output.success() {
            return Err(remote_err(output.stderr.trim().to_string()));
        }
        Ok(size)
    };

    match tokio::time::timeout(timeout, copy).await {
        Ok(result) => {
            tracing::debug!("uploaded {} -> {}", local.display(), remote);
            result
        }
        Err(_) => Err(remote_err(format!("timed out after {timeout:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn sample_tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("assets/img")).unwrap();
        fs::create_dir_all(root.join("node_modules/lib")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::write(root.join("index.html"), "<html/>").unwrap();
        fs::write(root.join("assets/app.js"), "js").unwrap();
        fs::write(root.join("assets/img/logo.png"), "png").unwrap();
        fs::write(root.join("node_modules/lib/index.js"), "dep").unwrap();
        fs::write(root.join(".git/HEAD"), "ref").unwrap();
        fs::write(root.join(".env"), "SECRET=1").unwrap();
        dir
    }

    #[test]
    fn tree_plan_prunes_excluded_entries() {
        let dir = sample_tree();
        let plan = TransferPlan::for_tree(dir.path(), &ExcludeRules::deploy_default()).unwrap();

        let files: Vec<&str> = plan.files.iter().map(|(_, r)| r.as_str()).collect();
        assert_eq!(files, vec!["assets/app.js", "assets/img/logo.png", "index.html"]);

        let dirs: Vec<&str> = plan.dirs.iter().map(String::as_str).collect();
        assert_eq!(dirs, vec!["assets", "assets/img"]);
    }

    #[test]
    fn tree_plan_without_rules_keeps_everything() {
        let dir = sample_tree();
        let plan = TransferPlan::for_tree(dir.path(), &ExcludeRules::none()).unwrap();
        assert_eq!(plan.files.len(), 6);
    }

    #[test]
    fn missing_tree_is_a_local_error() {
        let err = TransferPlan::for_tree(Path::new("/nonexistent/dist"), &ExcludeRules::none())
            .unwrap_err();
        assert!(matches!(err, TransferError::Local { .. }));
    }

    #[test]
    fn file_plan_keeps_relative_layout() {
        let dir = sample_tree();
        let files = vec![PathBuf::from("index.html"), PathBuf::from("./assets/app.js")];
        let plan = TransferPlan::for_files(dir.path(), &files).unwrap();

        let remote: Vec<&str> = plan.files.iter().map(|(_, r)| r.as_str()).collect();
        assert_eq!(remote, vec!["index.html", "assets/app.js"]);
        assert!(plan.dirs.contains("assets"));
    }

    #[test]
    fn file_plan_rejects_missing_file() {
        let dir = sample_tree();
        let err =
            TransferPlan::for_files(dir.path(), &[PathBuf::from("missing.txt")]).unwrap_err();
        assert!(matches!(err, TransferError::Local { .. }));
    }

    #[test]
    fn file_plan_rejects_parent_components() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("project")).unwrap();
        fs::create_dir_all(dir.path().join("secrets")).unwrap();
        fs::write(dir.path().join("secrets/key"), "key").unwrap();

        let root = dir.path().join("project");
        for file in ["../secrets/key", "assets/../../secrets/key"] {
            let err = TransferPlan::for_files(&root, &[PathBuf::from(file)]).unwrap_err();
            match err {
                TransferError::Local { path, source } => {
                    assert_eq!(path, PathBuf::from(file));
                    assert_eq!(source.kind(), std::io::ErrorKind::InvalidInput);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }
    }

    #[test]
    fn remote_join_handles_trailing_slash() {
        assert_eq!(remote_join("/srv/app/", "a/b.js"), "/srv/app/a/b.js");
        assert_eq!(remote_join("/srv/app", "x"), "/srv/app/x");
    }
}
