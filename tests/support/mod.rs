// ABOUTME: Test support utilities.
// ABOUTME: In-memory fakes for every collaborator the deployment pipeline depends on.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use skiff::config::{
    ConfigError, Credential, ProfileSource, ServerProfile, StageCommands, UploadMode,
};
use skiff::deploy::{
    DeployError, DeployOptions, Deployer, DeploymentReport, DeploymentRequest, Prompter, Stage,
    StageObserver, StageRecord,
};
use skiff::local::{LocalCommandError, LocalOutput, LocalShell};
use skiff::remote::{
    ConnectError, ExcludeRules, ExecError, LineStream, RemoteSession, SessionFactory,
    TransferError, TransferSummary,
};
use skiff::repository::{RepositoryError, RepositoryProvider, RepositoryState};
use skiff::types::{Environment, RemotePath};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env().add_directive("skiff=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Staging profile with every stage command set and no settle delay.
pub fn profile() -> ServerProfile {
    ServerProfile {
        environment: Environment::Staging,
        host: "staging.example.com".to_string(),
        port: 22,
        username: "deploy".to_string(),
        credential: Credential::Password("secret".to_string()),
        deploy_path: RemotePath::new("/srv/app").unwrap(),
        backup_path: RemotePath::new("/srv/backups").unwrap(),
        upload: UploadMode::Tree {
            local_dir: PathBuf::from("dist"),
        },
        commands: StageCommands {
            build_local: Some("npm run build".to_string()),
            install_remote: Some("npm ci --omit=dev".to_string()),
            build_remote: Some("npm run migrate".to_string()),
            restart_remote: Some("systemctl restart app".to_string()),
            verify_remote: Some("curl -fsS http://localhost:3000/health".to_string()),
        },
        public_url: Some("https://staging.example.com".to_string()),
        log_path: None,
        settle_time: Duration::ZERO,
        trust_first_connection: true,
    }
}

// =============================================================================
// Remote session
// =============================================================================

/// One observed call on a fake session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Connect,
    Execute {
        command: String,
        working_dir: Option<String>,
    },
    FileExists(String),
    UploadTree {
        local_dir: PathBuf,
        remote_dir: String,
    },
    UploadFiles {
        files: Vec<PathBuf>,
        remote_dir: String,
    },
    StreamLines(String),
    Disconnect,
}

/// How fake sessions behave.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub fail_connect: bool,
    /// Commands containing the pattern exit with the given status.
    pub failing: Vec<(String, u32)>,
    /// Commands containing the pattern panic.
    pub panicking: Option<String>,
    /// Commands containing the pattern print the given stdout.
    pub outputs: Vec<(String, String)>,
    /// Paths reported as existing.
    pub existing: Vec<String>,
    pub fail_upload: bool,
    pub stream: Vec<String>,
    /// When false the line stream stays open after the scripted lines.
    pub stream_ends: bool,
}

/// Session factory whose sessions share one call log.
#[derive(Clone, Default)]
pub struct FakeRemote {
    script: Arc<Script>,
    calls: Arc<Mutex<Vec<Call>>>,
    created: Arc<AtomicUsize>,
}

impl FakeRemote {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn sessions_created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn connects(&self) -> usize {
        self.count(|c| matches!(c, Call::Connect))
    }

    pub fn disconnects(&self) -> usize {
        self.count(|c| matches!(c, Call::Disconnect))
    }

    pub fn uploads(&self) -> usize {
        self.count(|c| matches!(c, Call::UploadTree { .. } | Call::UploadFiles { .. }))
    }

    /// Commands passed to `execute`, in order.
    pub fn executed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Execute { command, .. } => Some(command),
                _ => None,
            })
            .collect()
    }

    fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    fn log(&self, call: Call) {
        self.calls.lock().push(call);
    }
}

impl SessionFactory for FakeRemote {
    fn create(&self, _profile: &ServerProfile) -> Box<dyn RemoteSession> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeSession {
            remote: self.clone(),
        })
    }
}

struct FakeSession {
    remote: FakeRemote,
}

#[async_trait]
impl RemoteSession for FakeSession {
    async fn connect(&self) -> Result<(), ConnectError> {
        if self.remote.script.fail_connect {
            return Err(ConnectError::Authentication("deploy@staging.example.com".into()));
        }
        self.remote.log(Call::Connect);
        Ok(())
    }

    async fn execute(&self, command: &str, working_dir: Option<&str>) -> Result<String, ExecError> {
        self.remote.log(Call::Execute {
            command: command.to_string(),
            working_dir: working_dir.map(str::to_string),
        });

        let script = &self.remote.script;
        if let Some(pattern) = &script.panicking
            && command.contains(pattern.as_str())
        {
            panic!("scripted panic on `{command}`");
        }
        if let Some((_, code)) = script.failing.iter().find(|(p, _)| command.contains(p.as_str())) {
            return Err(ExecError::NonZeroExit {
                command: command.to_string(),
                code: *code,
                stderr: "scripted failure".to_string(),
            });
        }
        if let Some(rest) = command.strip_prefix("if [ -e ")
            && let Some((path, _)) = rest.split_once(" ]")
            && !script.existing.iter().any(|p| p == path)
        {
            return Ok("absent\n".to_string());
        }
        Ok(script
            .outputs
            .iter()
            .find(|(p, _)| command.contains(p.as_str()))
            .map(|(_, out)| out.clone())
            .unwrap_or_default())
    }

    async fn file_exists(&self, path: &str) -> bool {
        self.remote.log(Call::FileExists(path.to_string()));
        self.remote.script.existing.iter().any(|p| p == path)
    }

    async fn upload_tree(
        &self,
        local_dir: &Path,
        remote_dir: &str,
        _exclude: &ExcludeRules,
    ) -> Result<TransferSummary, TransferError> {
        self.remote.log(Call::UploadTree {
            local_dir: local_dir.to_path_buf(),
            remote_dir: remote_dir.to_string(),
        });
        self.upload_result(remote_dir, 3)
    }

    async fn upload_files(
        &self,
        _local_root: &Path,
        files: &[PathBuf],
        remote_dir: &str,
    ) -> Result<TransferSummary, TransferError> {
        self.remote.log(Call::UploadFiles {
            files: files.to_vec(),
            remote_dir: remote_dir.to_string(),
        });
        self.upload_result(remote_dir, files.len())
    }

    async fn stream_lines(&self, command: &str) -> Result<LineStream, ExecError> {
        self.remote.log(Call::StreamLines(command.to_string()));
        let lines = self.remote.script.stream.clone();
        let lines = futures::stream::iter(lines.into_iter().map(Ok::<String, ExecError>));
        if self.remote.script.stream_ends {
            Ok(Box::pin(lines))
        } else {
            Ok(Box::pin(futures::StreamExt::chain(
                lines,
                futures::stream::pending(),
            )))
        }
    }

    async fn disconnect(&self) {
        self.remote.log(Call::Disconnect);
    }
}

impl FakeSession {
    fn upload_result(&self, remote_dir: &str, files: usize) -> Result<TransferSummary, TransferError> {
        if self.remote.script.fail_upload {
            return Err(TransferError::Remote {
                path: remote_dir.to_string(),
                reason: "disk full".to_string(),
            });
        }
        Ok(TransferSummary {
            files,
            bytes: files as u64 * 100,
        })
    }
}

// =============================================================================
// Profiles, repository, shell, prompter, observer
// =============================================================================

pub struct FakeProfiles {
    profile: Option<ServerProfile>,
    lookups: AtomicUsize,
}

impl FakeProfiles {
    pub fn with(profile: ServerProfile) -> Self {
        Self {
            profile: Some(profile),
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn empty() -> Self {
        Self {
            profile: None,
            lookups: AtomicUsize::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl ProfileSource for FakeProfiles {
    fn resolve(&self, environment: Environment) -> Result<Option<ServerProfile>, ConfigError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .profile
            .clone()
            .filter(|p| p.environment == environment))
    }
}

pub struct FakeRepository {
    pub is_repository: bool,
    pub fail_pull: bool,
    state: Mutex<RepositoryState>,
    calls: Mutex<Vec<String>>,
    workdir: PathBuf,
}

impl FakeRepository {
    /// Clean checkout of `branch`.
    pub fn on(branch: &str) -> Self {
        Self {
            is_repository: true,
            fail_pull: false,
            state: Mutex::new(RepositoryState {
                current_branch: branch.to_string(),
                has_uncommitted_changes: false,
                ahead: 0,
                behind: 0,
            }),
            calls: Mutex::new(Vec::new()),
            workdir: PathBuf::from("/work/project"),
        }
    }

    pub fn dirty(self) -> Self {
        self.state.lock().has_uncommitted_changes = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl RepositoryProvider for FakeRepository {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    async fn is_repository(&self) -> bool {
        self.calls.lock().push("is_repository".to_string());
        self.is_repository
    }

    async fn state(&self) -> Result<RepositoryState, RepositoryError> {
        self.calls.lock().push("state".to_string());
        Ok(self.state.lock().clone())
    }

    async fn checkout(&self, branch: &str) -> Result<(), RepositoryError> {
        self.calls.lock().push(format!("checkout {branch}"));
        self.state.lock().current_branch = branch.to_string();
        Ok(())
    }

    async fn pull(&self, branch: &str) -> Result<(), RepositoryError> {
        self.calls.lock().push(format!("pull {branch}"));
        if self.fail_pull {
            return Err(RepositoryError::Git {
                args: format!("pull origin {branch}"),
                stderr: "could not read from remote repository".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeShell {
    pub fail: bool,
    commands: Mutex<Vec<(String, PathBuf)>>,
}

impl FakeShell {
    pub fn commands(&self) -> Vec<(String, PathBuf)> {
        self.commands.lock().clone()
    }
}

#[async_trait]
impl LocalShell for FakeShell {
    async fn run(&self, command: &str, dir: &Path) -> Result<LocalOutput, LocalCommandError> {
        self.commands
            .lock()
            .push((command.to_string(), dir.to_path_buf()));
        if self.fail {
            return Err(LocalCommandError::Failed {
                command: command.to_string(),
                exit_code: Some(1),
                stderr: "build broke".to_string(),
            });
        }
        Ok(LocalOutput::default())
    }
}

/// Answers prompts from a queue; an exhausted queue answers "no".
#[derive(Default)]
pub struct ScriptedPrompter {
    answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedPrompter {
    pub fn answering(answers: &[bool]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().clone()
    }
}

impl Prompter for ScriptedPrompter {
    fn confirm(&self, message: &str) -> bool {
        self.asked.lock().push(message.to_string());
        self.answers.lock().pop_front().unwrap_or(false)
    }
}

/// Observer event, for ordering assertions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(Stage),
    Finished(StageRecord),
    Failed(Stage),
}

#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<Event>>,
    started_at: Mutex<Vec<(Stage, tokio::time::Instant)>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Runtime clock reading when `stage` started. Follows paused test time.
    pub fn started_at(&self, stage: Stage) -> Option<tokio::time::Instant> {
        self.started_at
            .lock()
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, at)| *at)
    }
}

impl StageObserver for RecordingObserver {
    fn stage_started(&self, stage: Stage) {
        self.events.lock().push(Event::Started(stage));
        self.started_at
            .lock()
            .push((stage, tokio::time::Instant::now()));
    }

    fn stage_finished(&self, record: &StageRecord) {
        self.events.lock().push(Event::Finished(record.clone()));
    }

    fn stage_failed(&self, stage: Stage, _error: &DeployError) {
        self.events.lock().push(Event::Failed(stage));
    }
}

// =============================================================================
// Harness
// =============================================================================

/// All fakes wired together. Defaults: clean `main`, staging profile, every prompt answered yes.
pub struct Harness {
    pub profiles: FakeProfiles,
    pub repository: FakeRepository,
    pub remote: FakeRemote,
    pub shell: FakeShell,
    pub prompter: ScriptedPrompter,
    pub observer: RecordingObserver,
    pub options: DeployOptions,
}

impl Harness {
    pub fn new() -> Self {
        init_tracing();
        Self {
            profiles: FakeProfiles::with(profile()),
            repository: FakeRepository::on("main"),
            remote: FakeRemote::new(Script {
                existing: vec!["/srv/app".to_string()],
                ..Script::default()
            }),
            shell: FakeShell::default(),
            prompter: ScriptedPrompter::answering(&[true, true]),
            observer: RecordingObserver::default(),
            options: DeployOptions {
                simulate_step_delay: Duration::ZERO,
            },
        }
    }

    pub fn script(mut self, script: Script) -> Self {
        self.remote = FakeRemote::new(script);
        self
    }

    pub async fn run(&self, request: DeploymentRequest) -> Result<DeploymentReport, DeployError> {
        Deployer::new(
            &self.profiles,
            &self.repository,
            &self.remote,
            &self.shell,
            &self.prompter,
        )
        .observer(&self.observer)
        .options(self.options)
        .run(request)
        .await
    }
}

/// `Script` for a target that already has a deployment at `/srv/app`.
pub fn deployed() -> Script {
    Script {
        existing: vec!["/srv/app".to_string()],
        ..Script::default()
    }
}
