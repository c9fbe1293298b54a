// ABOUTME: End-to-end pipeline tests against in-memory collaborators.
// ABOUTME: Covers stage ordering, prompting, dry runs and the session disconnect guarantee.

mod support;

use chrono::{TimeZone, Utc};
use futures::FutureExt;
use nonempty::nonempty;
use proptest::prelude::*;
use skiff::config::{StageCommands, UploadMode};
use skiff::deploy::{
    DeployErrorKind, DeployOptions, DeploymentRequest, Stage, StageOutcome, StageRecord,
    backup_name,
};
use skiff::diagnostics::WarningKind;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use support::{
    Call, Event, FakeProfiles, FakeRepository, Harness, Script, ScriptedPrompter, deployed,
    profile,
};

fn staging() -> DeploymentRequest {
    DeploymentRequest::new("staging")
}

fn failing(pattern: &str, code: u32) -> Script {
    Script {
        failing: vec![(pattern.to_string(), code)],
        ..deployed()
    }
}

fn stages(records: &[StageRecord]) -> Vec<Stage> {
    records.iter().map(|r| r.stage).collect()
}

// =============================================================================
// Successful runs
// =============================================================================

#[tokio::test]
async fn full_run_executes_stages_in_order() {
    let h = Harness::new();

    let report = h.run(staging()).await.unwrap();

    assert_eq!(
        stages(&report.stages),
        vec![
            Stage::ValidateEnvironment,
            Stage::LoadProfile,
            Stage::CheckRepositoryState,
            Stage::ConfirmDeployment,
            Stage::BuildLocal,
            Stage::Connect,
            Stage::Backup,
            Stage::Upload,
            Stage::InstallAndBuildRemote,
            Stage::RestartService,
            Stage::Verify,
        ]
    );
    assert!(
        report
            .stages
            .iter()
            .all(|r| r.outcome == StageOutcome::Completed)
    );
    assert!(report.warnings.is_empty());
    assert!(!report.is_unverified());
    assert!(!report.dry_run);
    assert_eq!(report.branch, "main");
    assert_eq!(report.host, "staging.example.com");
    assert_eq!(
        report.public_url.as_deref(),
        Some("https://staging.example.com")
    );

    let backup = report.backup_name.clone().unwrap();
    assert!(backup.starts_with("backup-"));

    // Clean tree on the target branch: one confirmation, no checkout, one pull.
    assert_eq!(h.prompter.asked().len(), 1);
    assert!(h.prompter.asked()[0].contains("main"));
    assert!(h.prompter.asked()[0].contains("staging.example.com"));
    assert!(!h.repository.calls().iter().any(|c| c.starts_with("checkout")));
    assert!(h.repository.calls().contains(&"pull main".to_string()));

    assert_eq!(
        h.shell.commands(),
        vec![("npm run build".to_string(), PathBuf::from("/work/project"))]
    );

    assert_eq!(
        h.remote.executed(),
        vec![
            "mkdir -p /srv/backups".to_string(),
            format!(
                "if [ -e /srv/app ]; then cp -r /srv/app /srv/backups/{backup}; else echo absent; fi"
            ),
            "mkdir -p /srv/app".to_string(),
            "npm ci --omit=dev".to_string(),
            "npm run migrate".to_string(),
            "systemctl restart app".to_string(),
            "curl -fsS http://localhost:3000/health".to_string(),
        ]
    );
    assert_eq!(h.remote.sessions_created(), 1);
    assert_eq!(h.remote.connects(), 1);
    assert_eq!(h.remote.disconnects(), 1);
    assert_eq!(h.remote.calls().last(), Some(&Call::Disconnect));
}

#[tokio::test]
async fn remote_commands_run_inside_deploy_path() {
    let h = Harness::new();

    h.run(staging()).await.unwrap();

    let dirs: Vec<(String, Option<String>)> = h
        .remote
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Execute {
                command,
                working_dir,
            } => Some((command, working_dir)),
            _ => None,
        })
        .collect();

    for (command, dir) in &dirs {
        if command.starts_with("mkdir") || command.starts_with("if [ -e") {
            assert_eq!(dir, &None, "{command}");
        } else {
            assert_eq!(dir.as_deref(), Some("/srv/app"), "{command}");
        }
    }
}

#[tokio::test]
async fn tree_upload_targets_deploy_path() {
    let h = Harness::new();

    h.run(staging()).await.unwrap();

    assert!(h.remote.calls().contains(&Call::UploadTree {
        local_dir: PathBuf::from("/work/project/dist"),
        remote_dir: "/srv/app".to_string(),
    }));
}

#[tokio::test]
async fn file_list_upload_sends_listed_files() {
    let mut h = Harness::new();
    let mut p = profile();
    p.upload = UploadMode::Files {
        files: nonempty![PathBuf::from("package.json"), PathBuf::from("server.js")],
    };
    h.profiles = FakeProfiles::with(p);

    h.run(staging()).await.unwrap();

    assert!(h.remote.calls().contains(&Call::UploadFiles {
        files: vec![PathBuf::from("package.json"), PathBuf::from("server.js")],
        remote_dir: "/srv/app".to_string(),
    }));
}

#[tokio::test]
async fn first_deploy_skips_backup() {
    let h = Harness::new().script(Script::default());

    let report = h.run(staging()).await.unwrap();

    let backup = report
        .stages
        .iter()
        .find(|r| r.stage == Stage::Backup)
        .unwrap();
    assert_eq!(backup.outcome, StageOutcome::Skipped);
    assert_eq!(report.backup_name, None);
    // Existence is checked by the backup command itself.
    assert!(h.remote.executed()[1].starts_with("if [ -e /srv/app ]"));
    assert!(!h.remote.calls().iter().any(|c| matches!(c, Call::FileExists(_))));
    // Upload still proceeds.
    assert_eq!(h.remote.uploads(), 1);
}

#[tokio::test]
async fn empty_commands_are_skipped() {
    let mut h = Harness::new();
    let mut p = profile();
    p.commands = StageCommands {
        build_local: Some("  ".to_string()),
        ..StageCommands::default()
    };
    h.profiles = FakeProfiles::with(p);

    let report = h.run(staging()).await.unwrap();

    for stage in [
        Stage::BuildLocal,
        Stage::InstallAndBuildRemote,
        Stage::RestartService,
        Stage::Verify,
    ] {
        let record = report.stages.iter().find(|r| r.stage == stage).unwrap();
        assert_eq!(record.outcome, StageOutcome::Skipped, "{stage:?}");
    }
    assert!(h.shell.commands().is_empty());
    assert_eq!(
        h.remote.executed(),
        vec![
            "mkdir -p /srv/backups".to_string(),
            format!(
                "if [ -e /srv/app ]; then cp -r /srv/app /srv/backups/{}; else echo absent; fi",
                report.backup_name.unwrap()
            ),
            "mkdir -p /srv/app".to_string(),
        ]
    );
    assert_eq!(h.remote.disconnects(), 1);
}

#[tokio::test]
async fn only_build_command_runs_when_install_is_blank() {
    let mut h = Harness::new();
    let mut p = profile();
    p.commands.install_remote = None;
    h.profiles = FakeProfiles::with(p);

    h.run(staging()).await.unwrap();

    let executed = h.remote.executed();
    assert!(executed.contains(&"npm run migrate".to_string()));
    assert!(!executed.iter().any(|c| c.starts_with("npm ci")));
}

#[tokio::test]
async fn verify_failure_is_a_warning() {
    let h = Harness::new().script(failing("curl", 7));

    let report = h.run(staging()).await.unwrap();

    let verify = report.stages.last().unwrap();
    assert_eq!(verify.stage, Stage::Verify);
    assert!(matches!(&verify.outcome, StageOutcome::Warned(m) if m.contains("status 7")));
    assert!(report.is_unverified());
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind, WarningKind::Verification);
    assert!(report.warnings[0].message.starts_with("deployment unverified"));
    assert_eq!(h.remote.disconnects(), 1);
}

#[tokio::test]
async fn switches_branch_before_pulling() {
    let mut h = Harness::new();
    h.repository = FakeRepository::on("develop");

    let report = h
        .run(staging().branch("release"))
        .await
        .unwrap();

    assert_eq!(report.branch, "release");
    let calls = h.repository.calls();
    let checkout = calls.iter().position(|c| c == "checkout release").unwrap();
    let pull = calls.iter().position(|c| c == "pull release").unwrap();
    assert!(checkout < pull);
}

#[tokio::test]
async fn force_skips_prompts_and_warns_about_dirty_tree() {
    let mut h = Harness::new();
    h.repository = FakeRepository::on("main").dirty();
    h.prompter = ScriptedPrompter::answering(&[]);

    let report = h.run(staging().force(true)).await.unwrap();

    assert!(h.prompter.asked().is_empty());
    let confirm = report
        .stages
        .iter()
        .find(|r| r.stage == Stage::ConfirmDeployment)
        .unwrap();
    assert_eq!(confirm.outcome, StageOutcome::Skipped);
    assert_eq!(report.warnings.len(), 1);
    assert_eq!(report.warnings[0].kind, WarningKind::UncommittedChanges);
}

#[tokio::test]
async fn dirty_tree_accepted_then_confirmed() {
    let mut h = Harness::new();
    h.repository = FakeRepository::on("main").dirty();

    h.run(staging()).await.unwrap();

    let asked = h.prompter.asked();
    assert_eq!(asked.len(), 2);
    assert!(asked[0].contains("uncommitted changes"));
    assert!(asked[1].starts_with("Deploy branch main to staging"));
}

// =============================================================================
// Dry run
// =============================================================================

#[tokio::test]
async fn dry_run_never_touches_the_server() {
    let h = Harness::new();

    let report = h.run(staging().dry_run(true)).await.unwrap();

    assert!(report.dry_run);
    assert_eq!(report.backup_name, None);
    let simulated: Vec<Stage> = report
        .stages
        .iter()
        .filter(|r| r.outcome == StageOutcome::Simulated)
        .map(|r| r.stage)
        .collect();
    assert_eq!(simulated, Stage::EXECUTION.to_vec());

    assert_eq!(h.remote.sessions_created(), 0);
    assert!(h.remote.calls().is_empty());
    assert!(h.shell.commands().is_empty());
    // Confirmation is not asked for a rehearsal.
    assert!(h.prompter.asked().is_empty());
}

#[tokio::test]
async fn dry_run_paces_each_simulated_stage() {
    let mut h = Harness::new();
    h.options = DeployOptions {
        simulate_step_delay: Duration::from_millis(20),
    };

    let started = Instant::now();
    h.run(staging().dry_run(true)).await.unwrap();
    let elapsed = started.elapsed();

    assert!(elapsed >= Duration::from_millis(140), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(1140), "{elapsed:?}");
}

fn settling(restart: Option<&str>) -> Harness {
    let mut h = Harness::new();
    let mut p = profile();
    p.settle_time = Duration::from_secs(3);
    p.commands.restart_remote = restart.map(str::to_string);
    h.profiles = FakeProfiles::with(p);
    h
}

#[tokio::test(start_paused = true)]
async fn verify_starts_after_settle_time() {
    let h = settling(Some("systemctl restart app"));

    h.run(staging()).await.unwrap();

    let restart = h.observer.started_at(Stage::RestartService).unwrap();
    let verify = h.observer.started_at(Stage::Verify).unwrap();
    assert!(verify - restart >= Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn skipped_restart_does_not_settle() {
    let h = settling(None);

    let report = h.run(staging()).await.unwrap();

    let restart = report
        .stages
        .iter()
        .find(|r| r.stage == Stage::RestartService)
        .unwrap();
    assert_eq!(restart.outcome, StageOutcome::Skipped);
    let started = h.observer.started_at(Stage::RestartService).unwrap();
    let verify = h.observer.started_at(Stage::Verify).unwrap();
    assert_eq!(verify - started, Duration::ZERO);
}

// =============================================================================
// Failures before any session
// =============================================================================

#[tokio::test]
async fn unknown_environment_fails_before_any_lookup() {
    let h = Harness::new();

    let err = h.run(DeploymentRequest::new("prod")).await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Validation);
    assert_eq!(err.stage(), Stage::ValidateEnvironment);
    assert_eq!(h.profiles.lookups(), 0);
    assert!(h.repository.calls().is_empty());
    assert_eq!(h.remote.sessions_created(), 0);
}

#[tokio::test]
async fn outside_a_repository_is_a_validation_error() {
    let mut h = Harness::new();
    let mut repository = FakeRepository::on("main");
    repository.is_repository = false;
    h.repository = repository;

    let err = h.run(staging()).await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Validation);
    assert!(err.to_string().contains("not a git repository"));
    assert_eq!(h.profiles.lookups(), 0);
}

#[tokio::test]
async fn missing_profile_is_a_config_error() {
    let mut h = Harness::new();
    h.profiles = FakeProfiles::empty();

    let err = h.run(DeploymentRequest::new("production")).await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Config);
    assert_eq!(err.stage(), Stage::LoadProfile);
    assert_eq!(
        err.to_string(),
        "no server profile configured for environment production"
    );
    assert_eq!(h.profiles.lookups(), 1);
    assert_eq!(h.remote.sessions_created(), 0);
}

#[tokio::test]
async fn declining_dirty_tree_prompt_cancels() {
    let mut h = Harness::new();
    h.repository = FakeRepository::on("main").dirty();
    h.prompter = ScriptedPrompter::answering(&[false]);

    let err = h.run(staging()).await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Cancelled);
    assert_eq!(err.stage(), Stage::CheckRepositoryState);
    assert_eq!(h.prompter.asked().len(), 1);
    assert!(!h.repository.calls().iter().any(|c| c.starts_with("pull")));
    assert_eq!(h.remote.sessions_created(), 0);
}

#[tokio::test]
async fn declining_confirmation_cancels() {
    let mut h = Harness::new();
    h.prompter = ScriptedPrompter::answering(&[false]);

    let err = h.run(staging()).await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Cancelled);
    assert_eq!(err.stage(), Stage::ConfirmDeployment);
    assert_eq!(h.remote.sessions_created(), 0);
    assert!(h.shell.commands().is_empty());
}

#[tokio::test]
async fn pull_failure_stops_before_confirmation() {
    let mut h = Harness::new();
    let mut repository = FakeRepository::on("main");
    repository.fail_pull = true;
    h.repository = repository;

    let err = h.run(staging()).await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::RepositoryState);
    assert!(err.to_string().starts_with("failed to pull main"));
    assert!(h.prompter.asked().is_empty());
}

#[tokio::test]
async fn local_build_failure_opens_no_session() {
    let mut h = Harness::new();
    h.shell.fail = true;

    let err = h.run(staging()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::BuildLocal);
    assert_eq!(err.kind(), DeployErrorKind::RemoteExecution);
    assert_eq!(h.remote.sessions_created(), 0);
}

// =============================================================================
// Failures inside the session
// =============================================================================

#[tokio::test]
async fn connect_failure_is_not_followed_by_disconnect() {
    let h = Harness::new().script(Script {
        fail_connect: true,
        ..deployed()
    });

    let err = h.run(staging()).await.unwrap_err();

    assert_eq!(err.kind(), DeployErrorKind::Connection);
    assert_eq!(err.stage(), Stage::Connect);
    assert!(err.to_string().contains("deploy@staging.example.com:22"));
    assert_eq!(h.remote.disconnects(), 0);
}

#[tokio::test]
async fn every_remote_failure_disconnects_exactly_once() {
    let cases = [
        ("mkdir -p /srv/backups", Stage::Backup),
        ("npm ci", Stage::InstallAndBuildRemote),
        ("systemctl", Stage::RestartService),
    ];

    for (pattern, stage) in cases {
        let h = Harness::new().script(failing(pattern, 1));

        let err = h.run(staging()).await.unwrap_err();

        assert_eq!(err.stage(), stage, "{pattern}");
        assert_eq!(h.remote.connects(), 1, "{pattern}");
        assert_eq!(h.remote.disconnects(), 1, "{pattern}");
        assert_eq!(h.remote.calls().last(), Some(&Call::Disconnect));
    }
}

#[tokio::test]
async fn upload_failure_disconnects_and_skips_install() {
    let h = Harness::new().script(Script {
        fail_upload: true,
        ..deployed()
    });

    let err = h.run(staging()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Upload);
    assert_eq!(err.kind(), DeployErrorKind::RemoteExecution);
    assert!(!h.remote.executed().iter().any(|c| c.starts_with("npm")));
    assert_eq!(h.remote.disconnects(), 1);
}

#[tokio::test]
async fn backup_failure_prevents_upload() {
    let h = Harness::new().script(failing("cp -r", 1));

    let err = h.run(staging()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Backup);
    assert_eq!(h.remote.uploads(), 0);
    assert_eq!(h.remote.disconnects(), 1);
}

#[tokio::test]
async fn failed_existence_check_is_a_backup_failure() {
    // Exit 255 is what ssh reports when the command never ran.
    let h = Harness::new().script(failing("if [ -e", 255));

    let err = h.run(staging()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::Backup);
    assert_eq!(err.kind(), DeployErrorKind::RemoteExecution);
    assert_eq!(err.exit_code(), Some(255));
    assert_eq!(h.remote.uploads(), 0);
    assert_eq!(h.remote.disconnects(), 1);
}

#[tokio::test]
async fn install_failure_carries_exit_code() {
    let h = Harness::new().script(failing("npm run migrate", 2));

    let err = h.run(staging()).await.unwrap_err();

    assert_eq!(err.stage(), Stage::InstallAndBuildRemote);
    assert_eq!(err.exit_code(), Some(2));
    assert!(!h.remote.executed().contains(&"systemctl restart app".to_string()));
}

#[tokio::test]
async fn panic_in_a_stage_still_disconnects() {
    let h = Harness::new().script(Script {
        panicking: Some("systemctl".to_string()),
        ..deployed()
    });

    let outcome = AssertUnwindSafe(h.run(staging())).catch_unwind().await;

    assert!(outcome.is_err());
    assert_eq!(h.remote.disconnects(), 1);
    assert_eq!(h.remote.calls().last(), Some(&Call::Disconnect));
}

// =============================================================================
// Observer
// =============================================================================

#[tokio::test]
async fn observer_sees_each_stage_start_before_it_finishes() {
    let h = Harness::new();

    let report = h.run(staging()).await.unwrap();

    let events = h.observer.events();
    assert_eq!(events.len(), report.stages.len() * 2);
    for (pair, record) in events.chunks(2).zip(&report.stages) {
        assert_eq!(pair[0], Event::Started(record.stage));
        assert_eq!(pair[1], Event::Finished(record.clone()));
    }
}

#[tokio::test]
async fn observer_is_told_where_a_run_failed() {
    let h = Harness::new().script(failing("systemctl", 1));

    h.run(staging()).await.unwrap_err();

    let events = h.observer.events();
    assert_eq!(events.last(), Some(&Event::Failed(Stage::RestartService)));
    assert!(events.contains(&Event::Started(Stage::RestartService)));
    assert!(!events.contains(&Event::Started(Stage::Verify)));
}

// =============================================================================
// Backup naming
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        ..ProptestConfig::default()
    })]

    #[test]
    fn property_backup_names_are_shell_safe_and_sortable(
        a in 0i64..4_102_444_800_000,
        b in 0i64..4_102_444_800_000,
    ) {
        let at = |ms| Utc.timestamp_millis_opt(ms).unwrap();
        let (first, second) = (backup_name(at(a)), backup_name(at(b)));

        prop_assert!(first.starts_with("backup-"));
        prop_assert!(!first.contains(':') && !first.contains('.'));
        prop_assert_eq!(first.len(), "backup-2026-10-19T08-15-02-123Z".len());
        prop_assert_eq!(a.cmp(&b), first.cmp(&second));
    }
}
