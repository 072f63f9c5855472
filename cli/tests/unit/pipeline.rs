//! Stage runner and pipeline behaviour against a fake host.

#![allow(clippy::expect_used)]

use std::time::Duration;

use hostprep_cli::application::ports::CommandOutput;
use hostprep_cli::application::services::pipeline::run_pipeline;
use hostprep_cli::application::services::stages::{StageDeps, enter_stage, run_stage};
use hostprep_cli::domain::stage::FailurePolicy;
use hostprep_cli::domain::{
    ContextKind, InvariantViolation, ProvisionConfig, SessionError, StageEntry, StageId,
    StageOutcome, StagePlan,
};
use hostprep_cli::infra::fs::LocalFs;
use hostprep_cli::infra::keys::KeyPairFiles;

use crate::helpers::{OPERATOR_KEY, config, key_pair};
use crate::mocks::{
    Call, DEBIAN_SUDOERS, FakeConnector, FakeHost, NoLocalCommands, NoopReporter,
    UnreachableConnector,
};

const GRANT: &str = "deployer ALL=(ALL) NOPASSWD: ALL";

fn deps<'a>(
    config: &'a ProvisionConfig,
    keys: &'a KeyPairFiles,
) -> StageDeps<'a, KeyPairFiles, NoLocalCommands, LocalFs, NoopReporter> {
    StageDeps {
        config,
        keys,
        local: &NoLocalCommands,
        files: &LocalFs,
        reporter: &NoopReporter,
    }
}

fn outcomes(report: &hostprep_cli::application::services::pipeline::PipelineReport) -> Vec<StageOutcome> {
    report.stages.iter().map(|s| s.outcome).collect()
}

// ── End-to-end bootstrap ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_fresh_host_bootstrap_end_to_end() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());
    let config = config();
    let host = FakeHost::debian();
    let connector = FakeConnector::new(host.clone());

    let report = run_pipeline(&connector, &deps(&config, &keys), &StagePlan::single(StageId::Bootstrap))
        .await
        .expect("bootstrap succeeds");

    assert_eq!(
        outcomes(&report),
        [StageOutcome::Completed, StageOutcome::Disabled, StageOutcome::Disabled]
    );
    assert!(host.has_group("deployer"));
    assert!(host.has_user("ops"));
    assert_eq!(
        host.file("/home/ops/.ssh/authorized_keys").as_deref(),
        Some(format!("{OPERATOR_KEY}\n").as_str())
    );

    let sudoers = host.file("/etc/sudoers").expect("sudoers");
    assert_eq!(sudoers, format!("{}\n\n{GRANT}\n", DEBIAN_SUDOERS.trim()));
    assert_eq!(sudoers.matches(GRANT).count(), 1);
    assert_eq!(host.file("/etc/sudoers.backup").as_deref(), Some(DEBIAN_SUDOERS));

    let sshd = host.file("/etc/ssh/sshd_config").expect("sshd_config");
    for line in ["UsePAM no", "PermitRootLogin no", "PasswordAuthentication no"] {
        assert!(sshd.lines().any(|l| l == line), "missing '{line}' in:\n{sshd}");
    }
    assert!(!sshd.contains("UsePAM yes"));

    let commands = host.commands();
    let tail: Vec<&str> = commands.iter().rev().take(2).rev().map(String::as_str).collect();
    assert_eq!(tail, ["passwd -d pi", "usermod -s /usr/sbin/nologin pi"]);
    assert_eq!(host.state().connects, [ContextKind::Initial]);
    assert_eq!(host.state().closes, 1);
}

#[tokio::test]
async fn test_group_and_sudo_grant_precede_user_creation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());
    let config = config();
    let host = FakeHost::debian();

    run_stage(&FakeConnector::new(host.clone()), &deps(&config, &keys), StageId::Bootstrap)
        .await
        .expect("bootstrap succeeds");

    let commands = host.commands();
    let pos = |needle: &str| {
        commands
            .iter()
            .position(|c| c.starts_with(needle))
            .unwrap_or_else(|| panic!("'{needle}' never ran"))
    };
    assert_eq!(pos("whoami"), 0);
    assert!(pos("groupadd deployer") < pos("useradd"));
    assert!(pos("mv /tmp/sudoers /etc/sudoers") < pos("useradd"));
    assert!(pos("useradd") < pos("mv /tmp/authorized_keys"));
    assert!(pos("service ssh reload") < pos("passwd -d pi"));
}

#[tokio::test]
async fn test_bootstrap_rerun_writes_nothing() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());
    let config = config();
    let host = FakeHost::debian();
    let connector = FakeConnector::new(host.clone());
    let deps = deps(&config, &keys);

    run_stage(&connector, &deps, StageId::Bootstrap).await.expect("first run");
    let sudoers = host.file("/etc/sudoers");
    let keys_file = host.file("/home/ops/.ssh/authorized_keys");
    host.clear_calls();

    run_stage(&connector, &deps, StageId::Bootstrap).await.expect("second run");

    assert!(host.uploads().is_empty(), "second run uploaded {:?}", host.uploads());
    let commands = host.commands();
    assert!(!commands.iter().any(|c| c.starts_with("groupadd")));
    assert!(!commands.iter().any(|c| c.starts_with("useradd")));
    assert!(!commands.iter().any(|c| c.contains("sudoers.backup")));
    assert_eq!(host.file("/etc/sudoers"), sudoers);
    assert_eq!(host.file("/home/ops/.ssh/authorized_keys"), keys_file);
}

// ── Stage entry classification ───────────────────────────────────────────────

#[tokio::test]
async fn test_publickey_only_skips_bootstrap_and_continues() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());
    let config = config();
    let host = FakeHost::debian().with_user("ops", "deployer");
    let connector = FakeConnector::new(host.clone()).refusing(ContextKind::Initial, &["publickey"]);

    let report = run_pipeline(&connector, &deps(&config, &keys), &StagePlan::standard(false))
        .await
        .expect("already bootstrapped is not an error");

    assert_eq!(
        outcomes(&report),
        [
            StageOutcome::SkippedAlreadyBootstrapped,
            StageOutcome::Completed,
            StageOutcome::Disabled
        ]
    );
    assert_eq!(host.state().connects, [ContextKind::Initial, ContextKind::Deployer]);
    assert_eq!(host.state().closes, 1);
}

// ── Pause between stages ─────────────────────────────────────────────────────

fn gap(host: &FakeHost) -> Duration {
    let times = host.state().connect_times.clone();
    assert_eq!(times.len(), 2, "expected two connection attempts");
    times[1] - times[0]
}

#[tokio::test(start_paused = true)]
async fn test_toolchain_connects_after_the_stage_pause() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());
    let mut config = config();
    config.stage_pause_ms = 1500;
    let host = FakeHost::debian();
    let connector = FakeConnector::new(host.clone());

    run_pipeline(&connector, &deps(&config, &keys), &StagePlan::standard(false))
        .await
        .expect("both stages succeed");

    assert_eq!(host.state().connects, [ContextKind::Initial, ContextKind::Deployer]);
    assert!(gap(&host) >= Duration::from_millis(1500));
}

#[tokio::test(start_paused = true)]
async fn test_pause_also_follows_a_skipped_bootstrap() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());
    let mut config = config();
    config.stage_pause_ms = 1500;
    let host = FakeHost::debian().with_user("ops", "deployer");
    let connector = FakeConnector::new(host.clone()).refusing(ContextKind::Initial, &["publickey"]);

    run_pipeline(&connector, &deps(&config, &keys), &StagePlan::standard(false))
        .await
        .expect("already bootstrapped is not an error");

    assert!(gap(&host) >= Duration::from_millis(1500));
}

#[tokio::test]
async fn test_other_method_sets_abort_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());
    let config = config();
    let host = FakeHost::debian();
    let connector =
        FakeConnector::new(host.clone()).refusing(ContextKind::Initial, &["keyboard-interactive"]);

    let err = run_pipeline(&connector, &deps(&config, &keys), &StagePlan::standard(false))
        .await
        .expect_err("mismatch is fatal");

    let session_err = err.downcast_ref::<SessionError>().expect("typed session error");
    assert_eq!(
        session_err.allowed_methods(),
        Some(&["keyboard-interactive".to_string()][..])
    );
    assert!(host.calls().is_empty());
    assert_eq!(host.state().connects, [ContextKind::Initial]);
}

#[tokio::test]
async fn test_enter_stage_returns_explicit_entry() {
    let config = config();
    let ctx = hostprep_cli::domain::ConnectionContext::build(
        &config,
        ContextKind::Initial,
        std::path::Path::new("/k/id_rsa"),
    );
    let skip = FailurePolicy::SkipWhenPublicKeyOnly;

    let connector = FakeConnector::new(FakeHost::debian()).refusing(ContextKind::Initial, &["publickey"]);
    let entry = enter_stage(&connector, &ctx, skip).await.expect("classified");
    assert!(matches!(entry, StageEntry::AlreadyBootstrapped));

    let connector = FakeConnector::new(FakeHost::debian())
        .refusing(ContextKind::Initial, &["publickey", "password"]);
    let entry = enter_stage(&connector, &ctx, skip).await.expect("classified");
    assert!(matches!(entry, StageEntry::FatalAuthError { ref allowed } if allowed.len() == 2));

    let entry = enter_stage(&connector, &ctx, FailurePolicy::Fatal).await.expect("classified");
    assert!(matches!(entry, StageEntry::FatalAuthError { .. }));

    let connector = FakeConnector::new(FakeHost::debian());
    let entry = enter_stage(&connector, &ctx, skip).await.expect("connected");
    assert!(matches!(entry, StageEntry::Connected(_)));
}

#[tokio::test]
async fn test_connection_failure_is_not_classified() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());
    let config = config();

    let err = run_pipeline(&UnreachableConnector, &deps(&config, &keys), &StagePlan::standard(false))
        .await
        .expect_err("unreachable host");
    assert!(matches!(
        err.downcast_ref::<SessionError>(),
        Some(SessionError::Connect { .. })
    ));
}

// ── Fail-fast ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_broken_sudoers_aborts_before_any_further_step() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());
    let config = config();
    let host = FakeHost::debian().breaking_sudo_on_install();
    let connector = FakeConnector::new(host.clone());

    let err = run_pipeline(&connector, &deps(&config, &keys), &StagePlan::standard(false))
        .await
        .expect_err("broken sudoers is fatal");

    assert!(matches!(
        err.downcast_ref::<InvariantViolation>(),
        Some(InvariantViolation::SudoersBroken(_))
    ));
    let calls = host.calls();
    assert_eq!(calls.last(), Some(&Call::Escalate("whoami".into())));
    assert!(!calls.iter().any(|c| c.command().starts_with("id ")));
    assert!(!host.has_user("ops"));
    assert_eq!(host.state().connects, [ContextKind::Initial]);
    assert_eq!(host.state().closes, 1, "session closed on the error path");
}

#[tokio::test]
async fn test_rejected_sudoers_is_never_installed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());
    let config = config();
    let host = FakeHost::debian().override_command(
        "visudo",
        CommandOutput::new(1, "", "/tmp/sudoers:5:1: syntax error"),
    );

    let err = run_stage(&FakeConnector::new(host.clone()), &deps(&config, &keys), StageId::Bootstrap)
        .await
        .expect_err("visudo rejects");

    assert!(matches!(
        err.downcast_ref::<InvariantViolation>(),
        Some(InvariantViolation::SudoersRejected(_))
    ));
    assert_eq!(host.file("/etc/sudoers").as_deref(), Some(DEBIAN_SUDOERS));
    assert!(host.file("/tmp/sudoers").is_none());
}

#[tokio::test]
async fn test_failed_staging_cleanup_keeps_the_rejection() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());
    let config = config();
    // The first `rm -f /tmp/sudoers` clears the staging path before upload;
    // the second is the cleanup after visudo refuses the file.
    let host = FakeHost::debian()
        .override_command("visudo", CommandOutput::new(1, "", "/tmp/sudoers:5:1: syntax error"))
        .override_command_after(
            "rm -f /tmp/sudoers",
            1,
            CommandOutput::new(1, "", "rm: cannot remove '/tmp/sudoers': Read-only file system"),
        );

    let err = run_stage(&FakeConnector::new(host.clone()), &deps(&config, &keys), StageId::Bootstrap)
        .await
        .expect_err("visudo rejects");

    assert!(matches!(
        err.downcast_ref::<InvariantViolation>(),
        Some(InvariantViolation::SudoersRejected(_))
    ));
    let cleanups = host
        .commands()
        .iter()
        .filter(|c| c.as_str() == "rm -f /tmp/sudoers")
        .count();
    assert_eq!(cleanups, 2);
    assert!(!host.commands().iter().any(|c| c == "mv /tmp/sudoers /etc/sudoers"));
    assert_eq!(host.file("/etc/sudoers").as_deref(), Some(DEBIAN_SUDOERS));
    assert_eq!(host.state().closes, 1);
}

// ── Later stages ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_toolchain_stage_runs_as_deployer() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());
    let config = config();
    let host = FakeHost::debian().with_user("ops", "deployer");

    let outcome = run_stage(&FakeConnector::new(host.clone()), &deps(&config, &keys), StageId::Toolchain)
        .await
        .expect("toolchain succeeds");

    assert_eq!(outcome, StageOutcome::Completed);
    assert_eq!(host.state().connects, [ContextKind::Deployer]);
    let calls = host.calls();
    for expected in [
        Call::Escalate("apt-get update".into()),
        Call::Escalate("chsh -s /usr/bin/fish ops".into()),
        Call::Escalate("usermod -aG docker ops".into()),
        Call::Run("python3 -m pip install virtualenv".into()),
        Call::Run("echo fish_add_path /home/ops/.local/bin/ | fish".into()),
    ] {
        assert!(calls.contains(&expected), "missing {expected:?}");
    }
    assert!(
        calls
            .iter()
            .any(|c| matches!(c, Call::Escalate(cmd) if cmd.starts_with("DEBIAN_FRONTEND=noninteractive apt-get install") && cmd.ends_with(" -y")))
    );
}

#[tokio::test]
async fn test_cluster_stage_copies_env_files_and_trusts_github() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());
    let services = tempfile::tempdir().expect("tempdir");
    for name in ["web.env", "db.env", "README.md"] {
        std::fs::write(services.path().join(name), "KEY=value\n").expect("write");
    }
    let mut config = config();
    config.services_docker_path = Some(services.path().to_path_buf());
    let host = FakeHost::debian()
        .with_user("ops", "deployer")
        .override_command("ssh-keygen -F github.com", CommandOutput::new(1, "", ""));

    let outcome = run_stage(&FakeConnector::new(host.clone()), &deps(&config, &keys), StageId::Cluster)
        .await
        .expect("cluster succeeds");

    assert_eq!(outcome, StageOutcome::Completed);
    assert_eq!(host.state().connects, [ContextKind::DeployerFish]);
    assert_eq!(host.uploads(), ["/srv/docker/db.env", "/srv/docker/web.env"]);
    let commands = host.commands();
    assert!(commands.iter().any(|c| c.contains("ssh-keyscan github.com")));
    assert!(commands.iter().any(|c| c.contains("get.k3s.io")));
}

#[tokio::test]
async fn test_cluster_stage_only_runs_when_enabled() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());
    let config = config();
    let host = FakeHost::debian();
    let connector = FakeConnector::new(host.clone());

    let report = run_pipeline(&connector, &deps(&config, &keys), &StagePlan::standard(false))
        .await
        .expect("pipeline succeeds");

    assert_eq!(report.outcome_of(StageId::Cluster), Some(StageOutcome::Disabled));
    assert_eq!(host.state().connects, [ContextKind::Initial, ContextKind::Deployer]);
    assert_eq!(host.state().closes, 2);
}
