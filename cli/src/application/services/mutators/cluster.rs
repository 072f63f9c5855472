//! Cluster-stage steps. The stage is off by default and the k3s installer
//! has not been exercised against real hardware yet.

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::ports::{LocalFiles, ProgressReporter, RemoteSession, RunOptions};
use crate::domain::Change;

pub const SERVICES_DIR: &str = "/srv/docker";
const K3S_INSTALL: &str = "curl -sfL https://get.k3s.io | sh -s - --write-kubeconfig-mode 644";

/// Pin GitHub's host keys and give the session user its own key pair, so
/// private repositories can be cloned on the host.
///
/// # Errors
///
/// Returns an error if `ssh-keyscan` or `ssh-keygen` fails.
pub async fn trust_github_host_keys(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
) -> Result<Change> {
    reporter.step("trusting github.com host keys");
    let mut change = Change::Unchanged;
    let known = session
        .run("ssh-keygen -F github.com", RunOptions::WARN)
        .await?;
    if !known.ok {
        session
            .run(
                "mkdir -p ~/.ssh; and ssh-keyscan github.com >> ~/.ssh/known_hosts",
                RunOptions::STRICT,
            )
            .await
            .context("scanning github.com host keys")?;
        change = Change::Applied;
    }
    let has_key = session
        .run("test -f ~/.ssh/id_rsa", RunOptions::WARN)
        .await?;
    if !has_key.ok {
        session
            .run(
                "ssh-keygen -q -t rsa -b 2048 -f ~/.ssh/id_rsa -N ''",
                RunOptions::STRICT,
            )
            .await
            .context("generating the host user's key pair")?;
        change = Change::Applied;
    }
    reporter.success("github.com trusted");
    Ok(change)
}

/// Upload every `*.env` file from `dir` to [`SERVICES_DIR`].
///
/// # Errors
///
/// Returns an error if the directory cannot be listed or an upload fails.
pub async fn copy_service_env_files(
    session: &impl RemoteSession,
    files: &impl LocalFiles,
    reporter: &impl ProgressReporter,
    dir: Option<&Path>,
    owner: &str,
) -> Result<usize> {
    let Some(dir) = dir else {
        reporter.warn("services_docker_path not configured, skipping env files");
        return Ok(0);
    };
    reporter.step(&format!("copying env files from {}", dir.display()));
    let env_files = files.env_files(dir)?;
    if env_files.is_empty() {
        reporter.warn(&format!("no *.env files in {}", dir.display()));
        return Ok(0);
    }
    for cmd in [
        format!("mkdir -p {SERVICES_DIR}"),
        format!("chown {owner} {SERVICES_DIR}"),
    ] {
        session.escalate(&cmd, RunOptions::STRICT).await?;
    }
    for file in &env_files {
        let Some(name) = file.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let remote = format!("{SERVICES_DIR}/{name}");
        session
            .upload(file, &remote)
            .await
            .with_context(|| format!("uploading {}", file.display()))?;
        info!(file = %file.display(), %remote, "env file uploaded");
    }
    reporter.success(&format!("{} env file(s) copied", env_files.len()));
    Ok(env_files.len())
}

/// Run the k3s installer.
///
/// # Errors
///
/// Returns an error if the installer fails.
pub async fn install_cluster_runtime(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    reporter.step("installing k3s");
    session
        .run(K3S_INSTALL, RunOptions::STRICT)
        .await
        .context("installing k3s")?;
    reporter.warn("k3s installed; the host may need a reboot with cgroups enabled");
    Ok(())
}
