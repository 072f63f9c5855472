//! `HardenSshDaemon`.

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::application::ports::{ProgressReporter, RemoteSession, RunOptions};
use crate::domain::sshd::{HARDENING, SSHD_BACKUP_PATH, SSHD_CONFIG_PATH, SSHD_RELOAD_COMMAND};

/// Back up `sshd_config`, flip the hardening directives and reload sshd.
///
/// The `sed` substitutions are no-ops once applied, so no check is needed.
/// An explicit `PasswordAuthentication yes` survives hardening and is
/// reported to the operator instead of being rewritten.
///
/// # Errors
///
/// Returns an error if any command fails.
pub async fn harden_ssh_daemon(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    reporter.step("hardening sshd configuration");
    session
        .escalate(
            &format!("cp -p {SSHD_CONFIG_PATH} {SSHD_BACKUP_PATH}"),
            RunOptions::STRICT,
        )
        .await
        .context("backing up sshd_config")?;

    for sub in &HARDENING {
        session
            .escalate(&sub.sed_command(SSHD_CONFIG_PATH), RunOptions::STRICT)
            .await
            .with_context(|| format!("rewriting '{}'", sub.from))?;
    }

    let explicit = session
        .escalate(
            &format!("grep -q '^PasswordAuthentication yes' {SSHD_CONFIG_PATH}"),
            RunOptions::WARN,
        )
        .await?;
    if explicit.ok {
        warn!("sshd_config explicitly enables PasswordAuthentication");
        reporter.warn(
            "sshd_config explicitly sets 'PasswordAuthentication yes'; only the commented \
             default is rewritten, review it manually",
        );
    }

    session
        .escalate(SSHD_RELOAD_COMMAND, RunOptions::STRICT)
        .await
        .context("reloading sshd")?;
    info!("sshd hardened and reloaded");
    reporter.success("sshd hardened");
    Ok(())
}
