//! Hostname and the initial account lock-down.

use anyhow::{Context, Result};
use tracing::info;

use crate::application::ports::{ProgressReporter, RemoteSession, RunOptions};
use crate::domain::Change;
use crate::domain::account::NOLOGIN_SHELL;

/// Remove the password of `user` and give it a non-interactive shell.
///
/// # Errors
///
/// Returns an error if `passwd` or `usermod` fails.
pub async fn disable_initial_login(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
    user: &str,
) -> Result<()> {
    reporter.step(&format!("disabling login of '{user}'"));
    for cmd in [
        format!("passwd -d {user}"),
        format!("usermod -s {NOLOGIN_SHELL} {user}"),
    ] {
        session
            .escalate(&cmd, RunOptions::STRICT)
            .await
            .with_context(|| format!("disabling '{user}'"))?;
    }
    info!(user, "initial login disabled");
    reporter.success(&format!("'{user}' can no longer log in"));
    Ok(())
}

/// Write `/etc/hostname` and map the name to loopback in `/etc/hosts`.
/// Takes effect after the next reboot.
///
/// # Errors
///
/// Returns an error if a write fails.
pub async fn set_hostname(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
    hostname: &str,
) -> Result<Change> {
    reporter.step(&format!("setting hostname '{hostname}'"));
    let current = session.run("cat /etc/hostname", RunOptions::WARN).await?;
    let mut change = Change::Unchanged;
    if !current.ok || current.stdout.trim() != hostname {
        session
            .escalate(&format!("echo {hostname} > /etc/hostname"), RunOptions::STRICT)
            .await
            .context("writing /etc/hostname")?;
        change = Change::Applied;
    }

    let mapped = session
        .run(
            &format!("grep -qE '^127\\.0\\.0\\.1[[:space:]]+{hostname}$' /etc/hosts"),
            RunOptions::WARN,
        )
        .await?;
    if !mapped.ok {
        session
            .escalate(
                &format!("printf '127.0.0.1\\t%s\\n' {hostname} >> /etc/hosts"),
                RunOptions::STRICT,
            )
            .await
            .context("updating /etc/hosts")?;
        change = Change::Applied;
    }

    if change == Change::Applied {
        info!(hostname, "hostname set");
        reporter.warn(&format!("hostname set to '{hostname}'; reboot to apply it"));
    } else {
        reporter.success(&format!("hostname already '{hostname}'"));
    }
    Ok(change)
}
