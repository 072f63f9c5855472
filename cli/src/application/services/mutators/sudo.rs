//! Escalation checks and the password-less sudo grant.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::application::ports::{LocalFiles, ProgressReporter, RemoteSession, RunOptions};
use crate::application::services::mutators::upload_staged;
use crate::domain::sudoers::{
    SUDOERS_BACKUP_PATH, SUDOERS_PATH, SUDOERS_STAGING_PATH, patch_sudoers,
};
use crate::domain::{Change, InvariantViolation};

/// Check that `sudo` works for the session's identity and really yields root.
///
/// # Errors
///
/// Returns [`InvariantViolation::EscalationUnavailable`] if the escalated
/// `whoami` fails or does not print `root`.
pub async fn verify_escalation(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
    user: &str,
) -> Result<()> {
    reporter.step(&format!("checking sudo access for '{user}'"));
    let out = session.escalate("whoami", RunOptions::WARN).await?;
    let who = out.stdout.trim();
    if !out.ok || who != "root" {
        let detail = if out.ok {
            format!("escalated whoami printed '{who}'")
        } else {
            format!("exit status {}: {}", out.exit_code, out.stderr.trim())
        };
        return Err(InvariantViolation::EscalationUnavailable {
            user: user.to_string(),
            detail,
        }
        .into());
    }
    debug!(user, "escalation verified");
    Ok(())
}

/// Append a password-less grant for `group` to `/etc/sudoers`.
///
/// The new file is staged in `/tmp`, owned by root with mode 0440, checked
/// with `visudo` and only then moved into place. Afterwards plain and
/// escalated commands must still succeed; otherwise the run aborts.
///
/// # Errors
///
/// Returns [`InvariantViolation::SudoersRejected`] if `visudo` refuses the
/// staged file, [`InvariantViolation::SudoersBroken`] if sudo stops working
/// after the move, or the underlying session error.
pub async fn grant_passwordless_sudo(
    session: &impl RemoteSession,
    files: &impl LocalFiles,
    reporter: &impl ProgressReporter,
    group: &str,
) -> Result<Change> {
    reporter.step("updating sudoers file");
    let current = session
        .escalate(&format!("cat {SUDOERS_PATH}"), RunOptions::STRICT)
        .await
        .context("reading sudoers")?;
    let Some(patched) = patch_sudoers(&current.stdout, group) else {
        info!(group, "sudoers already grants password-less sudo");
        reporter.success(&format!("sudoers already grants '{group}' password-less sudo"));
        return Ok(Change::Unchanged);
    };

    session
        .escalate(
            &format!("cp -p {SUDOERS_PATH} {SUDOERS_BACKUP_PATH}"),
            RunOptions::STRICT,
        )
        .await
        .context("backing up sudoers")?;

    upload_staged(session, files, patched.as_bytes(), SUDOERS_STAGING_PATH).await?;
    for cmd in [
        format!("chown root:root {SUDOERS_STAGING_PATH}"),
        format!("chmod 440 {SUDOERS_STAGING_PATH}"),
    ] {
        session.escalate(&cmd, RunOptions::STRICT).await?;
    }

    let check = session
        .escalate(&format!("visudo -c -f {SUDOERS_STAGING_PATH}"), RunOptions::WARN)
        .await?;
    if !check.ok {
        let cleanup = format!("rm -f {SUDOERS_STAGING_PATH}");
        match session.escalate(&cleanup, RunOptions::WARN).await {
            Ok(out) if out.ok => {}
            Ok(out) => warn!(code = out.exit_code, stderr = %out.stderr.trim(), "{cleanup} failed"),
            Err(e) => warn!(error = %e, "{cleanup} failed"),
        }
        let detail = format!("{}{}", check.stdout.trim(), check.stderr.trim());
        return Err(InvariantViolation::SudoersRejected(detail).into());
    }

    session
        .escalate(
            &format!("mv {SUDOERS_STAGING_PATH} {SUDOERS_PATH}"),
            RunOptions::STRICT,
        )
        .await
        .context("installing sudoers")?;

    verify_sudo_still_works(session).await?;
    info!(group, "sudoers patched");
    reporter.success(&format!("'{group}' may now sudo without a password"));
    Ok(Change::Applied)
}

/// Both a plain and an escalated command must succeed after a sudoers change.
async fn verify_sudo_still_works(session: &impl RemoteSession) -> Result<()> {
    let plain = session.run("whoami", RunOptions::WARN).await;
    let escalated = session.escalate("whoami", RunOptions::WARN).await;
    for (label, result) in [("whoami", plain), ("sudo whoami", escalated)] {
        let detail = match result {
            Ok(out) if out.ok => continue,
            Ok(out) => format!("{label} exited with {}: {}", out.exit_code, out.stderr.trim()),
            Err(err) => format!("{label} failed: {err:#}"),
        };
        warn!(%detail, "sudo verification failed");
        return Err(InvariantViolation::SudoersBroken(detail).into());
    }
    Ok(())
}
