//! `EnsureGroup`.

use anyhow::{Context, Result};
use tracing::info;

use crate::application::ports::{ProgressReporter, RemoteSession, RunOptions};
use crate::domain::Change;

/// Create `group` unless `/etc/group` already lists it.
///
/// # Errors
///
/// Returns an error if the check cannot run or `groupadd` fails.
pub async fn ensure_group(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
    group: &str,
) -> Result<Change> {
    reporter.step(&format!("ensuring group '{group}'"));
    let existing = session
        .run(&format!("grep -q '^{group}:' /etc/group"), RunOptions::WARN)
        .await?;
    if existing.ok {
        info!(group, "group already exists");
        reporter.success(&format!("group '{group}' already exists"));
        return Ok(Change::Unchanged);
    }

    session
        .escalate(&format!("groupadd {group}"), RunOptions::STRICT)
        .await
        .with_context(|| format!("creating group '{group}'"))?;
    info!(group, "group created");
    reporter.success(&format!("group '{group}' created"));
    Ok(Change::Applied)
}
