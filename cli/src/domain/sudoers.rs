//! Sudoers patching: one append-only grant line per group.

pub const SUDOERS_PATH: &str = "/etc/sudoers";
pub const SUDOERS_BACKUP_PATH: &str = "/etc/sudoers.backup";
/// Remote staging path; moved over [`SUDOERS_PATH`] once validated.
pub const SUDOERS_STAGING_PATH: &str = "/tmp/sudoers";

/// The line granting `group` password-less escalation for all commands.
#[must_use]
pub fn grant_line(group: &str) -> String {
    format!("{group} ALL=(ALL) NOPASSWD: ALL")
}

/// Whether `current` already carries the grant for `group`.
#[must_use]
pub fn has_grant(current: &str, group: &str) -> bool {
    let wanted = grant_line(group);
    current.lines().any(|l| l.trim() == wanted)
}

/// New sudoers content with the grant for `group` appended.
///
/// Returns `None` when the grant is already present. Line endings are
/// normalised to LF since `visudo` rejects stray carriage returns.
#[must_use]
pub fn patch_sudoers(current: &str, group: &str) -> Option<String> {
    if has_grant(current, group) {
        return None;
    }
    let base = current.replace("\r\n", "\n");
    Some(format!("{}\n\n{}\n", base.trim(), grant_line(group)))
}
