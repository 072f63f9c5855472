//! Operator key pair and the remote `authorized_keys` merge.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::application::ports::{
    CommandRunner, LocalFiles, LocalKeyStore, ProgressReporter, RemoteSession, RunOptions,
};
use crate::application::services::mutators::install_file;
use crate::domain::account::{authorized_keys_path_for, ssh_dir_for};
use crate::domain::authorized_keys::{merge_authorized_keys, parse_lines};
use crate::domain::{Change, InvariantViolation, SessionError};

const KEYGEN_TIMEOUT: Duration = Duration::from_secs(120);
const AUTHORIZED_KEYS_STAGING_PATH: &str = "/tmp/authorized_keys";

/// Make sure the operator has an RSA key pair, generating one if neither
/// half exists.
///
/// # Errors
///
/// Returns [`InvariantViolation::IncompleteKeyPair`] when exactly one of the
/// two files exists, or an error if `ssh-keygen` fails.
pub async fn ensure_local_keypair(
    keys: &impl LocalKeyStore,
    local: &impl CommandRunner,
    reporter: &impl ProgressReporter,
) -> Result<Change> {
    keys.ensure_dir()?;
    let present = keys.present_count();
    match present {
        2 => {
            debug!("local key pair present");
            return Ok(Change::Unchanged);
        }
        0 => {}
        _ => {
            return Err(InvariantViolation::IncompleteKeyPair {
                present,
                private_key: keys.private_key_path().display().to_string(),
                public_key: keys.public_key_path().display().to_string(),
            }
            .into());
        }
    }

    reporter.step("creating local ssh keys");
    let private_key = keys.private_key_path();
    let path = private_key.to_string_lossy().into_owned();
    let out = local
        .run_with_timeout(
            "ssh-keygen",
            &["-q", "-t", "rsa", "-b", "2048", "-f", path.as_str(), "-N", ""],
            KEYGEN_TIMEOUT,
        )
        .await?;
    if !out.status.success() {
        return Err(SessionError::LocalCommand {
            program: "ssh-keygen".into(),
            detail: String::from_utf8_lossy(&out.stderr).trim().to_string(),
        }
        .into());
    }
    let present = keys.present_count();
    if present != 2 {
        return Err(InvariantViolation::IncompleteKeyPair {
            present,
            private_key: path,
            public_key: keys.public_key_path().display().to_string(),
        }
        .into());
    }
    info!(path = %path, "generated local key pair");
    reporter.success(&format!("created {path}"));
    Ok(Change::Applied)
}

/// Whose `authorized_keys` to update and who owns it afterwards.
#[derive(Debug, Clone, Copy)]
pub struct KeyTarget<'a> {
    pub user: &'a str,
    pub group: &'a str,
}

/// Merge the operator's public key into the target's `authorized_keys`.
///
/// The file is only rewritten when the canonical (sorted, deduplicated) key
/// list differs from what is on the host. Directory and file modes and
/// ownership are reset either way.
///
/// # Errors
///
/// Returns an error if the public key cannot be read or a remote command fails.
pub async fn merge_authorized_keys_for(
    session: &impl RemoteSession,
    keys: &impl LocalKeyStore,
    files: &impl LocalFiles,
    reporter: &impl ProgressReporter,
    target: KeyTarget<'_>,
) -> Result<Change> {
    let KeyTarget { user, group } = target;
    reporter.step(&format!("updating authorized keys of '{user}'"));
    let public_key = keys.read_public_key()?;
    let ssh_dir = ssh_dir_for(user);
    let path = authorized_keys_path_for(user);

    session
        .escalate(&format!("mkdir -p {ssh_dir}"), RunOptions::STRICT)
        .await?;
    let current = session
        .escalate(&format!("cat {path}"), RunOptions::WARN)
        .await?;
    let existing = if current.ok {
        parse_lines(&current.stdout)
    } else {
        Vec::new()
    };

    let merged = merge_authorized_keys(&existing, &public_key);
    let change = if merged.changed {
        install_file(
            session,
            files,
            merged.render().as_bytes(),
            AUTHORIZED_KEYS_STAGING_PATH,
            &path,
        )
        .await
        .with_context(|| format!("writing {path}"))?;
        info!(user, keys = merged.lines.len(), "authorized_keys rewritten");
        Change::Applied
    } else {
        info!(user, "authorized_keys already up to date");
        Change::Unchanged
    };

    let owner = format!("{user}:{group}");
    for cmd in [
        format!("chmod 700 {ssh_dir}"),
        format!("chmod 600 {path}"),
        format!("chown {owner} {ssh_dir}"),
        format!("chown {owner} {path}"),
    ] {
        session.escalate(&cmd, RunOptions::STRICT).await?;
    }

    match change {
        Change::Applied => reporter.success(&format!("authorized keys of '{user}' updated")),
        Change::Unchanged => reporter.success(&format!("authorized keys of '{user}' unchanged")),
    }
    Ok(change)
}
