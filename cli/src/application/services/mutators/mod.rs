//! Idempotent mutators.
//!
//! Every mutator inspects the live host first and only mutates what is not
//! already in place, so a stage can be re-run against a host in any state.
//! Inspection commands run with [`RunOptions::WARN`]; everything else fails fast.

pub mod cluster;
pub mod group;
pub mod keys;
pub mod login;
pub mod sshd;
pub mod sudo;
pub mod toolchain;
pub mod user;

use anyhow::{Context, Result};

use crate::application::ports::{LocalFiles, RemoteSession, RunOptions};

/// Stage `content` locally, upload it to `staging_path`, then move it to
/// `target` as root. The remote staging path is cleared first so a leftover
/// root-owned file from an aborted run cannot block the upload.
pub(crate) async fn install_file(
    session: &impl RemoteSession,
    files: &impl LocalFiles,
    content: &[u8],
    staging_path: &str,
    target: &str,
) -> Result<()> {
    upload_staged(session, files, content, staging_path).await?;
    session
        .escalate(&format!("mv {staging_path} {target}"), RunOptions::STRICT)
        .await
        .with_context(|| format!("moving {staging_path} to {target}"))?;
    Ok(())
}

pub(crate) async fn upload_staged(
    session: &impl RemoteSession,
    files: &impl LocalFiles,
    content: &[u8],
    staging_path: &str,
) -> Result<()> {
    session
        .escalate(&format!("rm -f {staging_path}"), RunOptions::STRICT)
        .await?;
    let staged = files.stage(content)?;
    session
        .upload(staged.as_ref(), staging_path)
        .await
        .with_context(|| format!("uploading {staging_path}"))
}
