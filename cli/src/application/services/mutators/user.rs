//! `EnsureUser`.

use anyhow::{Context, Result};
use tracing::info;

use crate::application::ports::{ProgressReporter, RemoteSession, RunOptions};
use crate::domain::account::{hash_password, sh_quote, ssh_dir_for};
use crate::domain::connection::FALLBACK_SHELL;
use crate::domain::{Change, Secret};

/// The account to create.
#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub name: &'a str,
    pub group: &'a str,
    pub full_name: &'a str,
    pub password: &'a Secret,
}

/// Create the account unless `id <name>` already resolves.
///
/// A fresh account gets a home directory, the fallback login shell, `group`
/// as primary group, and an empty `~/.ssh` owned by the new user and group.
/// The password hash is logged so the operator can recover it.
///
/// # Errors
///
/// Returns an error if hashing fails or any account command fails.
pub async fn ensure_user(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
    user: NewUser<'_>,
) -> Result<Change> {
    let NewUser {
        name,
        group,
        full_name,
        password,
    } = user;
    reporter.step(&format!("ensuring user '{name}'"));
    let existing = session.run(&format!("id {name}"), RunOptions::WARN).await?;
    if existing.ok {
        info!(user = name, "user already exists");
        reporter.success(&format!("user '{name}' already exists"));
        return Ok(Change::Unchanged);
    }

    let hash = hash_password(password.expose())?;
    info!(user = name, %hash, "hashed password for new user");
    reporter.step(&format!("password hash for '{name}': {hash}"));

    let ssh_dir = ssh_dir_for(name);
    let commands = [
        format!(
            "useradd -m -c {} -s {FALLBACK_SHELL} -g {group} -p {} {name}",
            sh_quote(full_name),
            sh_quote(&hash)
        ),
        format!("usermod -a -G {group} {name}"),
        format!("mkdir -p {ssh_dir}"),
        format!("chown -R {name} {ssh_dir}"),
        format!("chgrp -R {group} {ssh_dir}"),
    ];
    for cmd in &commands {
        session
            .escalate(cmd, RunOptions::STRICT)
            .await
            .with_context(|| format!("creating user '{name}'"))?;
    }
    info!(user = name, group, "user created");
    reporter.success(&format!("user '{name}' created"));
    Ok(Change::Applied)
}
