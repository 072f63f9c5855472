//! Toolchain installers.
//!
//! These are not checked first: apt, pip and the upstream install scripts are
//! expected to no-op on an already provisioned host.

use anyhow::{Context, Result};
use tracing::info;

use crate::application::ports::{ProgressReporter, RemoteSession, RunOptions};
use crate::domain::connection::ALTERNATE_SHELL;

const FISH_REPO_BASE: &str = "https://download.opensuse.org/repositories/shells:/fish:/release:/3";
const FISH_SOURCES_LIST: &str = "/etc/apt/sources.list.d/shells:fish:release:3.list";
const FISH_KEYRING: &str = "/etc/apt/trusted.gpg.d/shells_fish_release_3.gpg";
const OMF_PLUGINS: &[&str] = &["install agnoster", "theme agnoster", "install bang-bang"];

/// One command of an installer script.
enum Cmd {
    /// As the session user (may call `sudo` itself).
    User(String),
    /// Through the session's escalation.
    Root(String),
}

async fn run_all(session: &impl RemoteSession, what: &str, cmds: Vec<Cmd>) -> Result<()> {
    for cmd in cmds {
        let result = match &cmd {
            Cmd::User(c) => session.run(c, RunOptions::STRICT).await,
            Cmd::Root(c) => session.escalate(c, RunOptions::STRICT).await,
        };
        result.with_context(|| format!("installing {what}"))?;
    }
    Ok(())
}

/// `apt-get update`, `upgrade` and install `packages`.
///
/// # Errors
///
/// Returns an error if any apt command fails.
pub async fn install_packages(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
    packages: &[String],
) -> Result<()> {
    reporter.step("updating and installing system packages");
    let mut cmds = vec![
        Cmd::Root("apt-get update".into()),
        Cmd::Root("DEBIAN_FRONTEND=noninteractive apt-get upgrade -y".into()),
    ];
    if !packages.is_empty() {
        cmds.push(Cmd::Root(format!(
            "DEBIAN_FRONTEND=noninteractive apt-get install {} -y",
            packages.join(" ")
        )));
    }
    run_all(session, "system packages", cmds).await?;
    info!(count = packages.len(), "packages installed");
    reporter.success("system packages installed");
    Ok(())
}

/// Install fish from the openSUSE build service, make it the login shell of
/// `user` and set up Oh My Fish with its theme plugins.
///
/// # Errors
///
/// Returns an error if any installer command fails.
pub async fn install_shell(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
    user: &str,
    release: &str,
) -> Result<()> {
    reporter.step("installing fish shell");
    let mut cmds = vec![
        Cmd::User(format!(
            "echo 'deb {FISH_REPO_BASE}/{release}/ /' | sudo tee {FISH_SOURCES_LIST}"
        )),
        Cmd::User(format!(
            "curl -fsSL {FISH_REPO_BASE}/{release}/Release.key | gpg --dearmor | sudo tee {FISH_KEYRING} > /dev/null"
        )),
        Cmd::Root("apt-get update".into()),
        Cmd::Root("apt-get install fish -y".into()),
        Cmd::Root(format!("chsh -s {ALTERNATE_SHELL} {user}")),
        Cmd::User("curl -L https://get.oh-my.fish > /tmp/omf.sh".into()),
        Cmd::User("fish /tmp/omf.sh --noninteractive".into()),
        Cmd::User("rm /tmp/omf.sh".into()),
    ];
    cmds.extend(
        OMF_PLUGINS
            .iter()
            .map(|p| Cmd::User(format!("echo omf {p} | fish"))),
    );
    run_all(session, "fish", cmds).await?;
    info!(user, "fish installed");
    reporter.success("fish installed");
    Ok(())
}

/// `pip install virtualenv` for the session user.
///
/// # Errors
///
/// Returns an error if pip fails.
pub async fn install_virtualenv(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
) -> Result<()> {
    reporter.step("installing virtualenv");
    run_all(
        session,
        "virtualenv",
        vec![Cmd::User("python3 -m pip install virtualenv".into())],
    )
    .await?;
    reporter.success("virtualenv installed");
    Ok(())
}

/// Install Docker via get.docker.com, let `user` use it without sudo, and
/// add docker-compose to the user's `~/.local/bin`.
///
/// # Errors
///
/// Returns an error if any installer command fails.
pub async fn install_container_runtime(
    session: &impl RemoteSession,
    reporter: &impl ProgressReporter,
    user: &str,
) -> Result<()> {
    reporter.step("installing docker");
    let cmds = vec![
        Cmd::User("curl -fsSL https://get.docker.com -o /tmp/get-docker.sh".into()),
        Cmd::Root("sh /tmp/get-docker.sh".into()),
        Cmd::User("rm /tmp/get-docker.sh".into()),
        Cmd::Root(format!("usermod -aG docker {user}")),
        Cmd::User("python3 -m pip install docker-compose".into()),
        Cmd::User(format!("echo fish_add_path /home/{user}/.local/bin/ | fish")),
    ];
    run_all(session, "docker", cmds).await?;
    info!(user, "docker installed");
    reporter.success("docker installed");
    Ok(())
}
