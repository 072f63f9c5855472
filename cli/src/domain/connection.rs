//! Connection contexts, one per escalation level.
//!
//! A context says who we log in as, how we authenticate, how `sudo` gets its
//! secret, and which shell wraps every command. Contexts are built once from
//! the configuration and never mutated.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;

use crate::domain::account::sh_quote;
use crate::domain::config::{ProvisionConfig, Secret};

/// Login shell used until the alternate shell is installed.
pub const FALLBACK_SHELL: &str = "/bin/bash";
/// Shell installed by the toolchain stage.
pub const ALTERNATE_SHELL: &str = "/usr/bin/fish";

/// How a session authenticates at connection time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthMethod {
    Password(Secret),
    PublicKey { private_key: PathBuf },
}

impl AuthMethod {
    /// The SSH method name as reported in the server's allowed-methods list.
    #[must_use]
    pub fn ssh_name(&self) -> &'static str {
        match self {
            Self::Password(_) => "password",
            Self::PublicKey { .. } => "publickey",
        }
    }
}

/// The three escalation levels a run goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContextKind {
    /// Distribution default account, password auth.
    Initial,
    /// Deployer account, key auth, fallback shell.
    Deployer,
    /// Deployer account, key auth, alternate shell.
    DeployerFish,
}

impl ContextKind {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Initial => "initial",
            Self::Deployer => "deployer",
            Self::DeployerFish => "deployer-fish",
        }
    }
}

/// Everything needed to open one session. Immutable once built.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub kind: ContextKind,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth: AuthMethod,
    /// Secret fed to `sudo -S`. `None` means password-less escalation.
    pub escalation: Option<Secret>,
    /// Shell that wraps each command (`<shell> -c '<command>'`).
    pub shell: String,
    pub connect_timeout: Duration,
}

impl ConnectionContext {
    /// Builds the context for `kind` from the run configuration.
    #[must_use]
    pub fn build(config: &ProvisionConfig, kind: ContextKind, private_key: &Path) -> Self {
        let key_auth = || AuthMethod::PublicKey {
            private_key: private_key.to_path_buf(),
        };
        let (user, auth, escalation, shell) = match kind {
            ContextKind::Initial => (
                config.initial_login.user.clone(),
                AuthMethod::Password(config.initial_login.password.clone()),
                Some(config.initial_login.password.clone()),
                FALLBACK_SHELL,
            ),
            ContextKind::Deployer => (config.deployer.user.clone(), key_auth(), None, FALLBACK_SHELL),
            ContextKind::DeployerFish => {
                (config.deployer.user.clone(), key_auth(), None, ALTERNATE_SHELL)
            }
        };
        Self {
            kind,
            host: config.host.clone(),
            port: config.port,
            user,
            auth,
            escalation,
            shell: shell.to_string(),
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
        }
    }

    /// `command` wrapped in the context's shell.
    #[must_use]
    pub fn shell_command(&self, command: &str) -> String {
        format!("{} -c {}", self.shell, sh_quote(command))
    }

    /// `command` wrapped in the context's shell and run through `sudo`.
    ///
    /// With an escalation secret, `sudo` reads it from stdin (`-S`) with an
    /// empty prompt. Without one, `sudo -n` fails instead of prompting.
    #[must_use]
    pub fn sudo_command(&self, command: &str) -> String {
        let mode = if self.escalation.is_some() {
            "-S -p ''"
        } else {
            "-n"
        };
        format!("sudo {mode} {}", self.shell_command(command))
    }

    /// `host:port`, bracketing IPv6 literals.
    #[must_use]
    pub fn address(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}
