//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::Result;

use crate::domain::{ConnectionContext, ProvisionConfig, SessionError};

// ── Value Types ───────────────────────────────────────────────────────────────

/// How a remote command's non-zero exit is handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Return the result instead of failing on a non-zero exit.
    pub warn_on_failure: bool,
}

impl RunOptions {
    /// Fail on non-zero exit.
    pub const STRICT: Self = Self {
        warn_on_failure: false,
    };
    /// Inspection mode: the caller inspects `ok`.
    pub const WARN: Self = Self {
        warn_on_failure: true,
    };
}

/// Captured result of one remote command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub ok: bool,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandOutput {
    #[must_use]
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            ok: exit_code == 0,
            stdout: stdout.into(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Applies `opts`: a failed command becomes [`SessionError::CommandFailed`]
    /// unless `warn_on_failure` is set.
    ///
    /// # Errors
    ///
    /// Returns `CommandFailed` for a non-zero exit in strict mode.
    pub fn check(self, command: &str, opts: RunOptions) -> Result<Self> {
        if self.ok || opts.warn_on_failure {
            return Ok(self);
        }
        Err(SessionError::CommandFailed {
            command: command.to_string(),
            code: self.exit_code,
            stderr: self.stderr,
        }
        .into())
    }
}

// ── Remote Session Port ───────────────────────────────────────────────────────

/// An open, authenticated connection to the host being provisioned.
#[allow(async_fn_in_trait)]
pub trait RemoteSession {
    /// Run `command` as the session's identity.
    async fn run(&self, command: &str, opts: RunOptions) -> Result<CommandOutput>;
    /// Run `command` with `sudo`, feeding the context's escalation secret.
    async fn escalate(&self, command: &str, opts: RunOptions) -> Result<CommandOutput>;
    /// Copy the local file at `local` to `remote`, replacing it.
    async fn upload(&self, local: &Path, remote: &str) -> Result<()>;
    /// Close the connection.
    async fn close(self) -> Result<()>;
}

/// Opens [`RemoteSession`]s for a connection context.
#[allow(async_fn_in_trait)]
pub trait SessionConnector {
    type Session: RemoteSession;

    /// Connect and authenticate.
    ///
    /// # Errors
    ///
    /// Fails with [`SessionError::AuthenticationKindMismatch`] when the host
    /// does not accept the context's auth method, or any other
    /// [`SessionError`] for connection problems.
    async fn connect(&self, ctx: &ConnectionContext) -> Result<Self::Session>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts local process execution so infrastructure can be swapped or mocked.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned).
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: std::time::Duration,
    ) -> Result<Output>;
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Loads the provisioning configuration.
pub trait ConfigStore {
    /// Read and validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing, unparsable or invalid.
    fn load(&self) -> Result<ProvisionConfig>;
    /// Where the configuration is read from.
    fn path(&self) -> Result<PathBuf>;
}

// ── Local Key Port ────────────────────────────────────────────────────────────

/// The operator's SSH key pair on the local machine.
pub trait LocalKeyStore {
    /// Path of the private key; the public key sits next to it.
    fn private_key_path(&self) -> PathBuf;
    fn public_key_path(&self) -> PathBuf;
    /// Create the directory holding the pair if needed.
    fn ensure_dir(&self) -> Result<()>;
    /// Number of the two key files that exist (0, 1 or 2).
    fn present_count(&self) -> usize;
    /// Public key material, trimmed.
    fn read_public_key(&self) -> Result<String>;
}

// ── Local Files Port ──────────────────────────────────────────────────────────

/// Local scratch files and service env files.
pub trait LocalFiles {
    /// Guard over a staged file; the file is removed when it drops.
    type Staged: AsRef<Path>;

    /// Write `content` to a fresh local file for upload.
    fn stage(&self, content: &[u8]) -> Result<Self::Staged>;
    /// `*.env` files directly under `dir`, sorted by name.
    fn env_files(&self, dir: &Path) -> Result<Vec<PathBuf>>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
