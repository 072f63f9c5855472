//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use thiserror::Error;

// ── Session errors ────────────────────────────────────────────────────────────

/// Failures raised by a `RemoteSession` or by the local command runner.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The host refused the attempted authentication method.
    ///
    /// `allowed` is the list of methods the host is still willing to accept,
    /// as reported during the SSH handshake.
    #[error("{host} does not accept {attempted} authentication for '{user}' (allowed: {})", .allowed.join(", "))]
    AuthenticationKindMismatch {
        host: String,
        user: String,
        attempted: String,
        allowed: Vec<String>,
    },

    #[error("cannot connect to {host}: {reason}")]
    Connect { host: String, reason: String },

    #[error("authentication as '{user}' on {host} failed")]
    AuthenticationFailed { host: String, user: String },

    #[error("command exited with status {code}: {command}{}", format_stderr(.stderr))]
    CommandFailed {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("local command '{program}' failed: {detail}")]
    LocalCommand { program: String, detail: String },
}

impl SessionError {
    /// Methods the host still accepts, when this is an auth-kind mismatch.
    #[must_use]
    pub fn allowed_methods(&self) -> Option<&[String]> {
        match self {
            Self::AuthenticationKindMismatch { allowed, .. } => Some(allowed),
            _ => None,
        }
    }
}

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("\n{trimmed}")
    }
}

// ── Invariant violations ──────────────────────────────────────────────────────

/// Conditions that must abort the run before anything else is mutated.
#[derive(Debug, Error)]
pub enum InvariantViolation {
    #[error(
        "local key pair is incomplete: {present} of 2 files present ({private_key}, {public_key}). \
         Restore or remove the remaining file and re-run."
    )]
    IncompleteKeyPair {
        present: usize,
        private_key: String,
        public_key: String,
    },

    #[error("staged sudoers file failed validation, /etc/sudoers left untouched: {0}")]
    SudoersRejected(String),

    #[error(
        "sudo no longer works after installing the new sudoers file ({0}). \
         Restore /etc/sudoers.backup from a root console before continuing."
    )]
    SudoersBroken(String),

    #[error("escalation check failed for '{user}': {detail}")]
    EscalationUnavailable { user: String, detail: String },
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {value}\n\n{reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("The deployer user must differ from the initial login user ('{0}')")]
    DeployerIsInitialUser(String),
}
