//! Domain layer: pure business logic, types, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod account;
pub mod authorized_keys;
pub mod config;
pub mod connection;
pub mod error;
pub mod sshd;
pub mod stage;
pub mod sudoers;

/// Whether a mutator changed the host or found it already in shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Change {
    Applied,
    Unchanged,
}

pub use config::{ProvisionConfig, Secret};
pub use connection::{AuthMethod, ConnectionContext, ContextKind};
pub use error::{ConfigError, InvariantViolation, SessionError};
pub use stage::{StageEntry, StageId, StageOutcome, StagePlan, Step};
