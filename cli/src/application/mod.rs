//! Application layer: use-case orchestration.
//!
//! This module imports only from `crate::domain`. It never imports from
//! `crate::infra`, `crate::commands`, or `crate::output`.

pub mod ports;
pub mod services;
