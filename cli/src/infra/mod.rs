//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: local process execution,
//! filesystem access, configuration loading and the SSH transport.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod command_runner;
pub mod config;
pub mod fs;
pub mod keys;
pub mod ssh;
