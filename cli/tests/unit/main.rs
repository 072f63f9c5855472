//! Unit tests for the hostprep CLI
//!
//! These tests run the application services against an in-memory host and
//! never touch the network.

mod helpers;
mod local_keys;
mod pipeline;
mod property_tests;
