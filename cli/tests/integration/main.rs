//! Integration tests for the hostprep CLI
//!
//! These tests spawn the actual binary and test end-to-end behavior that
//! needs no reachable host.

mod cli_tests;
