//! The operator key pair invariant: 0 or 2 files, never 1.

#![allow(clippy::expect_used)]

use hostprep_cli::application::ports::LocalKeyStore;
use hostprep_cli::application::services::mutators::keys::ensure_local_keypair;
use hostprep_cli::domain::{Change, InvariantViolation};
use hostprep_cli::infra::keys::KeyPairFiles;

use crate::helpers::key_pair;
use crate::mocks::{KeygenRunner, NoLocalCommands, NoopReporter};

#[tokio::test]
async fn test_missing_pair_is_generated_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = KeyPairFiles::with_path(dir.path().join(".ssh").join("id_rsa"));
    let runner = KeygenRunner::default();

    let change = ensure_local_keypair(&keys, &runner, &NoopReporter)
        .await
        .expect("generated");

    assert_eq!(change, Change::Applied);
    assert_eq!(keys.present_count(), 2);
    assert_eq!(runner.call_count(), 1);
    let call = runner.calls.lock().expect("lock")[0].clone();
    assert_eq!(call[0], "ssh-keygen");
    for flag in ["-t", "rsa", "-b", "2048", "-N", ""] {
        assert!(call.iter().any(|a| a == flag), "missing {flag:?} in {call:?}");
    }
}

#[tokio::test]
async fn test_complete_pair_triggers_no_local_command() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = key_pair(dir.path());

    let change = ensure_local_keypair(&keys, &NoLocalCommands, &NoopReporter)
        .await
        .expect("present");

    assert_eq!(change, Change::Unchanged);
}

#[tokio::test]
async fn test_half_a_pair_is_an_invariant_violation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let keys = KeyPairFiles::with_path(dir.path().join("id_rsa"));
    std::fs::write(keys.public_key_path(), "ssh-rsa AAAA op@laptop\n").expect("write");
    let runner = KeygenRunner::default();

    let err = ensure_local_keypair(&keys, &runner, &NoopReporter)
        .await
        .expect_err("one of two files");

    assert!(matches!(
        err.downcast_ref::<InvariantViolation>(),
        Some(InvariantViolation::IncompleteKeyPair { present: 1, .. })
    ));
    assert_eq!(runner.call_count(), 0);
    assert!(!keys.private_key_path().exists());
}
