//! Property-based tests for the authorized-keys merge.
//!
//! Uses `proptest` to verify the dedup/sort laws across many random inputs.

use std::collections::BTreeSet;

use proptest::prelude::*;

use hostprep_cli::domain::authorized_keys::{is_comment, merge_authorized_keys};

fn key_line() -> impl Strategy<Value = String> {
    "(ssh-rsa|ssh-ed25519) [A-Za-z0-9+/]{4,12} [a-z]{1,6}@[a-z]{1,6}"
}

fn any_line() -> impl Strategy<Value = String> {
    prop_oneof![4 => key_line(), 1 => "# [a-z ]{0,12}"]
}

proptest! {
    /// Every non-comment line appears exactly once and the output is sorted.
    #[test]
    fn prop_merge_is_sorted_and_unique(
        existing in prop::collection::vec(any_line(), 0..12),
        new_key in key_line(),
    ) {
        let merged = merge_authorized_keys(&existing, &new_key);
        let mut sorted = merged.lines.clone();
        sorted.sort();
        sorted.dedup();
        prop_assert_eq!(&merged.lines, &sorted);
        prop_assert!(merged.lines.iter().all(|l| !is_comment(l)));

        let expected: BTreeSet<String> = existing
            .iter()
            .filter(|l| !is_comment(l))
            .cloned()
            .chain(std::iter::once(new_key.clone()))
            .collect();
        prop_assert_eq!(merged.lines.iter().cloned().collect::<BTreeSet<_>>(), expected);
    }

    /// Re-applying the same key to the merged output changes nothing.
    #[test]
    fn prop_merge_is_idempotent(
        existing in prop::collection::vec(any_line(), 0..12),
        new_key in key_line(),
    ) {
        let first = merge_authorized_keys(&existing, &new_key);
        let second = merge_authorized_keys(&first.lines, &new_key);
        prop_assert!(!second.changed);
        prop_assert_eq!(second.render(), first.render());
    }
}

#[test]
fn test_merge_example_from_a_dirty_file() {
    let existing: Vec<String> = ["# note", "ssh-rsa AAA... a", "ssh-rsa AAA... a"]
        .iter()
        .map(|s| (*s).to_string())
        .collect();
    let merged = merge_authorized_keys(&existing, "ssh-rsa BBB... b");
    assert_eq!(merged.lines, ["ssh-rsa AAA... a", "ssh-rsa BBB... b"]);
    assert!(merged.changed);
}
