//! Canonical `authorized_keys` merging.
//!
//! The merged file is the sorted, deduplicated set of key lines plus the
//! operator's key. Comment lines take no part in the dedup/sort pass and are
//! not carried into the rewritten file.

use std::collections::BTreeSet;

/// Result of merging one public key into an existing key list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeysMerge {
    /// Canonical key lines, sorted and unique.
    pub lines: Vec<String>,
    /// `false` when `lines` equals the existing lines exactly.
    pub changed: bool,
}

impl KeysMerge {
    /// File content to write: one key per line, trailing newline.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = self.lines.join("\n");
        out.push('\n');
        out
    }
}

/// Splits `authorized_keys` content into lines, dropping blank ones.
#[must_use]
pub fn parse_lines(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}

#[must_use]
pub fn is_comment(line: &str) -> bool {
    line.trim_start().starts_with('#')
}

/// Merges `new_key` into `existing`.
///
/// Re-merging the key into the output of a previous merge always yields
/// `changed == false`.
#[must_use]
pub fn merge_authorized_keys(existing: &[String], new_key: &str) -> KeysMerge {
    let mut keys: BTreeSet<&str> = existing
        .iter()
        .map(String::as_str)
        .filter(|l| !is_comment(l))
        .collect();
    let new_key = new_key.trim();
    if !new_key.is_empty() {
        keys.insert(new_key);
    }
    let lines: Vec<String> = keys.into_iter().map(str::to_string).collect();
    let changed = lines.as_slice() != existing;
    KeysMerge { lines, changed }
}
