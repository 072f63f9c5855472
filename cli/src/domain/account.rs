//! Remote account helpers: paths, password hashing, shell quoting.

use anyhow::{Result, anyhow};
use sha_crypt::{Sha256Params, sha256_simple};

/// Rounds used for SHA-256 crypt; matches the glibc default.
const SHA256_CRYPT_ROUNDS: usize = 5_000;

/// Login shell assigned to accounts that must not log in interactively.
pub const NOLOGIN_SHELL: &str = "/usr/sbin/nologin";

/// `~/.ssh` of `user` on a Debian-family host.
#[must_use]
pub fn ssh_dir_for(user: &str) -> String {
    if user == "root" {
        "/root/.ssh".to_string()
    } else {
        format!("/home/{user}/.ssh")
    }
}

/// `authorized_keys` path of `user`.
#[must_use]
pub fn authorized_keys_path_for(user: &str) -> String {
    format!("{}/authorized_keys", ssh_dir_for(user))
}

/// Hashes `password` into the `$5$` crypt format accepted by `useradd -p`.
///
/// # Errors
///
/// Returns an error if the hasher cannot obtain a random salt.
pub fn hash_password(password: &str) -> Result<String> {
    let params = Sha256Params::new(SHA256_CRYPT_ROUNDS)
        .map_err(|e| anyhow!("invalid sha256-crypt parameters: {e:?}"))?;
    sha256_simple(password, &params).map_err(|e| anyhow!("cannot hash password: {e:?}"))
}

/// Single-quotes `s` for a POSIX shell.
#[must_use]
pub fn sh_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}
