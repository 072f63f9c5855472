//! SSH daemon hardening directives.
//!
//! `UsePAM` and `PermitRootLogin` are flipped whenever they are explicitly
//! enabled. `PasswordAuthentication` is only flipped from the commented
//! upstream default `#PasswordAuthentication yes`; an explicit
//! `PasswordAuthentication yes` is left alone.

use crate::domain::account::sh_quote;

pub const SSHD_CONFIG_PATH: &str = "/etc/ssh/sshd_config";
pub const SSHD_BACKUP_PATH: &str = "/etc/ssh/sshd_config.backup";
pub const SSHD_RELOAD_COMMAND: &str = "service ssh reload";

/// A line-anchored substitution applied with `sed -i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Substitution {
    /// Literal line prefix, anchored at column 0.
    pub from: &'static str,
    pub to: &'static str,
}

pub const HARDENING: [Substitution; 3] = [
    Substitution {
        from: "UsePAM yes",
        to: "UsePAM no",
    },
    Substitution {
        from: "PermitRootLogin yes",
        to: "PermitRootLogin no",
    },
    Substitution {
        from: "#PasswordAuthentication yes",
        to: "PasswordAuthentication no",
    },
];

impl Substitution {
    /// `sed -i 's/^<from>/<to>/' <path>`.
    #[must_use]
    pub fn sed_command(&self, path: &str) -> String {
        let script = format!("s/^{}/{}/", self.from, self.to);
        format!("sed -i {} {path}", sh_quote(&script))
    }
}
