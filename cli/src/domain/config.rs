//! Domain types and validators for provisioning configuration.
//!
//! Pure functions only, no I/O.

use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize, Serializer};

use crate::domain::error::ConfigError;

// ── Constants ────────────────────────────────────────────────────────────────

pub const DEFAULT_SSH_PORT: u16 = 22;
pub const DEFAULT_DEPLOYER_GROUP: &str = "deployer";
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_STAGE_PAUSE_MS: u64 = 1000;
pub const DEFAULT_FISH_RELEASE: &str = "Debian_10";

/// Packages installed by the toolchain stage when none are configured.
pub const DEFAULT_PACKAGES: &[&str] = &[
    "build-essential",
    "cmake",
    "cron",
    "curl",
    "git",
    "libffi-dev",
    "nano",
    "python3-pip",
    "python3",
    "wget",
];

/// POSIX-portable account and group names, as accepted by `useradd` on Debian.
pub static ACCOUNT_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z_][a-z0-9_-]{0,31}$").expect("valid regex")
});

/// RFC 1123 host label.
pub static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9]([A-Za-z0-9-]{0,61}[A-Za-z0-9])?$").expect("valid regex")
});

/// Distribution path segments used by the fish apt repository, e.g. `Debian_12`.
pub static RELEASE_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z0-9_.]+$").expect("valid regex")
});

// ── Secret ───────────────────────────────────────────────────────────────────

/// A password that never shows up in `Debug` or serialized output.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw secret. Only transports and hashers should call this.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("***")
    }
}

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration, read once at startup and passed by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvisionConfig {
    /// Address of the host being provisioned.
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// The distribution's default account, reachable by password only.
    pub initial_login: LoginConfig,
    pub deployer: DeployerConfig,
    /// Optional hostname applied during the bootstrap stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    /// Directory holding `*.env` files for the cluster stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services_docker_path: Option<PathBuf>,
    /// Operator private key; the public half is `<path>.pub`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_key_path: Option<PathBuf>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Pause between the bootstrap and toolchain stages.
    #[serde(default = "default_stage_pause")]
    pub stage_pause_ms: u64,
    #[serde(default)]
    pub stages: StagesConfig,
    #[serde(default)]
    pub toolchain: ToolchainConfig,
}

/// Credentials of the initial (distribution default) account.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginConfig {
    pub user: String,
    pub password: Secret,
}

/// The dedicated non-root identity that owns the host after bootstrap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeployerConfig {
    pub user: String,
    pub password: Secret,
    #[serde(default = "default_group")]
    pub group: String,
    /// GECOS full name. Defaults to the user name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
}

impl DeployerConfig {
    #[must_use]
    pub fn full_name(&self) -> &str {
        self.full_name.as_deref().unwrap_or(&self.user)
    }
}

/// Stages that are defined but off unless requested.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StagesConfig {
    /// Run the cluster-runtime stage after the toolchain stage.
    #[serde(default)]
    pub cluster: bool,
}

/// Payload knobs for the toolchain stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ToolchainConfig {
    #[serde(default = "default_packages")]
    pub packages: Vec<String>,
    /// openSUSE build-service distribution segment for the fish repository.
    #[serde(default = "default_fish_release")]
    pub fish_release: String,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            packages: default_packages(),
            fish_release: default_fish_release(),
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_SSH_PORT
}

fn default_group() -> String {
    DEFAULT_DEPLOYER_GROUP.to_string()
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_stage_pause() -> u64 {
    DEFAULT_STAGE_PAUSE_MS
}

fn default_packages() -> Vec<String> {
    DEFAULT_PACKAGES.iter().map(|p| (*p).to_string()).collect()
}

fn default_fish_release() -> String {
    DEFAULT_FISH_RELEASE.to_string()
}

// ── Validators ───────────────────────────────────────────────────────────────

impl ProvisionConfig {
    /// Checks every value that ends up interpolated into a remote command.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::Missing("host").into());
        }
        if self.port == 0 {
            return Err(invalid("port", "0", "Port must be between 1 and 65535."));
        }
        validate_account_name("initial_login.user", &self.initial_login.user)?;
        validate_account_name("deployer.user", &self.deployer.user)?;
        validate_account_name("deployer.group", &self.deployer.group)?;
        if self.initial_login.password.is_empty() {
            return Err(ConfigError::Missing("initial_login.password").into());
        }
        if self.deployer.password.is_empty() {
            return Err(ConfigError::Missing("deployer.password").into());
        }
        if self.deployer.user == self.initial_login.user {
            return Err(ConfigError::DeployerIsInitialUser(self.deployer.user.clone()).into());
        }
        if let Some(name) = &self.deployer.full_name {
            if name.contains([':', '\n']) {
                return Err(invalid(
                    "deployer.full_name",
                    name,
                    "The full name must not contain ':' or newlines.",
                ));
            }
        }
        if let Some(hostname) = &self.hostname {
            if !HOSTNAME_RE.is_match(hostname) {
                return Err(invalid(
                    "hostname",
                    hostname,
                    "Use letters, digits and '-' (max 63 characters).",
                ));
            }
        }
        if !RELEASE_RE.is_match(&self.toolchain.fish_release) {
            return Err(invalid(
                "toolchain.fish_release",
                &self.toolchain.fish_release,
                "Expected a distribution segment such as Debian_12.",
            ));
        }
        if let Some(bad) = self.toolchain.packages.iter().find(|p| !is_package_name(p)) {
            return Err(invalid(
                "toolchain.packages",
                bad,
                "Package names may contain lowercase letters, digits and '+-.'.",
            ));
        }
        Ok(())
    }
}

/// Validates a user or group name.
///
/// # Errors
///
/// Returns an error if the name is empty or not a portable account name.
pub fn validate_account_name(key: &'static str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ConfigError::Missing(key).into());
    }
    if !ACCOUNT_NAME_RE.is_match(name) {
        return Err(invalid(
            key,
            name,
            "Names must start with a lowercase letter or '_' and contain only [a-z0-9_-].",
        ));
    }
    Ok(())
}

fn is_package_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "+-.".contains(c))
}

fn invalid(key: &'static str, value: &str, reason: &str) -> anyhow::Error {
    ConfigError::InvalidValue {
        key,
        value: value.to_string(),
        reason: reason.to_string(),
    }
    .into()
}

// ── Unit tests ───────────────────────────────────────────────────────────────
