//! Stage definitions: which steps run under which connection context, and
//! what a failed stage entry means.

use serde::Serialize;

use crate::domain::connection::ContextKind;

// ── Steps ─────────────────────────────────────────────────────────────────────

/// One idempotent mutator, in the order a stage runs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    VerifyEscalation,
    EnsureGroup,
    GrantPasswordlessSudo,
    EnsureUser,
    EnsureLocalKeypair,
    MergeAuthorizedKeys,
    HardenSshDaemon,
    SetHostname,
    DisableInitialLogin,
    InstallPackages,
    InstallShell,
    InstallVirtualEnv,
    InstallContainerRuntime,
    TrustGithubHostKeys,
    CopyServiceEnvFiles,
    InstallClusterRuntime,
}

const BOOTSTRAP_STEPS: &[Step] = &[
    Step::VerifyEscalation,
    Step::EnsureGroup,
    Step::GrantPasswordlessSudo,
    Step::EnsureUser,
    Step::EnsureLocalKeypair,
    Step::MergeAuthorizedKeys,
    Step::HardenSshDaemon,
    Step::SetHostname,
    Step::DisableInitialLogin,
];

const TOOLCHAIN_STEPS: &[Step] = &[
    Step::VerifyEscalation,
    Step::InstallPackages,
    Step::InstallShell,
    Step::InstallVirtualEnv,
    Step::InstallContainerRuntime,
];

const CLUSTER_STEPS: &[Step] = &[
    Step::VerifyEscalation,
    Step::TrustGithubHostKeys,
    Step::CopyServiceEnvFiles,
    Step::InstallClusterRuntime,
];

// ── Stages ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageId {
    Bootstrap,
    Toolchain,
    Cluster,
}

/// What to do when the stage's session cannot be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Any connection failure aborts the run.
    Fatal,
    /// A publickey-only auth mismatch means a previous run already disabled
    /// the password login; treat the stage as done.
    SkipWhenPublicKeyOnly,
}

impl StageId {
    pub const ALL: [StageId; 3] = [StageId::Bootstrap, StageId::Toolchain, StageId::Cluster];

    #[must_use]
    pub fn ordinal(self) -> u8 {
        match self {
            Self::Bootstrap => 1,
            Self::Toolchain => 2,
            Self::Cluster => 3,
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Bootstrap => "bootstrap identity",
            Self::Toolchain => "toolchain install",
            Self::Cluster => "cluster bootstrap",
        }
    }

    #[must_use]
    pub fn context(self) -> ContextKind {
        match self {
            Self::Bootstrap => ContextKind::Initial,
            Self::Toolchain => ContextKind::Deployer,
            Self::Cluster => ContextKind::DeployerFish,
        }
    }

    #[must_use]
    pub fn steps(self) -> &'static [Step] {
        match self {
            Self::Bootstrap => BOOTSTRAP_STEPS,
            Self::Toolchain => TOOLCHAIN_STEPS,
            Self::Cluster => CLUSTER_STEPS,
        }
    }

    #[must_use]
    pub fn failure_policy(self) -> FailurePolicy {
        match self {
            Self::Bootstrap => FailurePolicy::SkipWhenPublicKeyOnly,
            Self::Toolchain | Self::Cluster => FailurePolicy::Fatal,
        }
    }
}

/// A stage as scheduled for one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stage {
    pub id: StageId,
    pub enabled: bool,
}

/// Ordered stage list. Disabled stages stay in the plan and are reported as
/// such instead of being dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePlan {
    stages: Vec<Stage>,
}

impl StagePlan {
    /// Bootstrap and toolchain on, cluster only when requested.
    #[must_use]
    pub fn standard(cluster: bool) -> Self {
        Self::only(|id| id != StageId::Cluster || cluster)
    }

    /// A plan where exactly `id` is enabled.
    #[must_use]
    pub fn single(id: StageId) -> Self {
        Self::only(|s| s == id)
    }

    fn only(enabled: impl Fn(StageId) -> bool) -> Self {
        Self {
            stages: StageId::ALL
                .iter()
                .map(|&id| Stage {
                    id,
                    enabled: enabled(id),
                })
                .collect(),
        }
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }
}

// ── Outcomes ──────────────────────────────────────────────────────────────────

/// How a stage ended, when it did not abort the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageOutcome {
    Completed,
    /// Stage 1 could not log in with a password because a previous run
    /// already locked the initial account down.
    SkippedAlreadyBootstrapped,
    Disabled,
}

/// Result of trying to open a stage's session.
#[derive(Debug)]
pub enum StageEntry<S> {
    Connected(S),
    AlreadyBootstrapped,
    FatalAuthError { allowed: Vec<String> },
}

/// Classification of an auth-method mismatch under a stage's policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchVerdict {
    AlreadyBootstrapped,
    Fatal,
}

/// Decides whether an auth-method mismatch is the known re-run case.
///
/// Only an allowed set of exactly `{publickey}` under
/// [`FailurePolicy::SkipWhenPublicKeyOnly`] counts as already bootstrapped.
#[must_use]
pub fn classify_auth_mismatch(policy: FailurePolicy, allowed: &[String]) -> MismatchVerdict {
    let publickey_only = !allowed.is_empty() && allowed.iter().all(|m| m == "publickey");
    match policy {
        FailurePolicy::SkipWhenPublicKeyOnly if publickey_only => {
            MismatchVerdict::AlreadyBootstrapped
        }
        _ => MismatchVerdict::Fatal,
    }
}
