//! Application service: run one stage over one session.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::application::ports::{
    CommandRunner, LocalFiles, LocalKeyStore, ProgressReporter, RemoteSession, SessionConnector,
};
use crate::application::services::mutators::{
    cluster, group,
    keys::{self, KeyTarget},
    login, sshd, sudo, toolchain,
    user::{self, NewUser},
};
use crate::domain::stage::{FailurePolicy, MismatchVerdict, classify_auth_mismatch};
use crate::domain::{
    ConnectionContext, ProvisionConfig, SessionError, StageEntry, StageId, StageOutcome, Step,
};

/// Everything a stage needs besides its session.
pub struct StageDeps<'a, K, L, F, R> {
    pub config: &'a ProvisionConfig,
    pub keys: &'a K,
    pub local: &'a L,
    pub files: &'a F,
    pub reporter: &'a R,
}

impl<K, L, F, R> StageDeps<'_, K, L, F, R>
where
    K: LocalKeyStore,
    L: CommandRunner,
    F: LocalFiles,
    R: ProgressReporter,
{
    /// The connection context `stage` runs under.
    #[must_use]
    pub fn context_for(&self, stage: StageId) -> ConnectionContext {
        ConnectionContext::build(self.config, stage.context(), &self.keys.private_key_path())
    }

    async fn run_step(
        &self,
        session: &impl RemoteSession,
        ctx: &ConnectionContext,
        step: Step,
    ) -> Result<()> {
        let Self {
            config,
            keys,
            local,
            files,
            reporter,
        } = self;
        let deployer = &config.deployer;
        debug!(?step, context = ctx.kind.label(), "running step");
        match step {
            Step::VerifyEscalation => sudo::verify_escalation(session, *reporter, &ctx.user).await?,
            Step::EnsureGroup => {
                group::ensure_group(session, *reporter, &deployer.group).await?;
            }
            Step::GrantPasswordlessSudo => {
                sudo::grant_passwordless_sudo(session, *files, *reporter, &deployer.group).await?;
            }
            Step::EnsureUser => {
                let new_user = NewUser {
                    name: &deployer.user,
                    group: &deployer.group,
                    full_name: deployer.full_name(),
                    password: &deployer.password,
                };
                user::ensure_user(session, *reporter, new_user).await?;
            }
            Step::EnsureLocalKeypair => {
                keys::ensure_local_keypair(*keys, *local, *reporter).await?;
            }
            Step::MergeAuthorizedKeys => {
                let target = KeyTarget {
                    user: &deployer.user,
                    group: &deployer.group,
                };
                keys::merge_authorized_keys_for(session, *keys, *files, *reporter, target).await?;
            }
            Step::HardenSshDaemon => sshd::harden_ssh_daemon(session, *reporter).await?,
            Step::SetHostname => match &config.hostname {
                Some(hostname) => {
                    login::set_hostname(session, *reporter, hostname).await?;
                }
                None => debug!("no hostname configured"),
            },
            Step::DisableInitialLogin => {
                login::disable_initial_login(session, *reporter, &config.initial_login.user)
                    .await?;
            }
            Step::InstallPackages => {
                toolchain::install_packages(session, *reporter, &config.toolchain.packages).await?;
            }
            Step::InstallShell => {
                toolchain::install_shell(
                    session,
                    *reporter,
                    &deployer.user,
                    &config.toolchain.fish_release,
                )
                .await?;
            }
            Step::InstallVirtualEnv => toolchain::install_virtualenv(session, *reporter).await?,
            Step::InstallContainerRuntime => {
                toolchain::install_container_runtime(session, *reporter, &deployer.user).await?;
            }
            Step::TrustGithubHostKeys => {
                cluster::trust_github_host_keys(session, *reporter).await?;
            }
            Step::CopyServiceEnvFiles => {
                cluster::copy_service_env_files(
                    session,
                    *files,
                    *reporter,
                    config.services_docker_path.as_deref(),
                    &deployer.user,
                )
                .await?;
            }
            Step::InstallClusterRuntime => {
                cluster::install_cluster_runtime(session, *reporter).await?;
            }
        }
        Ok(())
    }
}

/// Open the session for `ctx`, classifying an auth-method mismatch under
/// `policy`. Any other connection failure is returned as an error.
///
/// # Errors
///
/// Returns the connector's error for everything except an auth-method
/// mismatch.
pub async fn enter_stage<C: SessionConnector>(
    connector: &C,
    ctx: &ConnectionContext,
    policy: FailurePolicy,
) -> Result<StageEntry<C::Session>> {
    match connector.connect(ctx).await {
        Ok(session) => Ok(StageEntry::Connected(session)),
        Err(e) => {
            let allowed = match e
                .downcast_ref::<SessionError>()
                .and_then(SessionError::allowed_methods)
            {
                Some(allowed) => allowed.to_vec(),
                None => return Err(e),
            };
            match classify_auth_mismatch(policy, &allowed) {
                MismatchVerdict::AlreadyBootstrapped => Ok(StageEntry::AlreadyBootstrapped),
                MismatchVerdict::Fatal => Ok(StageEntry::FatalAuthError { allowed }),
            }
        }
    }
}

/// Run every step of `stage` over a fresh session. The session is closed
/// whether or not the steps succeed.
///
/// # Errors
///
/// Returns the first failing step's error, or the connection error.
pub async fn run_stage<C, K, L, F, R>(
    connector: &C,
    deps: &StageDeps<'_, K, L, F, R>,
    stage: StageId,
) -> Result<StageOutcome>
where
    C: SessionConnector,
    K: LocalKeyStore,
    L: CommandRunner,
    F: LocalFiles,
    R: ProgressReporter,
{
    let ctx = deps.context_for(stage);
    let label = format!("stage {} ({})", stage.ordinal(), stage.title());
    info!(stage = %label, user = %ctx.user, context = ctx.kind.label(), "entering stage");
    deps.reporter
        .step(&format!("{label}: connecting to {} as '{}'", ctx.address(), ctx.user));

    let session = match enter_stage(connector, &ctx, stage.failure_policy())
        .await
        .with_context(|| format!("{label}: cannot open session"))?
    {
        StageEntry::Connected(session) => session,
        StageEntry::AlreadyBootstrapped => {
            info!(stage = %label, "password login refused, host already bootstrapped");
            deps.reporter.warn(&format!(
                "'{}' can no longer log in with a password; skipping {label}",
                ctx.user
            ));
            return Ok(StageOutcome::SkippedAlreadyBootstrapped);
        }
        StageEntry::FatalAuthError { allowed } => {
            return Err(SessionError::AuthenticationKindMismatch {
                host: ctx.host.clone(),
                user: ctx.user.clone(),
                attempted: ctx.auth.ssh_name().to_string(),
                allowed,
            })
            .with_context(|| format!("{label}: cannot open session"));
        }
    };

    let mut result = Ok(());
    for &step in stage.steps() {
        result = deps.run_step(&session, &ctx, step).await;
        if result.is_err() {
            break;
        }
    }
    if let Err(e) = session.close().await {
        warn!(stage = %label, error = %e, "failed to close session");
    }
    result.with_context(|| format!("{label} failed"))?;
    info!(stage = %label, "stage completed");
    Ok(StageOutcome::Completed)
}
