//! `hostprep run|bootstrap|toolchain|cluster`: execute a stage plan.

use std::process::ExitCode;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;
use crate::application::services::pipeline::run_pipeline;
use crate::application::services::stages::StageDeps;
use crate::domain::{ProvisionConfig, StageId, StagePlan};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::fs::LocalFs;
use crate::infra::keys::KeyPairFiles;
use crate::infra::ssh::Ssh2Connector;
use crate::output::TerminalReporter;

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Also run the cluster stage (same as `stages.cluster: true`)
    #[arg(long)]
    pub with_cluster: bool,
}

/// Which stages a command asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Every stage; the cluster stage when flagged or enabled in the config.
    All { with_cluster: bool },
    /// One stage, regardless of `stages.*` settings.
    Only(StageId),
}

impl Selection {
    #[must_use]
    pub fn plan(self, config: &ProvisionConfig) -> StagePlan {
        match self {
            Self::All { with_cluster } => StagePlan::standard(with_cluster || config.stages.cluster),
            Self::Only(id) => StagePlan::single(id),
        }
    }
}

/// Provision the configured host with the selected stages.
///
/// # Errors
///
/// Returns an error if configuration is invalid or a stage fails.
pub async fn run(app: &AppContext, selection: Selection) -> Result<ExitCode> {
    let config = app.config_store.load()?;
    let plan = selection.plan(&config);
    let keys = KeyPairFiles::from_config(config.local_key_path.as_deref())?;

    let prompt = format!(
        "Provision {} as '{}' (initial account '{}')?",
        config.host, config.deployer.user, config.initial_login.user
    );
    if !app.confirm(&prompt, true)? {
        app.output.warn("aborted");
        return Ok(ExitCode::FAILURE);
    }

    let reporter = TerminalReporter::new(&app.output);
    let deps = StageDeps {
        config: &config,
        keys: &keys,
        local: &TokioCommandRunner::default(),
        files: &LocalFs,
        reporter: &reporter,
    };
    let mut report = run_pipeline(&Ssh2Connector, &deps, &plan).await?;
    report.warnings = reporter.into_warnings();
    app.renderer().render_report(&report)?;
    Ok(ExitCode::SUCCESS)
}
