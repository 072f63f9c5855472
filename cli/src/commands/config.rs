//! `hostprep config`: inspect the provisioning configuration.

use std::process::ExitCode;

use anyhow::Result;
use clap::Subcommand;

use crate::app::AppContext;
use crate::application::ports::ConfigStore;

/// Config subcommands.
#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show the configuration with passwords redacted
    Show,
    /// Validate the configuration without connecting
    Check,
}

/// Run the config command.
///
/// # Errors
///
/// Returns an error if the configuration cannot be loaded.
pub fn run(app: &AppContext, cmd: &ConfigCommand) -> Result<ExitCode> {
    match cmd {
        ConfigCommand::Show => show_config(app),
        ConfigCommand::Check => check_config(app),
    }
}

fn show_config(app: &AppContext) -> Result<ExitCode> {
    let config = app.config_store.load_unchecked()?;
    let path = app.config_store.path()?;
    app.renderer().render_config(&config, &path)?;
    Ok(ExitCode::SUCCESS)
}

fn check_config(app: &AppContext) -> Result<ExitCode> {
    let config = app.config_store.load()?;
    app.output.success(&format!(
        "configuration valid: {} as '{}'",
        config.host, config.deployer.user
    ));
    Ok(ExitCode::SUCCESS)
}
