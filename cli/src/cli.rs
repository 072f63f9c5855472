//! CLI argument parsing with clap derive

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;
use crate::commands::provision::Selection;
use crate::domain::StageId;

/// Bootstrap a fresh host into a hardened machine owned by a deployer account
#[derive(Parser)]
#[command(
    name = "hostprep",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Configuration file (default: $HOSTPREP_CONFIG, then ~/.hostprep/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(
        long,
        global = true,
        env = "NO_COLOR",
        value_parser = clap::builder::FalseyValueParser::new()
    )]
    pub no_color: bool,

    /// Skip the confirmation prompt
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Log remote commands to stderr (HOSTPREP_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run every enabled stage in order
    Run(commands::provision::RunArgs),

    /// Stage 1: create the deployer account and lock the host down
    Bootstrap,

    /// Stage 2: install packages, fish, virtualenv and docker
    Toolchain,

    /// Stage 3: trust GitHub, copy service env files, install k3s
    Cluster,

    /// Inspect configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),

    /// Show version
    Version,
}

impl Cli {
    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn run(self) -> Result<ExitCode> {
        let Cli {
            config,
            json,
            quiet,
            no_color,
            yes,
            verbose: _,
            command,
        } = self;
        let app = AppContext::new(AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { yes, config },
        });
        match command {
            Command::Run(args) => {
                let selection = Selection::All {
                    with_cluster: args.with_cluster,
                };
                commands::provision::run(&app, selection).await
            }
            Command::Bootstrap => {
                commands::provision::run(&app, Selection::Only(StageId::Bootstrap)).await
            }
            Command::Toolchain => {
                commands::provision::run(&app, Selection::Only(StageId::Toolchain)).await
            }
            Command::Cluster => {
                commands::provision::run(&app, Selection::Only(StageId::Cluster)).await
            }
            Command::Config(cmd) => commands::config::run(&app, &cmd),
            Command::Version => commands::version::run(&app),
        }
    }
}
