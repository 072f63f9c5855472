//! Human-readable terminal renderer.

use std::path::Path;

use crate::application::services::pipeline::PipelineReport;
use crate::domain::{ProvisionConfig, StageOutcome};
use crate::output::OutputContext;

pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    pub fn render_version(&self, version: &str) {
        if self.ctx.quiet {
            return;
        }
        self.ctx.info(&format!("hostprep v{version}"));
    }

    /// Stage-by-stage summary after a run.
    pub fn render_report(&self, report: &PipelineReport) {
        if self.ctx.quiet {
            return;
        }
        println!();
        self.ctx.header("Summary");
        for stage in &report.stages {
            let label = format!("stage {}: {}", stage.ordinal, stage.title);
            match stage.outcome {
                StageOutcome::Completed => self.ctx.success(&label),
                StageOutcome::SkippedAlreadyBootstrapped => {
                    self.ctx.skipped(&format!("{label} (skipped, already bootstrapped)"));
                }
                StageOutcome::Disabled => self.ctx.skipped(&format!("{label} (disabled)")),
            }
        }
        if !report.warnings.is_empty() {
            println!();
            self.ctx.header("Review");
            for warning in &report.warnings {
                self.ctx.warn(warning);
            }
        }
    }

    /// Configuration with secrets redacted.
    pub fn render_config(&self, config: &ProvisionConfig, path: &Path) {
        let ctx = self.ctx;
        ctx.header(&path.display().to_string());
        ctx.kv("host", &format!("{}:{}", config.host, config.port));
        ctx.kv("initial_login.user", &config.initial_login.user);
        ctx.kv("deployer.user", &config.deployer.user);
        ctx.kv("deployer.group", &config.deployer.group);
        ctx.kv("deployer.full_name", config.deployer.full_name());
        ctx.kv("hostname", config.hostname.as_deref().unwrap_or("(unchanged)"));
        ctx.kv(
            "local_key_path",
            &config
                .local_key_path
                .as_ref()
                .map_or_else(|| "~/.ssh/id_rsa".to_string(), |p| p.display().to_string()),
        );
        ctx.kv(
            "services_docker_path",
            &config
                .services_docker_path
                .as_ref()
                .map_or_else(|| "(none)".to_string(), |p| p.display().to_string()),
        );
        ctx.kv("toolchain.packages", &config.toolchain.packages.join(" "));
        ctx.kv("toolchain.fish_release", &config.toolchain.fish_release);
        ctx.kv(
            "stages.cluster",
            if config.stages.cluster { "enabled" } else { "disabled" },
        );
    }
}
