//! Application service: run the stage plan in order.

use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::application::ports::{
    CommandRunner, LocalFiles, LocalKeyStore, ProgressReporter, SessionConnector,
};
use crate::application::services::stages::{StageDeps, run_stage};
use crate::domain::{StageId, StageOutcome, StagePlan};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageReport {
    pub stage: StageId,
    pub ordinal: u8,
    pub title: &'static str,
    pub outcome: StageOutcome,
}

/// Per-stage outcomes of a run that did not abort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub stages: Vec<StageReport>,
    /// Conditions flagged for operator review during the run.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl PipelineReport {
    #[must_use]
    pub fn outcome_of(&self, stage: StageId) -> Option<StageOutcome> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.outcome)
    }
}

/// Run the enabled stages of `plan` in order. Stops at the first failing stage.
///
/// `stage_pause_ms` is slept before every enabled stage except the first one
/// attempted, including after a bootstrap stage that was skipped, so the
/// daemon reload of an earlier run has settled before the next connection.
///
/// # Errors
///
/// Returns the failing stage's error. Stages after it are not attempted.
pub async fn run_pipeline<C, K, L, F, R>(
    connector: &C,
    deps: &StageDeps<'_, K, L, F, R>,
    plan: &StagePlan,
) -> Result<PipelineReport>
where
    C: SessionConnector,
    K: LocalKeyStore,
    L: CommandRunner,
    F: LocalFiles,
    R: ProgressReporter,
{
    let pause = Duration::from_millis(deps.config.stage_pause_ms);
    let mut report = PipelineReport::default();
    let mut attempted = false;

    for stage in plan.stages() {
        let id = stage.id;
        let outcome = if stage.enabled {
            if attempted && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
            attempted = true;
            run_stage(connector, deps, id).await?
        } else {
            info!(stage = id.ordinal(), "stage disabled");
            StageOutcome::Disabled
        };
        report.stages.push(StageReport {
            stage: id,
            ordinal: id.ordinal(),
            title: id.title(),
            outcome,
        });
    }
    Ok(report)
}
