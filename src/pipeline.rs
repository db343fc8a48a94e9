//! Per-target orchestration.
//!
//! A target moves through `NotStarted → Generated → Renamed → Rewritten →
//! Done`. Generation is skipped when the tree already exists, and both
//! post-processing passes are skipped together when the target has no
//! post-processing configured. Any error moves the target to `Failed`.
//! Targets run concurrently and never share state.

use crate::error::PipelineError;
use crate::generator::{self, GeneratorSettings};
use crate::renamer;
use crate::rewriter::{self, RewriteSummary};
use crate::target::TargetConfig;
use futures::future::join_all;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    NotStarted,
    Generated,
    Renamed,
    Rewritten,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(self) -> bool {
        matches!(self, Stage::Done | Stage::Failed)
    }

    /// Whether `next` is a legal transition from this stage.
    pub fn can_advance_to(self, next: Stage) -> bool {
        use Stage::*;
        match (self, next) {
            (Done | Failed, _) => false,
            (_, Failed) => true,
            (NotStarted, Generated | Renamed | Done) => true,
            (Generated, Renamed | Done) => true,
            (Renamed, Rewritten) => true,
            (Rewritten, Done) => true,
            _ => false,
        }
    }
}

/// Outcome of one target's pipeline.
#[derive(Debug, Clone, Serialize)]
pub struct TargetReport {
    pub target: String,
    pub out: PathBuf,
    pub stage: Stage,
    /// Last stage reached before a failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_after: Option<Stage>,
    pub post_processed: bool,
    pub renamed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rewrite: Option<RewriteSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TargetReport {
    fn new(target: &TargetConfig) -> Self {
        Self {
            target: target.name.clone(),
            out: target.out.clone(),
            stage: Stage::NotStarted,
            failed_after: None,
            post_processed: false,
            renamed: 0,
            rewrite: None,
            error: None,
        }
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(
            self.stage.can_advance_to(next),
            "illegal transition {:?} -> {:?}",
            self.stage,
            next
        );
        self.stage = next;
    }

    pub fn failed(&self) -> bool {
        self.stage == Stage::Failed
    }
}

/// Runs one target to a terminal stage.
///
/// With `generator` set the output directory is regenerated first; without
/// it the existing tree is post-processed as is.
pub async fn run_target(
    target: &TargetConfig,
    generator: Option<&GeneratorSettings>,
) -> TargetReport {
    let mut report = TargetReport::new(target);

    let outcome = drive(target, generator, &mut report).await;
    match outcome {
        Ok(()) => {
            report.advance(Stage::Done);
            info!(name = %target.name, "done");
        }
        Err(err) => {
            error!(name = %target.name, stage = ?report.stage, "{}", err);
            report.error = Some(err.to_string());
            report.failed_after = Some(report.stage);
            report.advance(Stage::Failed);
        }
    }

    report
}

async fn drive(
    target: &TargetConfig,
    generator: Option<&GeneratorSettings>,
    report: &mut TargetReport,
) -> Result<(), PipelineError> {
    if let Some(settings) = generator {
        generator::generate(target, settings).await?;
        report.advance(Stage::Generated);
    }

    let Some(post_process) = target.post_process else {
        info!(name = %target.name, "post-processing disabled, leaving tree as generated");
        return Ok(());
    };

    // The rewrite needs the complete mapping set, so renaming finishes first.
    let mappings = renamer::rename_generated(&target.out, post_process.rules()).await?;
    report.renamed = mappings.len();
    report.advance(Stage::Renamed);

    let summary = rewriter::rewrite_imports(&target.out, &mappings).await?;
    report.rewrite = Some(summary);
    report.post_processed = true;
    report.advance(Stage::Rewritten);

    Ok(())
}

/// Runs all targets concurrently. One target failing does not stop the
/// others; reports come back in target order.
pub async fn run_all(
    targets: &[TargetConfig],
    generator: Option<&GeneratorSettings>,
) -> Vec<TargetReport> {
    join_all(targets.iter().map(|t| run_target(t, generator))).await
}
