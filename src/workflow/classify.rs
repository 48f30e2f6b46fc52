//! Workflow classify step.
//!
//! Loads the latest processed reviews and vocabulary, runs the batch runner
//! with the LM-backed classifier, and checkpoints into one new
//! `summarized_reviews_<ts>.json`.
use super::PipelineContext;
use crate::artifact::{read_json, JsonCheckpoint};
use crate::batch::{run_batches, BatchSettings, FailedBatchPolicy, RunSummary};
use crate::classifier::LmReviewClassifier;
use crate::cli::{BatchArgs, ClassifyArgs};
use crate::review::Review;
use crate::vocabulary::JourneyVocabulary;
use crate::workspace::ArtifactKind;
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

/// Outcome of one classify run.
#[derive(Debug, Clone, Serialize)]
pub struct ClassifyReport {
    pub input: PathBuf,
    pub vocabulary: PathBuf,
    pub output: PathBuf,
    /// False when no batch succeeded; `output` then does not exist.
    pub output_written: bool,
    pub batch_size: usize,
    pub max_batches: Option<usize>,
    pub failed_batch_policy: FailedBatchPolicy,
    #[serde(flatten)]
    pub summary: RunSummary,
}

pub fn run_classify(ctx: &PipelineContext, args: &ClassifyArgs) -> Result<()> {
    let report = classify(ctx, &args.batch, args.lm.lm.as_deref())?;
    if args.json {
        let text = serde_json::to_string_pretty(&report).context("serialize classify report")?;
        println!("{text}");
    } else {
        print_report(&report);
    }
    Ok(())
}

/// Apply CLI overrides on top of the configured batch settings.
pub(crate) fn batch_settings(base: BatchSettings, overrides: &BatchArgs) -> Result<BatchSettings> {
    let mut settings = base;
    if let Some(batch_size) = overrides.batch_size {
        settings.batch_size = batch_size;
    }
    if overrides.no_batch_cap {
        settings.max_batches = None;
    } else if let Some(max_batches) = overrides.max_batches {
        settings.max_batches = Some(max_batches);
    }
    if let Some(policy) = overrides.on_failed_batch {
        settings.failed_batch_policy = policy;
    }
    settings.validate()?;
    Ok(settings)
}

pub(crate) fn classify(
    ctx: &PipelineContext,
    overrides: &BatchArgs,
    lm_command: Option<&str>,
) -> Result<ClassifyReport> {
    let settings = batch_settings(ctx.config.batch_settings(), overrides)?;
    let input = ctx.paths.latest_artifact(ArtifactKind::ProcessedReviews)?;
    let reviews: Vec<Review> = read_json(&input)?;
    let vocabulary_path = ctx.paths.latest_artifact(ArtifactKind::JourneySteps)?;
    let vocabulary = JourneyVocabulary::load(&vocabulary_path)?;
    tracing::info!(
        input = %input.display(),
        vocabulary = %vocabulary_path.display(),
        reviews = reviews.len(),
        steps = vocabulary.len(),
        "loaded classify inputs"
    );

    let client = ctx.lm_client(lm_command)?;
    let mut logger = ctx.lm_logger()?;
    let mut classifier = LmReviewClassifier::new(&client, Some(&mut logger));
    let mut checkpoint =
        JsonCheckpoint::new(ctx.paths.new_artifact_path(ArtifactKind::SummarizedReviews)?);

    let (_, summary) = run_batches(
        &reviews,
        &vocabulary,
        &settings,
        &mut classifier,
        &mut checkpoint,
    )?;
    if !checkpoint.written() {
        tracing::warn!(
            output = %checkpoint.path().display(),
            "no batch succeeded; nothing written"
        );
    }

    Ok(ClassifyReport {
        input,
        vocabulary: vocabulary_path,
        output: checkpoint.path().to_path_buf(),
        output_written: checkpoint.written(),
        batch_size: settings.batch_size,
        max_batches: settings.max_batches,
        failed_batch_policy: settings.failed_batch_policy,
        summary,
    })
}

pub(crate) fn print_report(report: &ClassifyReport) {
    let summary = &report.summary;
    println!(
        "classified {} of {} reviews ({} of {} batches committed, {} planned)",
        summary.classified_reviews,
        summary.total_reviews,
        summary.committed_batches,
        summary.total_batches,
        summary.planned_batches
    );
    for dropped in &summary.dropped_batches {
        println!(
            "dropped batch {} (reviews {}..{}): review {}: {}",
            dropped.batch,
            dropped.first_review,
            dropped.end_review,
            dropped.failed_review,
            dropped.error
        );
    }
    if summary.aborted {
        println!("stopped after the first failed batch (policy: abort)");
    }
    if report.output_written {
        println!("wrote {}", report.output.display());
    } else {
        println!("no output written ({} not created)", report.output.display());
    }
}
