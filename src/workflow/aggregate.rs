//! Workflow aggregate and report steps.
use crate::aggregate::{aggregate, RatingsArtifact};
use crate::artifact::{read_json, write_json_atomic};
use crate::cli::ReportArgs;
use crate::report::{render_table, summarize, StepSummary};
use crate::review::ClassifiedReview;
use crate::vocabulary::JourneyVocabulary;
use crate::workspace::{ArtifactKind, WorkspacePaths};
use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct ReportOutput<'a> {
    ratings_file: &'a Path,
    steps: &'a [StepSummary],
}

pub fn run_aggregate(paths: &WorkspacePaths) -> Result<()> {
    let (output, skipped) = aggregate_latest(paths)?;
    println!("wrote {}", output.display());
    if skipped > 0 {
        println!("skipped {skipped} reviews with a journey step outside the vocabulary");
    }
    Ok(())
}

/// Count the latest classified reviews against the latest vocabulary.
///
/// Returns the new ratings artifact and the number of skipped reviews.
pub(crate) fn aggregate_latest(paths: &WorkspacePaths) -> Result<(PathBuf, usize)> {
    let input = paths.latest_artifact(ArtifactKind::SummarizedReviews)?;
    let reviews: Vec<ClassifiedReview> = read_json(&input)?;
    let vocabulary = JourneyVocabulary::load_latest(paths)?;

    let aggregation = aggregate(&reviews, &vocabulary);
    tracing::info!(
        input = %input.display(),
        counted = aggregation.counted,
        skipped = aggregation.skipped,
        steps = vocabulary.len(),
        "aggregated ratings"
    );
    let skipped = aggregation.skipped;

    let output = paths.new_artifact_path(ArtifactKind::RatingsByStep)?;
    write_json_atomic(&output, &aggregation.into_artifact())?;
    Ok((output, skipped))
}

pub fn run_report(paths: &WorkspacePaths, args: &ReportArgs) -> Result<()> {
    let input = paths.latest_artifact(ArtifactKind::RatingsByStep)?;
    let artifact: RatingsArtifact = read_json(&input)?;
    let summaries = summarize(&artifact);

    if args.json {
        let output = ReportOutput {
            ratings_file: &input,
            steps: &summaries,
        };
        let text = serde_json::to_string_pretty(&output).context("serialize report")?;
        println!("{text}");
    } else {
        println!("{}", input.display());
        print!("{}", render_table(&summaries));
    }
    Ok(())
}
