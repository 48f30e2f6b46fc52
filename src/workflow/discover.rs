//! Workflow sample and discover steps.
//!
//! `sample` draws review descriptions from the latest processed reviews;
//! `discover` sends the latest sample to the LM and stores the journey steps.
use super::PipelineContext;
use crate::artifact::{read_json, write_json_atomic};
use crate::cli::{DiscoverArgs, SampleArgs};
use crate::discover::{discover_journey_steps, draw_sample};
use crate::review::Review;
use crate::vocabulary::JourneyVocabulary;
use crate::workspace::ArtifactKind;
use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

pub fn run_sample(ctx: &PipelineContext, args: &SampleArgs) -> Result<()> {
    let (output, count) = sample(ctx, args.seed)?;
    println!("wrote {} ({count} reviews)", output.display());
    Ok(())
}

pub fn run_discover(ctx: &PipelineContext, args: &DiscoverArgs) -> Result<()> {
    let (output, vocabulary) = discover(ctx, args.lm.lm.as_deref())?;
    println!(
        "wrote {} ({} journey steps)",
        output.display(),
        vocabulary.len()
    );
    for step in vocabulary.steps() {
        println!("  {step}");
    }
    Ok(())
}

pub(crate) fn sample(ctx: &PipelineContext, seed: Option<u64>) -> Result<(PathBuf, usize)> {
    let input = ctx.paths.latest_artifact(ArtifactKind::ProcessedReviews)?;
    let reviews: Vec<Review> = read_json(&input)?;
    let sample = draw_sample(&reviews, ctx.config.sample_size, seed);
    tracing::info!(
        input = %input.display(),
        available = reviews.len(),
        sampled = sample.len(),
        "drew journey sample"
    );

    let output = ctx.paths.new_artifact_path(ArtifactKind::Sample)?;
    write_json_atomic(&output, &sample)?;
    Ok((output, sample.len()))
}

pub(crate) fn discover(
    ctx: &PipelineContext,
    lm_command: Option<&str>,
) -> Result<(PathBuf, JourneyVocabulary)> {
    let sample_path = ctx.paths.latest_artifact(ArtifactKind::Sample)?;
    let sample_text = fs::read_to_string(&sample_path)
        .with_context(|| format!("read {}", sample_path.display()))?;
    let subject = sample_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let client = ctx.lm_client(lm_command)?;
    let mut logger = ctx.lm_logger()?;
    let vocabulary = discover_journey_steps(&client, Some(&mut logger), &subject, &sample_text)
        .with_context(|| format!("discover journey steps from {}", sample_path.display()))?;

    let output = ctx.paths.new_artifact_path(ArtifactKind::JourneySteps)?;
    write_json_atomic(&output, &vocabulary)?;
    Ok((output, vocabulary))
}
