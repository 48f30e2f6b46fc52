//! Workflow preprocess step.
use crate::artifact::write_json_atomic;
use crate::preprocess::{find_raw_export, load_raw_export};
use crate::workspace::{ArtifactKind, WorkspacePaths};
use anyhow::Result;
use std::path::PathBuf;

pub fn run_preprocess(paths: &WorkspacePaths) -> Result<()> {
    let (output, count) = preprocess(paths)?;
    println!("wrote {} ({count} reviews)", output.display());
    Ok(())
}

/// Normalize the raw export; returns the new artifact and its review count.
pub(crate) fn preprocess(paths: &WorkspacePaths) -> Result<(PathBuf, usize)> {
    let input = find_raw_export(&paths.raw_dir())?;
    let reviews = load_raw_export(&input)?;
    tracing::info!(input = %input.display(), reviews = reviews.len(), "normalized raw reviews");

    let output = paths.new_artifact_path(ArtifactKind::ProcessedReviews)?;
    write_json_atomic(&output, &reviews)?;
    Ok((output, reviews.len()))
}
