//! Workflow init step.
//!
//! Init lays out the workspace. Directories holding artifacts derived from
//! the current raw export are recreated empty; raw data and the classify and
//! aggregate outputs are left alone.
use crate::cli::InitArgs;
use crate::config::{default_config, write_config};
use crate::workspace::{ArtifactKind, WorkspacePaths};
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Artifact directories removed and recreated by init.
pub(crate) const CLEANED_KINDS: [ArtifactKind; 3] = [
    ArtifactKind::ProcessedReviews,
    ArtifactKind::Sample,
    ArtifactKind::JourneySteps,
];

/// Artifact directories created when missing, never emptied.
pub(crate) const PRESERVED_KINDS: [ArtifactKind; 2] =
    [ArtifactKind::SummarizedReviews, ArtifactKind::RatingsByStep];

/// Run the init step and report what happened.
pub fn run_init(paths: &WorkspacePaths, args: &InitArgs) -> Result<()> {
    let config_written = initialize_workspace(paths, args.force)?;
    if config_written {
        println!("wrote {}", paths.config_path().display());
    } else {
        println!(
            "kept existing {} (use --force to reset)",
            paths.config_path().display()
        );
    }
    println!("workspace ready at {}", paths.root().display());
    Ok(())
}

/// Lay out the workspace; returns whether config.json was (re)written.
pub(crate) fn initialize_workspace(paths: &WorkspacePaths, force: bool) -> Result<bool> {
    for kind in CLEANED_KINDS {
        recreate_dir(&paths.artifact_dir(kind))?;
    }
    ensure_dir(&paths.raw_dir())?;
    for kind in PRESERVED_KINDS {
        ensure_dir(&paths.artifact_dir(kind))?;
    }

    let config_path = paths.config_path();
    if config_path.is_file() && !force {
        return Ok(false);
    }
    write_config(paths, &default_config())?;
    tracing::info!(path = %config_path.display(), "wrote default config");
    Ok(true)
}

fn recreate_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        fs::remove_dir_all(dir).with_context(|| format!("remove {}", dir.display()))?;
        tracing::debug!(dir = %dir.display(), "cleared directory");
    }
    ensure_dir(dir)
}

fn ensure_dir(dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))
}

#[cfg(test)]
#[path = "init_tests.rs"]
mod tests;
