//! Convenience workflow for `jlens run`.
//!
//! A thin wrapper that chains the stage commands; every stage still reads the
//! newest artifact written by the one before it.
use super::aggregate::{aggregate_latest, run_report};
use super::classify::{classify, print_report};
use super::discover::{discover, sample};
use super::init::initialize_workspace;
use super::preprocess::preprocess;
use super::PipelineContext;
use crate::cli::{ReportArgs, RunArgs};
use crate::workspace::WorkspacePaths;
use anyhow::Result;

/// Run preprocess, sample, discover, classify, aggregate and report in order.
pub fn run_run(paths: &WorkspacePaths, args: &RunArgs) -> Result<()> {
    if args.fresh {
        initialize_workspace(paths, false)?;
        eprintln!("run: initialized workspace at {}", paths.root().display());
    }
    let ctx = PipelineContext::load(paths)?;
    let lm_command = args.lm.lm.as_deref();

    let (processed, count) = preprocess(paths)?;
    eprintln!("run: preprocessed {count} reviews -> {}", processed.display());

    let (sample_path, sampled) = sample(&ctx, args.seed)?;
    eprintln!("run: sampled {sampled} reviews -> {}", sample_path.display());

    let (steps_path, vocabulary) = discover(&ctx, lm_command)?;
    eprintln!(
        "run: discovered {} journey steps -> {}",
        vocabulary.len(),
        steps_path.display()
    );

    let report = classify(&ctx, &args.batch, lm_command)?;
    print_report(&report);
    if !report.output_written {
        return Err(anyhow::anyhow!(
            "no reviews were classified; see {}",
            paths.lm_log_path().display()
        ));
    }

    let (ratings_path, skipped) = aggregate_latest(paths)?;
    eprintln!(
        "run: aggregated ratings ({skipped} skipped) -> {}",
        ratings_path.display()
    );

    run_report(paths, &ReportArgs { json: false })
}
