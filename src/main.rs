use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod aggregate;
mod artifact;
mod batch;
mod classifier;
mod cli;
mod config;
mod discover;
mod error;
mod lm;
mod lm_log;
mod preprocess;
mod report;
mod review;
mod vocabulary;
mod workflow;
mod workspace;

use cli::{Command, RootArgs};
use workflow::PipelineContext;

/// Environment variable holding a tracing filter (`info`, `jlens=debug`, ...).
const LOG_ENV: &str = "JLENS_LOG";

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    let root = workspace::resolve_root(args.data_dir.as_deref())?;
    let paths = workspace::WorkspacePaths::new(root);
    match args.command {
        Command::Init(args) => workflow::run_init(&paths, &args),
        Command::Preprocess => workflow::run_preprocess(&paths),
        Command::Sample(args) => workflow::run_sample(&PipelineContext::load(&paths)?, &args),
        Command::Discover(args) => workflow::run_discover(&PipelineContext::load(&paths)?, &args),
        Command::Classify(args) => workflow::run_classify(&PipelineContext::load(&paths)?, &args),
        Command::Aggregate => workflow::run_aggregate(&paths),
        Command::Report(args) => workflow::run_report(&paths, &args),
        Command::Run(args) => workflow::run_run(&paths, &args),
    }
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "info,jlens=debug" } else { "info" };
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
