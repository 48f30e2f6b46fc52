//! CLI argument parsing for the review pipeline.
//!
//! Every stage reads the newest artifact of its input kind from the
//! workspace and writes a new timestamped artifact, so each subcommand can be
//! run on its own or chained through `run`.
use crate::batch::FailedBatchPolicy;
use crate::workspace::DATA_DIR_ENV;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Root CLI entrypoint.
#[derive(Parser, Debug)]
#[command(
    name = "jlens",
    version,
    about = "Customer-journey classification and rating aggregation for review exports",
    after_help = "Commands:\n  init                 Create the workspace layout and config.json\n  preprocess           Normalize the raw export in raw-review-data/\n  sample               Draw reviews for journey discovery\n  discover             Ask the LM for the journey steps\n  classify             Summarize and label reviews in batches\n  aggregate            Count ratings per journey step\n  report               Print per-step rating summaries\n  run                  All of the above in order\n\nExamples:\n  jlens --data-dir ./data init\n  jlens --data-dir ./data run --lm 'llm -m gpt-4o-mini'\n  jlens classify --batch-size 10 --no-batch-cap\n  jlens report --json",
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct RootArgs {
    /// Workspace root holding raw data, artifacts and config.json
    #[arg(long, global = true, value_name = "DIR", env = DATA_DIR_ENV)]
    pub data_dir: Option<PathBuf>,

    /// Log debug detail to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Pipeline stages.
#[derive(Subcommand, Debug)]
pub enum Command {
    Init(InitArgs),
    /// Normalize the first raw export into processed_reviews_<ts>.json
    Preprocess,
    Sample(SampleArgs),
    Discover(DiscoverArgs),
    Classify(ClassifyArgs),
    /// Count ratings per journey step into ratings_by_step_<ts>.json
    Aggregate,
    Report(ReportArgs),
    Run(RunArgs),
}

#[derive(Parser, Debug)]
#[command(about = "Create the workspace layout and a default config.json")]
pub struct InitArgs {
    /// Overwrite an existing config.json with defaults
    #[arg(long)]
    pub force: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Draw a random review sample for journey discovery")]
pub struct SampleArgs {
    /// Seed the sampler for a reproducible draw
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,
}

/// LM backend override shared by the commands that call the service.
#[derive(Args, Debug, Clone, Default)]
pub struct LmArgs {
    /// LM command (prompt on stdin, answer on stdout); overrides config.json
    #[arg(long, value_name = "COMMAND")]
    pub lm: Option<String>,
}

#[derive(Parser, Debug)]
#[command(about = "Derive the journey steps from the latest sample")]
pub struct DiscoverArgs {
    #[command(flatten)]
    pub lm: LmArgs,
}

/// Batch overrides shared by `classify` and `run`.
#[derive(Args, Debug, Clone, Default)]
pub struct BatchArgs {
    /// Reviews per batch (overrides config.json)
    #[arg(long, value_name = "N")]
    pub batch_size: Option<usize>,

    /// Attempt at most N batches (overrides config.json)
    #[arg(long, value_name = "N", conflicts_with = "no_batch_cap")]
    pub max_batches: Option<usize>,

    /// Attempt every batch
    #[arg(long)]
    pub no_batch_cap: bool,

    /// What to do when a batch fails
    #[arg(long, value_enum, value_name = "POLICY")]
    pub on_failed_batch: Option<FailedBatchPolicy>,
}

#[derive(Parser, Debug)]
#[command(about = "Summarize and label the latest processed reviews in batches")]
pub struct ClassifyArgs {
    #[command(flatten)]
    pub batch: BatchArgs,

    #[command(flatten)]
    pub lm: LmArgs,

    /// Emit the run report as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Print per-step rating summaries of the latest ratings file")]
pub struct ReportArgs {
    /// Emit machine-readable JSON output
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
#[command(about = "Run every stage in order: preprocess through report")]
pub struct RunArgs {
    /// Re-initialize the workspace first (clears derived artifacts)
    #[arg(long)]
    pub fresh: bool,

    /// Seed the sampler for a reproducible draw
    #[arg(long, value_name = "N")]
    pub seed: Option<u64>,

    #[command(flatten)]
    pub batch: BatchArgs,

    #[command(flatten)]
    pub lm: LmArgs,
}
