//! Workflow orchestration for the review pipeline.
//!
//! Each step loads its inputs from the workspace, calls into the core
//! modules, and writes one new artifact, so the CLI stays thin.
mod aggregate;
mod classify;
mod context;
mod discover;
mod init;
mod preprocess;
mod run;

pub(crate) use aggregate::{run_aggregate, run_report};
pub(crate) use classify::run_classify;
pub(crate) use context::PipelineContext;
pub(crate) use discover::{run_discover, run_sample};
pub(crate) use init::run_init;
pub(crate) use preprocess::run_preprocess;
pub(crate) use run::run_run;
