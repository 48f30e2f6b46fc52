//! Typed errors at the pipeline seams.
//!
//! The workflow layer works in `anyhow::Result`; these types exist where a
//! caller has to tell failures apart (a missing artifact is fatal, a service
//! failure only costs the current batch).
use std::path::PathBuf;
use thiserror::Error;

/// No artifact matching the expected naming pattern exists.
#[derive(Debug, Error)]
#[error("no {what} found in {} (expected {pattern})", dir.display())]
pub struct NotFound {
    pub what: &'static str,
    pub dir: PathBuf,
    pub pattern: String,
}

/// Failure of the external text service for a single request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ServiceError {
    /// The request could not be completed (spawn, transport, exit status, HTTP status).
    #[error("LM request failed: {0}")]
    Request(String),
    /// The service answered, but not with the expected JSON object.
    #[error("malformed LM response: {0}")]
    Malformed(String),
}

/// A batch that was aborted by one of its reviews.
#[derive(Debug, Clone, Error)]
#[error("batch {batch} failed at review {review}: {source}")]
pub struct BatchError {
    /// Zero-based batch index.
    pub batch: usize,
    /// Zero-based index of the failing review in the full input collection.
    pub review: usize,
    pub source: ServiceError,
}
