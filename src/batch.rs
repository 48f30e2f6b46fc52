//! Batch runner for review classification.
//!
//! Reviews are split into fixed-size batches; a batch is the failure unit.
//! Every batch yields `Result<BatchOutcome, BatchError>`: `Ok` batches are
//! appended to the accumulated output and checkpointed, `Err` batches are
//! handled by the configured [`FailedBatchPolicy`]. Batches run strictly in
//! order and reviews inside a batch run in list order.
use crate::classifier::ReviewClassifier;
use crate::error::BatchError;
use crate::review::{ClassifiedReview, Review};
use crate::vocabulary::JourneyVocabulary;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// What to do with a batch that failed.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum FailedBatchPolicy {
    /// Drop the batch's reviews from this run and continue with the next batch.
    #[default]
    Drop,
    /// Stop the run; batches committed so far stay checkpointed.
    Abort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    pub batch_size: usize,
    /// At most this many batches are attempted; `None` attempts all.
    pub max_batches: Option<usize>,
    pub failed_batch_policy: FailedBatchPolicy,
}

impl BatchSettings {
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(anyhow!("batch_size must be at least 1"));
        }
        if self.max_batches == Some(0) {
            return Err(anyhow!(
                "max_batches must be at least 1 (use null for no cap)"
            ));
        }
        Ok(())
    }
}

/// Receives the full accumulated output after every committed batch.
pub trait CheckpointSink {
    fn commit(&mut self, reviews: &[ClassifiedReview]) -> Result<()>;
}

/// A batch whose reviews were all classified.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub index: usize,
    pub reviews: Vec<ClassifiedReview>,
}

/// Record of a batch left out of the output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DroppedBatch {
    pub batch: usize,
    /// Input positions of the batch's reviews (end exclusive).
    pub first_review: usize,
    pub end_review: usize,
    /// Input position of the review that failed.
    pub failed_review: usize,
    pub error: String,
}

/// Totals for one classification run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_reviews: usize,
    pub total_batches: usize,
    /// `min(total_batches, max_batches)`.
    pub planned_batches: usize,
    pub attempted_batches: usize,
    pub committed_batches: usize,
    pub classified_reviews: usize,
    pub dropped_batches: Vec<DroppedBatch>,
    /// The run stopped early under [`FailedBatchPolicy::Abort`].
    pub aborted: bool,
}

/// Split `reviews` into batches of `batch_size`; the last one may be short.
pub fn partition(reviews: &[Review], batch_size: usize) -> Vec<&[Review]> {
    reviews.chunks(batch_size.max(1)).collect()
}

/// Number of batches a run over `total_reviews` will attempt at most.
pub fn planned_batches(total_reviews: usize, settings: &BatchSettings) -> usize {
    let total = total_reviews.div_ceil(settings.batch_size.max(1));
    settings.max_batches.map_or(total, |cap| total.min(cap))
}

/// Classify one batch; the first failing review fails the whole batch.
pub fn classify_batch(
    index: usize,
    batch: &[Review],
    first_review: usize,
    vocabulary: &JourneyVocabulary,
    classifier: &mut dyn ReviewClassifier,
) -> Result<BatchOutcome, BatchError> {
    let mut reviews = Vec::with_capacity(batch.len());
    for (offset, review) in batch.iter().enumerate() {
        let review_index = first_review + offset;
        let classification = classifier
            .classify(vocabulary, review_index, &review.description)
            .map_err(|source| BatchError {
                batch: index,
                review: review_index,
                source,
            })?;
        reviews.push(review.classified(classification));
    }
    Ok(BatchOutcome { index, reviews })
}

/// Run all planned batches, checkpointing after every committed one.
///
/// Returns the accumulated output and the run summary. Only checkpoint
/// failures are errors here; classification failures are batch outcomes.
pub fn run_batches(
    reviews: &[Review],
    vocabulary: &JourneyVocabulary,
    settings: &BatchSettings,
    classifier: &mut dyn ReviewClassifier,
    sink: &mut dyn CheckpointSink,
) -> Result<(Vec<ClassifiedReview>, RunSummary)> {
    let batches = partition(reviews, settings.batch_size);
    let planned = planned_batches(reviews.len(), settings);
    let mut summary = RunSummary {
        total_reviews: reviews.len(),
        total_batches: batches.len(),
        planned_batches: planned,
        ..RunSummary::default()
    };
    tracing::info!(
        reviews = reviews.len(),
        batches = batches.len(),
        planned,
        batch_size = settings.batch_size,
        "starting batch processing"
    );

    let mut committed: Vec<ClassifiedReview> = Vec::new();
    for (index, batch) in batches.into_iter().enumerate().take(planned) {
        let range = batch_range(index, batch.len(), settings.batch_size);
        tracing::info!(batch = index + 1, total = planned, "processing batch");
        summary.attempted_batches += 1;

        match classify_batch(index, batch, range.start, vocabulary, classifier) {
            Ok(outcome) => {
                let batch_number = outcome.index + 1;
                committed.extend(outcome.reviews);
                sink.commit(&committed)?;
                summary.committed_batches += 1;
                tracing::info!(
                    batch = batch_number,
                    total = planned,
                    committed_reviews = committed.len(),
                    "completed batch"
                );
            }
            Err(err) => {
                tracing::warn!(
                    batch = index + 1,
                    review = err.review,
                    error = %err.source,
                    policy = ?settings.failed_batch_policy,
                    "batch failed"
                );
                summary.dropped_batches.push(DroppedBatch {
                    batch: index,
                    first_review: range.start,
                    end_review: range.end,
                    failed_review: err.review,
                    error: err.source.to_string(),
                });
                if settings.failed_batch_policy == FailedBatchPolicy::Abort {
                    summary.aborted = true;
                    break;
                }
            }
        }
    }

    summary.classified_reviews = committed.len();
    tracing::info!(
        classified = summary.classified_reviews,
        dropped_batches = summary.dropped_batches.len(),
        aborted = summary.aborted,
        "batch processing finished"
    );
    Ok((committed, summary))
}

fn batch_range(index: usize, len: usize, batch_size: usize) -> Range<usize> {
    let start = index * batch_size.max(1);
    start..start + len
}

#[cfg(test)]
#[path = "batch_tests.rs"]
mod tests;
