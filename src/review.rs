//! Review records as they move through the pipeline.
//!
//! Field names match the JSON artifacts (`reviewTitle`, `journeyStep`, ...).
//! Fields beyond the known set are carried through untouched.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A normalized review, before classification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    #[serde(rename = "reviewDateOfExperience")]
    pub date_of_experience: String,
    #[serde(rename = "reviewTitle")]
    pub title: String,
    #[serde(rename = "reviewDescription")]
    pub description: String,
    #[serde(rename = "reviewRatingScore")]
    pub rating_score: u8,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The external service's answer for one review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Classification {
    #[serde(rename = "reviewSummary")]
    pub summary: String,
    #[serde(rename = "journeyStep")]
    pub journey_step: String,
}

/// A review with its summary and journey step; the raw description is gone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedReview {
    #[serde(rename = "reviewDateOfExperience")]
    pub date_of_experience: String,
    #[serde(rename = "reviewTitle")]
    pub title: String,
    #[serde(rename = "reviewRatingScore")]
    pub rating_score: u8,
    #[serde(rename = "reviewSummary")]
    pub summary: String,
    #[serde(rename = "journeyStep")]
    pub journey_step: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Review {
    /// Build the classified form of this review without touching the original.
    pub fn classified(&self, classification: Classification) -> ClassifiedReview {
        ClassifiedReview {
            date_of_experience: self.date_of_experience.clone(),
            title: self.title.clone(),
            rating_score: self.rating_score,
            summary: classification.summary,
            journey_step: classification.journey_step,
            extra: self.extra.clone(),
        }
    }
}
