//! Numeric per-step summaries of a rating distribution.
use crate::aggregate::{RatingCounts, RatingsArtifact};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// Ratings a summary accounts for.
pub const RATING_VALUES: std::ops::RangeInclusive<u8> = 1..=5;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepSummary {
    pub step: String,
    /// Count per rating value "1" through "5"; missing ratings count 0.
    pub ratings: BTreeMap<String, u64>,
    pub total: u64,
    /// Mean rating rounded to one decimal; absent when nothing was counted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average: Option<f64>,
    /// `(average - 3) / 2` rounded to one decimal, 0.0 when nothing was counted.
    pub normalized: f64,
}

impl StepSummary {
    pub fn from_counts(step: &str, counts: &RatingCounts) -> Self {
        let mut ratings = BTreeMap::new();
        let mut total = 0u64;
        let mut weighted = 0u64;
        for rating in RATING_VALUES {
            let key = rating.to_string();
            let count = counts.get(&key).copied().unwrap_or(0);
            total += count;
            weighted += u64::from(rating) * count;
            ratings.insert(key, count);
        }
        for (key, count) in counts.iter() {
            if !ratings.contains_key(key) {
                tracing::debug!(step, rating = key, count, "ignoring rating outside 1-5");
            }
        }

        let average = (total > 0).then(|| round1(weighted as f64 / total as f64));
        let normalized = average.map_or(0.0, |avg| round1((avg - 3.0) / 2.0));
        Self {
            step: step.to_string(),
            ratings,
            total,
            average,
            normalized,
        }
    }

    fn count(&self, rating: u8) -> u64 {
        self.ratings.get(&rating.to_string()).copied().unwrap_or(0)
    }
}

/// One summary per step, in artifact order.
pub fn summarize(artifact: &RatingsArtifact) -> Vec<StepSummary> {
    artifact
        .journey_steps
        .iter()
        .map(|(step, counts)| StepSummary::from_counts(step, counts))
        .collect()
}

/// Render summaries as a fixed-width text table.
pub fn render_table(summaries: &[StepSummary]) -> String {
    let step_width = summaries
        .iter()
        .map(|summary| summary.step.chars().count())
        .chain(std::iter::once("step".len()))
        .max()
        .unwrap_or(4);

    let mut out = String::new();
    let _ = write!(out, "{:<step_width$}", "step");
    for rating in RATING_VALUES {
        let _ = write!(out, " {:>5}", format!("{rating}*"));
    }
    let _ = writeln!(out, " {:>6} {:>5} {:>6}", "total", "avg", "norm");

    for summary in summaries {
        let _ = write!(out, "{:<step_width$}", summary.step);
        for rating in RATING_VALUES {
            let _ = write!(out, " {:>5}", summary.count(rating));
        }
        let average = summary
            .average
            .map_or_else(|| "-".to_string(), |avg| format!("{avg:.1}"));
        let _ = writeln!(
            out,
            " {:>6} {:>5} {:>6.1}",
            summary.total, average, summary.normalized
        );
    }
    out
}

/// Round to one decimal the way Python's `round(x, 1)` does.
///
/// Formatting rounds the exact binary value with ties to even, so `2.25`
/// becomes `2.2` and `-0.85` (stored just above it) becomes `-0.8`.
fn round1(value: f64) -> f64 {
    format!("{value:.1}").parse().unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(text: &str) -> RatingsArtifact {
        serde_json::from_str(text).expect("parse ratings artifact")
    }

    #[test]
    fn summaries_follow_artifact_order_and_round_averages() {
        let summaries = summarize(&artifact(
            r#"{"journeySteps":{"Purchase":{"5":2,"2":1},"Discovery":{"3":1},"Support":{}}}"#,
        ));

        let steps: Vec<_> = summaries.iter().map(|s| s.step.as_str()).collect();
        assert_eq!(steps, vec!["Purchase", "Discovery", "Support"]);

        // (5 + 5 + 2) / 3 = 4.0
        assert_eq!(summaries[0].total, 3);
        assert_eq!(summaries[0].average, Some(4.0));
        assert_eq!(summaries[0].normalized, 0.5);
        assert_eq!(summaries[0].ratings.get("1"), Some(&0));

        assert_eq!(summaries[1].average, Some(3.0));
        assert_eq!(summaries[1].normalized, 0.0);

        assert_eq!(summaries[2].total, 0);
        assert_eq!(summaries[2].average, None);
        assert_eq!(summaries[2].normalized, 0.0);
    }

    fn summary_of(step: &str, counts: &str) -> StepSummary {
        let artifact = artifact(&format!(r#"{{"journeySteps":{{"{step}":{counts}}}}}"#));
        summarize(&artifact).remove(0)
    }

    #[test]
    fn normalization_uses_the_rounded_average() {
        // (1 * 2 + 2) / 3 = 1.333.. -> 1.3; (1.3 - 3) / 2 is just above -0.85.
        let summary = summary_of("Billing", r#"{"1":2,"2":1}"#);
        assert_eq!(summary.average, Some(1.3));
        assert_eq!(summary.normalized, -0.8);
    }

    #[test]
    fn exact_ties_round_to_even() {
        // (2 * 3 + 3) / 4 = 2.25 exactly.
        let summary = summary_of("Delivery", r#"{"2":3,"3":1}"#);
        assert_eq!(summary.average, Some(2.2));
        assert_eq!(summary.normalized, -0.4);

        // (4 * 3 + 5) / 4 = 4.25 -> 4.2; (4.2 - 3) / 2 = 0.6.
        let summary = summary_of("Support", r#"{"4":3,"5":1}"#);
        assert_eq!(summary.average, Some(4.2));
        assert_eq!(summary.normalized, 0.6);

        assert_eq!(round1(0.75), 0.8);
        assert_eq!(round1(0.25), 0.2);
    }

    #[test]
    fn ratings_outside_one_to_five_are_not_counted() {
        let summaries = summarize(&artifact(r#"{"journeySteps":{"Odd":{"0":4,"4":1}}}"#));
        assert_eq!(summaries[0].total, 1);
        assert_eq!(summaries[0].average, Some(4.0));
    }

    #[test]
    fn table_lists_every_step() {
        let summaries = summarize(&artifact(
            r#"{"journeySteps":{"Onboarding":{"4":1},"Support":{}}}"#,
        ));
        let table = render_table(&summaries);
        let lines: Vec<_> = table.lines().collect();

        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("step"));
        assert!(lines[1].starts_with("Onboarding"));
        assert!(lines[1].contains("4.0"));
        assert!(lines[2].starts_with("Support"));
        assert!(lines[2].contains(" - "), "{table}");
    }
}
