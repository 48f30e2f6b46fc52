//! Vocabulary discovery: review sampling and the journey-steps LM call.
use crate::error::ServiceError;
use crate::lm::{extract_json, fill_template, join_prompt, preview, LmClient};
use crate::lm_log::{LmInvocationKind, LmLogger};
use crate::review::Review;
use crate::vocabulary::JourneyVocabulary;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

const SYSTEM_PROMPT: &str =
    "You are a customer journey expert. Return only a JSON array of journey steps.";
const JOURNEY_STEPS: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/journey_steps.md"
));

/// One sampled review; only the description goes to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleEntry {
    #[serde(rename = "reviewDescription")]
    pub description: String,
}

/// Draw `min(sample_size, reviews.len())` reviews without replacement.
pub fn draw_sample(reviews: &[Review], sample_size: usize, seed: Option<u64>) -> Vec<SampleEntry> {
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let amount = sample_size.min(reviews.len());
    reviews
        .choose_multiple(&mut rng, amount)
        .map(|review| SampleEntry {
            description: review.description.clone(),
        })
        .collect()
}

pub fn build_discovery_prompt(sample_text: &str) -> String {
    fill_template(JOURNEY_STEPS, &[("reviews", sample_text)])
}

/// Parse the service answer into a non-empty vocabulary.
pub fn parse_journey_steps(text: &str) -> Result<JourneyVocabulary, ServiceError> {
    let malformed = |detail: String| {
        ServiceError::Malformed(format!(
            "{detail}; response starts with: {}",
            preview(text.trim(), 200)
        ))
    };
    let value: Value =
        serde_json::from_str(extract_json(text)).map_err(|err| malformed(err.to_string()))?;
    let vocabulary =
        JourneyVocabulary::from_value(&value).map_err(|err| malformed(format!("{err:#}")))?;
    if vocabulary.is_empty() {
        return Err(malformed("no journey steps returned".to_string()));
    }
    Ok(vocabulary)
}

/// Ask the service for the journey steps behind a review sample.
///
/// `sample_text` is the sample artifact's content, sent as is.
pub fn discover_journey_steps(
    client: &LmClient,
    mut logger: Option<&mut LmLogger>,
    subject: &str,
    sample_text: &str,
) -> Result<JourneyVocabulary, ServiceError> {
    let user = build_discovery_prompt(sample_text);
    let prompt = join_prompt(SYSTEM_PROMPT, &user);
    let builder = logger
        .as_deref_mut()
        .map(|logger| logger.begin(LmInvocationKind::JourneyDiscovery));

    let start = Instant::now();
    let mut attempts_made = 0;
    let mut last_response = String::new();
    let outcome = client.with_retries(|_| {
        attempts_made += 1;
        let response = client.complete(SYSTEM_PROMPT, &user)?;
        let parsed = parse_journey_steps(&response);
        last_response = response;
        parsed
    });

    if let (Some(builder), Some(logger)) = (builder, logger.as_deref()) {
        let builder = builder.with_subject(subject).with_prompt_preview(&prompt);
        match &outcome {
            Ok((vocabulary, attempts)) => {
                let entry =
                    builder.success(*attempts, format!("{} journey steps", vocabulary.len()));
                logger.record(&entry, &prompt, Some(&last_response));
            }
            Err(err) => {
                let entry = builder.failed(attempts_made, err.to_string());
                logger.record(&entry, &prompt, Some(&last_response));
            }
        }
    }

    let (vocabulary, attempts) = outcome?;
    tracing::info!(
        steps = vocabulary.len(),
        attempts,
        duration_ms = start.elapsed().as_millis() as u64,
        "journey steps discovered"
    );
    Ok(vocabulary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LmBackendConfig;
    use std::collections::HashSet;
    use std::time::Duration;

    fn reviews(count: usize) -> Vec<Review> {
        (0..count)
            .map(|index| Review {
                date_of_experience: "2024-01-05".to_string(),
                title: format!("title {index}"),
                description: format!("description {index}"),
                rating_score: 3,
                extra: Default::default(),
            })
            .collect()
    }

    #[test]
    fn sample_is_capped_and_without_replacement() {
        let input = reviews(8);

        let sample = draw_sample(&input, 5, None);
        let distinct: HashSet<_> = sample.iter().map(|entry| &entry.description).collect();
        assert_eq!(sample.len(), 5);
        assert_eq!(distinct.len(), 5);

        assert_eq!(draw_sample(&input, 50, None).len(), 8);
    }

    #[test]
    fn seeded_samples_repeat() {
        let input = reviews(40);
        assert_eq!(draw_sample(&input, 10, Some(7)), draw_sample(&input, 10, Some(7)));
    }

    #[test]
    fn sample_serializes_descriptions_only() {
        let sample = draw_sample(&reviews(1), 1, Some(1));
        let value = serde_json::to_value(&sample).expect("serialize");
        assert_eq!(value, serde_json::json!([{"reviewDescription": "description 0"}]));
    }

    #[test]
    fn parses_array_and_object_answers() {
        let from_array = parse_journey_steps(r#"["Research", "Sign Up"]"#).expect("array");
        let from_object =
            parse_journey_steps("```json\n{\"journeySteps\": [\"Research\", \"Sign Up\"]}\n```")
                .expect("object");
        assert_eq!(from_array, from_object);
        assert_eq!(from_array.steps(), ["Research", "Sign Up"]);
    }

    #[test]
    fn empty_or_prose_answers_are_malformed() {
        for bad in ["[]", r#"{"journeySteps": []}"#, "Here are the steps: research."] {
            assert!(
                matches!(parse_journey_steps(bad), Err(ServiceError::Malformed(_))),
                "{bad}"
            );
        }
    }

    #[test]
    fn discovery_sends_sample_and_logs_the_call() {
        let dir = tempfile::tempdir().expect("tempdir");
        let paths = crate::workspace::WorkspacePaths::new(dir.path().to_path_buf());
        let script = r#"grep -q 'late delivery' && echo '{"journeySteps": ["Order", "Delivery"]}'"#;
        let command = format!("sh -c {}", shell_words::quote(script));
        let client = LmClient::new(&LmBackendConfig::Command { command }, 0, Duration::ZERO)
            .expect("client");
        let mut logger = LmLogger::open(&paths, false).expect("logger");

        let vocabulary = discover_journey_steps(
            &client,
            Some(&mut logger),
            "sample.json",
            r#"[{"reviewDescription": "late delivery again"}]"#,
        )
        .expect("discovered");

        assert_eq!(vocabulary.steps(), ["Order", "Delivery"]);
        let entries = crate::lm_log::load_lm_log(&paths).expect("log");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, LmInvocationKind::JourneyDiscovery);
        assert_eq!(entries[0].subject.as_deref(), Some("sample.json"));
    }
}
