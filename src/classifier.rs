//! Review classification against the journey vocabulary.
//!
//! The batch runner only sees [`ReviewClassifier`]; the LM-backed
//! implementation builds the prompt, calls the service, and parses the
//! `{reviewSummary, journeyStep}` answer. Whether `journeyStep` is actually a
//! vocabulary entry is not checked here; aggregation decides what to do with
//! labels it does not know.
use crate::error::ServiceError;
use crate::lm::{extract_json, fill_template, join_prompt, preview, LmClient, LmInvocationResult};
use crate::lm_log::{LmInvocationKind, LmLogger};
use crate::review::Classification;
use crate::vocabulary::JourneyVocabulary;
use std::time::Instant;

const SYSTEM_PROMPT: &str = "You are a review analysis expert.";
const CLASSIFY_REVIEW: &str = include_str!(concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/prompts/classify_review.md"
));

/// Produces one summary and journey step per review description.
pub trait ReviewClassifier {
    /// Classify the review at `review_index` (position in the full input).
    fn classify(
        &mut self,
        vocabulary: &JourneyVocabulary,
        review_index: usize,
        description: &str,
    ) -> Result<Classification, ServiceError>;
}

/// Classifier backed by the configured LM service.
pub struct LmReviewClassifier<'a> {
    client: &'a LmClient,
    logger: Option<&'a mut LmLogger>,
}

/// A classification that failed on every attempt.
struct FailedInvocation {
    attempts: u32,
    last_response: Option<String>,
    error: ServiceError,
}

impl<'a> LmReviewClassifier<'a> {
    pub fn new(client: &'a LmClient, logger: Option<&'a mut LmLogger>) -> Self {
        Self { client, logger }
    }

    fn invoke(
        &self,
        vocabulary: &JourneyVocabulary,
        description: &str,
    ) -> (String, Result<LmInvocationResult<Classification>, FailedInvocation>) {
        let user = build_classify_prompt(vocabulary, description);
        let start = Instant::now();
        let mut attempts_made = 0;
        let mut last_response = None;
        let outcome = self.client.with_retries(|_| {
            attempts_made += 1;
            let response = self.client.complete(SYSTEM_PROMPT, &user)?;
            let parsed = parse_classification(&response);
            last_response = Some(response);
            parsed
        });
        let prompt = join_prompt(SYSTEM_PROMPT, &user);
        let result = match outcome {
            Ok((result, attempts)) => Ok(LmInvocationResult {
                result,
                raw_response: last_response.unwrap_or_default(),
                attempts,
                duration: start.elapsed(),
            }),
            Err(error) => Err(FailedInvocation {
                attempts: attempts_made,
                last_response,
                error,
            }),
        };
        (prompt, result)
    }
}

impl ReviewClassifier for LmReviewClassifier<'_> {
    fn classify(
        &mut self,
        vocabulary: &JourneyVocabulary,
        review_index: usize,
        description: &str,
    ) -> Result<Classification, ServiceError> {
        let builder = self
            .logger
            .as_deref_mut()
            .map(|logger| logger.begin(LmInvocationKind::Classification));
        let (prompt, result) = self.invoke(vocabulary, description);

        if let (Some(builder), Some(logger)) = (builder, self.logger.as_deref()) {
            let builder = builder
                .with_subject(format!("review {review_index}"))
                .with_prompt_preview(&prompt);
            match &result {
                Ok(invocation) => {
                    let entry = builder.success(
                        invocation.attempts,
                        format!("journeyStep: {}", invocation.result.journey_step),
                    );
                    logger.record(&entry, &prompt, Some(&invocation.raw_response));
                }
                Err(failure) => {
                    let entry = builder.failed(failure.attempts, failure.error.to_string());
                    logger.record(&entry, &prompt, failure.last_response.as_deref());
                }
            }
        }

        match result {
            Ok(invocation) => {
                tracing::debug!(
                    review = review_index,
                    attempts = invocation.attempts,
                    duration_ms = invocation.duration.as_millis() as u64,
                    journey_step = %invocation.result.journey_step,
                    in_vocabulary = vocabulary.contains(&invocation.result.journey_step),
                    "review classified"
                );
                Ok(invocation.result)
            }
            Err(failure) => Err(failure.error),
        }
    }
}

/// Build the user prompt: full vocabulary verbatim, then the review text.
pub fn build_classify_prompt(vocabulary: &JourneyVocabulary, description: &str) -> String {
    fill_template(
        CLASSIFY_REVIEW,
        &[
            ("journey_steps", &vocabulary.to_prompt_json()),
            ("review", description),
        ],
    )
}

/// Parse the service answer into a [`Classification`].
///
/// Exactly the keys `reviewSummary` and `journeyStep` are accepted.
pub fn parse_classification(text: &str) -> Result<Classification, ServiceError> {
    let json_text = extract_json(text);
    serde_json::from_str(json_text).map_err(|err| {
        ServiceError::Malformed(format!(
            "{err}; response starts with: {}",
            preview(text.trim(), 200)
        ))
    })
}
