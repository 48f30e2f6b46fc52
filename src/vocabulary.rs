//! The ordered journey-step vocabulary.
//!
//! Order is authoritative: it fixes the key order of every rating
//! distribution built from this vocabulary.
use crate::artifact::read_json;
use crate::workspace::{ArtifactKind, WorkspacePaths};
use anyhow::{anyhow, Context, Result};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::path::Path;

/// Key under which journey-step artifacts nest the step list.
pub const JOURNEY_STEPS_KEY: &str = "journeySteps";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JourneyVocabulary {
    steps: Vec<String>,
}

impl JourneyVocabulary {
    pub fn new(steps: Vec<String>) -> Self {
        Self { steps }
    }

    /// Extract the step list from a journey-steps document.
    ///
    /// Accepts a bare array of strings, an object with a `journeySteps`
    /// array, or an object holding exactly one array of strings.
    pub fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Array(_) => string_array(value).map(Self::new),
            Value::Object(map) => {
                if let Some(nested) = map.get(JOURNEY_STEPS_KEY) {
                    return string_array(nested)
                        .map(Self::new)
                        .with_context(|| format!("read {JOURNEY_STEPS_KEY}"));
                }
                let mut arrays = map.values().filter_map(|value| string_array(value).ok());
                match (arrays.next(), arrays.next()) {
                    (Some(steps), None) => Ok(Self::new(steps)),
                    (None, _) => Err(anyhow!(
                        "journey steps object has no {JOURNEY_STEPS_KEY} array"
                    )),
                    (Some(_), Some(_)) => Err(anyhow!(
                        "journey steps object has several arrays and no {JOURNEY_STEPS_KEY} key"
                    )),
                }
            }
            other => Err(anyhow!(
                "journey steps must be an array or object, got {}",
                json_type(other)
            )),
        }
    }

    /// Load a vocabulary from a journey-steps artifact.
    pub fn load(path: &Path) -> Result<Self> {
        let value: Value = read_json(path)?;
        Self::from_value(&value).with_context(|| format!("load {}", path.display()))
    }

    /// Load the vocabulary from the newest journey-steps artifact.
    pub fn load_latest(paths: &WorkspacePaths) -> Result<Self> {
        let path = paths.latest_artifact(ArtifactKind::JourneySteps)?;
        tracing::debug!(path = %path.display(), "loading journey steps");
        Self::load(&path)
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Exact, case-sensitive membership.
    pub fn contains(&self, step: &str) -> bool {
        self.steps.iter().any(|candidate| candidate == step)
    }

    /// Pretty JSON array used verbatim in prompts.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.steps).unwrap_or_else(|_| format!("{:?}", self.steps))
    }
}

impl Serialize for JourneyVocabulary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(JOURNEY_STEPS_KEY, &self.steps)?;
        map.end()
    }
}

fn string_array(value: &Value) -> Result<Vec<String>> {
    let items = value
        .as_array()
        .ok_or_else(|| anyhow!("expected an array, got {}", json_type(value)))?;
    items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            item.as_str()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("step {idx} is {}, not a string", json_type(item)))
        })
        .collect()
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_bare_and_nested_arrays_in_order() {
        let bare = JourneyVocabulary::from_value(&json!(["Search", "Order", "Delivery"]))
            .expect("bare array");
        let nested = JourneyVocabulary::from_value(&json!({
            "journeySteps": ["Search", "Order", "Delivery"]
        }))
        .expect("nested array");
        assert_eq!(bare, nested);
        assert_eq!(bare.steps(), ["Search", "Order", "Delivery"]);
    }

    #[test]
    fn accepts_single_array_under_another_key() {
        let vocabulary = JourneyVocabulary::from_value(&json!({
            "steps": ["Awareness", "Purchase"],
            "note": "generated"
        }))
        .expect("single array");
        assert_eq!(vocabulary.steps(), ["Awareness", "Purchase"]);
    }

    #[test]
    fn rejects_ambiguous_or_non_string_documents() {
        assert!(JourneyVocabulary::from_value(&json!({"a": ["x"], "b": ["y"]})).is_err());
        assert!(JourneyVocabulary::from_value(&json!(["x", 3])).is_err());
        assert!(JourneyVocabulary::from_value(&json!("x")).is_err());
    }

    #[test]
    fn membership_is_exact() {
        let vocabulary = JourneyVocabulary::new(vec![
            "Order".to_string(),
            "order".to_string(),
            "Order".to_string(),
        ]);
        assert!(vocabulary.contains("Order"));
        assert!(vocabulary.contains("order"));
        assert!(!vocabulary.contains("ORDER"));
        assert!(!vocabulary.contains("Order "));
    }

    #[test]
    fn serializes_under_journey_steps_key() {
        let vocabulary = JourneyVocabulary::new(vec!["B".to_string(), "A".to_string()]);
        let text = serde_json::to_string(&vocabulary).expect("serialize");
        assert_eq!(text, r#"{"journeySteps":["B","A"]}"#);
    }
}
