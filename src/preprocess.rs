//! Raw review export normalization.
//!
//! Raw exports carry many more fields than the pipeline needs; only the four
//! review fields are kept, and experience dates are rewritten to ISO form.
use crate::artifact::read_json;
use crate::error::NotFound;
use crate::review::Review;
use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

/// Long-form date used by review exports ("January 5, 2024").
const EXPORT_DATE_FORMAT: &str = "%B %d, %Y";
const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Deserialize)]
struct RawReview {
    #[serde(rename = "reviewDateOfExperience")]
    date_of_experience: String,
    #[serde(rename = "reviewTitle")]
    title: String,
    #[serde(rename = "reviewDescription")]
    description: String,
    #[serde(rename = "reviewRatingScore")]
    rating_score: RawRating,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawRating {
    Number(u64),
    Text(String),
}

impl RawRating {
    fn value(&self) -> Result<u8> {
        let parsed = match self {
            Self::Number(number) => u8::try_from(*number).ok(),
            Self::Text(text) => text.trim().parse::<u8>().ok(),
        };
        parsed.ok_or_else(|| anyhow!("rating {self:?} is not a small integer"))
    }
}

/// First `*.json` file in `raw_dir`, by file name.
pub fn find_raw_export(raw_dir: &Path) -> Result<PathBuf> {
    let not_found = || NotFound {
        what: "raw review export",
        dir: raw_dir.to_path_buf(),
        pattern: "*.json".to_string(),
    };
    if !raw_dir.is_dir() {
        return Err(not_found().into());
    }
    let mut candidates = Vec::new();
    for entry in fs::read_dir(raw_dir).with_context(|| format!("read {}", raw_dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            candidates.push(path);
        }
    }
    candidates.sort();
    candidates
        .into_iter()
        .next()
        .ok_or_else(|| not_found().into())
}

/// Normalize an experience date; unparseable dates are kept as given.
pub fn normalize_experience_date(raw: &str) -> String {
    match NaiveDate::parse_from_str(raw.trim(), EXPORT_DATE_FORMAT) {
        Ok(date) => date.format(ISO_DATE_FORMAT).to_string(),
        Err(_) => {
            tracing::warn!(date = raw, "could not parse experience date; keeping it verbatim");
            raw.to_string()
        }
    }
}

/// Extract the pipeline's review fields from a raw export document.
pub fn normalize_reviews(raw: &Value) -> Result<Vec<Review>> {
    let records = raw
        .as_array()
        .ok_or_else(|| anyhow!("raw review export must be a JSON array"))?;
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let raw = RawReview::deserialize(record)
                .with_context(|| format!("raw review {index} is missing a review field"))?;
            let rating_score = raw
                .rating_score
                .value()
                .with_context(|| format!("raw review {index}"))?;
            Ok(Review {
                date_of_experience: normalize_experience_date(&raw.date_of_experience),
                title: raw.title,
                description: raw.description,
                rating_score,
                extra: Default::default(),
            })
        })
        .collect()
}

/// Read and normalize a raw export file.
pub fn load_raw_export(path: &Path) -> Result<Vec<Review>> {
    let value: Value = read_json(path)?;
    normalize_reviews(&value).with_context(|| format!("normalize {}", path.display()))
}
