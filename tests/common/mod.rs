//! Shared test infrastructure for integration tests.
//!
//! Each test gets its own workspace in a temp dir and drives the built
//! `jlens` binary against the mock LM script in `tests/mock-lm.sh`.

use serde_json::{json, Value};
use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into()))
}

/// LM command line that runs the mock script.
pub fn mock_lm_command() -> String {
    let script = manifest_dir().join("tests/mock-lm.sh");
    format!(
        "sh {}",
        shell_words::quote(&script.display().to_string())
    )
}

/// One raw review as it appears in an export.
pub struct RawReview {
    pub date: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub rating: u8,
}

/// A throwaway workspace.
pub struct Workspace {
    _temp_dir: TempDir,
    pub root: PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let root = temp_dir.path().join("data");
        Self {
            _temp_dir: temp_dir,
            root,
        }
    }

    /// Run `jlens` against this workspace.
    pub fn jlens(&self, args: &[&str]) -> Output {
        Command::new(env!("CARGO_BIN_EXE_jlens"))
            .arg("--data-dir")
            .arg(&self.root)
            .args(args)
            .env("JLENS_LOG", "warn")
            .env_remove("JLENS_LM_COMMAND")
            .env_remove("JLENS_DATA_DIR")
            .output()
            .expect("run jlens")
    }

    /// Run `jlens` and fail the test when it exits non-zero.
    pub fn jlens_ok(&self, args: &[&str]) -> String {
        let output = self.jlens(args);
        assert!(
            output.status.success(),
            "jlens {:?} failed:\nstdout:\n{}\nstderr:\n{}",
            args,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        );
        String::from_utf8_lossy(&output.stdout).into_owned()
    }

    /// Initialize the workspace and switch off retries so failures are fast.
    pub fn init(&self, batch_size: usize, max_batches: Option<usize>) {
        self.jlens_ok(&["init"]);
        let config = json!({
            "schema_version": 1,
            "batch_size": batch_size,
            "max_batches": max_batches,
            "sample_size": 50,
            "max_retries": 0,
            "retry_backoff_ms": 0
        });
        std::fs::write(
            self.root.join("config.json"),
            serde_json::to_string_pretty(&config).expect("serialize config"),
        )
        .expect("write config");
    }

    pub fn write_raw_export(&self, reviews: &[RawReview]) {
        let records: Vec<Value> = reviews
            .iter()
            .map(|review| {
                json!({
                    "reviewDateOfExperience": review.date,
                    "reviewTitle": review.title,
                    "reviewDescription": review.description,
                    "reviewRatingScore": review.rating,
                    "reviewUrl": "https://reviews.invalid/r"
                })
            })
            .collect();
        let dir = self.root.join("raw-review-data");
        std::fs::create_dir_all(&dir).expect("create raw dir");
        std::fs::write(
            dir.join("export.json"),
            serde_json::to_string_pretty(&records).expect("serialize export"),
        )
        .expect("write export");
    }

    /// The only artifact in `dir`, parsed.
    pub fn single_artifact(&self, dir: &str) -> Value {
        let files = artifact_files(&self.root.join(dir));
        assert_eq!(files.len(), 1, "expected one artifact in {dir}: {files:?}");
        read_json(&files[0])
    }

    pub fn artifact_count(&self, dir: &str) -> usize {
        artifact_files(&self.root.join(dir)).len()
    }
}

fn artifact_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();
    files
}

pub fn read_json(path: &Path) -> Value {
    let text = std::fs::read_to_string(path).expect("read artifact");
    serde_json::from_str(&text).expect("parse artifact")
}

/// Five reviews; the third one makes the mock LM fail.
pub fn sample_export() -> Vec<RawReview> {
    vec![
        RawReview {
            date: "January 5, 2024",
            title: "Easy to find",
            description: "Found you through a search ad.",
            rating: 4,
        },
        RawReview {
            date: "January 9, 2024",
            title: "Smooth checkout",
            description: "I bought the premium plan in two minutes.",
            rating: 5,
        },
        RawReview {
            date: "February 1, 2024",
            title: "Broken",
            description: "FAILME this one cannot be classified.",
            rating: 1,
        },
        RawReview {
            date: "February 3, 2024",
            title: "Late parcel",
            description: "The courier did deliver, a week late.",
            rating: 2,
        },
        RawReview {
            date: "sometime in March",
            title: "Helpful agent",
            description: "Asked for a refund and got it the same day.",
            rating: 3,
        },
    ]
}
