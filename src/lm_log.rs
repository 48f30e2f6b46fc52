//! LM invocation logging.
//!
//! Every LM call made by `discover` and `classify` is appended to
//! `lm_log.jsonl` as newline-delimited JSON:
//!
//! ```jsonl
//! {"schema_version":1,"ts":1707900000000,"cycle":1,"kind":"journey_discovery",...}
//! {"schema_version":1,"ts":1707900060000,"cycle":2,"kind":"classification",...}
//! ```
//!
//! When `log_lm_content` is enabled, full prompts and responses are stored in
//! `lm_log/cycle_NNNNN_<kind>_prompt.txt` and `..._response.txt`.

use crate::lm::preview;
use crate::workspace::WorkspacePaths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::time::{Duration, Instant};

/// Current schema version for lm_log.jsonl entries.
pub const LM_LOG_SCHEMA_VERSION: u32 = 1;

const PROMPT_PREVIEW_BYTES: usize = 500;

/// Kinds of LM invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmInvocationKind {
    /// Journey-step discovery from a review sample.
    JourneyDiscovery,
    /// Summary and journey step for one review.
    Classification,
}

impl std::fmt::Display for LmInvocationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::JourneyDiscovery => write!(f, "journey_discovery"),
            Self::Classification => write!(f, "classification"),
        }
    }
}

/// Outcome of an LM invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LmOutcome {
    Success,
    Failed,
}

/// A single LM invocation log entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LmLogEntry {
    pub schema_version: u32,

    /// Unix timestamp in milliseconds when the entry was written.
    pub ts: u64,

    /// Invocation number within this workspace (1-indexed).
    pub cycle: u32,

    pub kind: LmInvocationKind,

    /// Duration of the call in milliseconds, retries included.
    pub duration_ms: u64,

    /// Attempts used (1 when the first attempt settled it).
    pub attempts: u32,

    /// What the call was about (review index, sample file name).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    pub outcome: LmOutcome,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Prompt preview (first ~500 bytes) for quick inspection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_preview: Option<String>,
}

/// Builder for constructing LM log entries with timing.
pub struct LmLogBuilder {
    start: Instant,
    cycle: u32,
    kind: LmInvocationKind,
    subject: Option<String>,
    prompt_preview: Option<String>,
}

impl LmLogBuilder {
    pub fn new(cycle: u32, kind: LmInvocationKind) -> Self {
        Self {
            start: Instant::now(),
            cycle,
            kind,
            subject: None,
            prompt_preview: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_prompt_preview(mut self, prompt: &str) -> Self {
        self.prompt_preview = Some(preview(prompt, PROMPT_PREVIEW_BYTES));
        self
    }

    pub fn success(self, attempts: u32, summary: impl Into<String>) -> LmLogEntry {
        self.build(LmOutcome::Success, attempts, Some(summary.into()), None)
    }

    pub fn failed(self, attempts: u32, error: impl Into<String>) -> LmLogEntry {
        self.build(LmOutcome::Failed, attempts, None, Some(error.into()))
    }

    fn build(
        self,
        outcome: LmOutcome,
        attempts: u32,
        summary: Option<String>,
        error: Option<String>,
    ) -> LmLogEntry {
        LmLogEntry {
            schema_version: LM_LOG_SCHEMA_VERSION,
            ts: now_epoch_ms(),
            cycle: self.cycle,
            kind: self.kind,
            duration_ms: self.start.elapsed().as_millis() as u64,
            attempts,
            subject: self.subject,
            outcome,
            summary,
            error,
            prompt_preview: self.prompt_preview,
        }
    }
}

/// Appends entries for one run, numbering cycles after the existing log.
pub struct LmLogger {
    paths: WorkspacePaths,
    store_content: bool,
    next_cycle: u32,
}

impl LmLogger {
    pub fn open(paths: &WorkspacePaths, store_content: bool) -> Result<Self> {
        Ok(Self {
            paths: paths.clone(),
            store_content,
            next_cycle: next_cycle_number(paths)?,
        })
    }

    /// Reserve the cycle number for the next invocation.
    pub fn begin(&mut self, kind: LmInvocationKind) -> LmLogBuilder {
        let cycle = self.next_cycle;
        self.next_cycle += 1;
        LmLogBuilder::new(cycle, kind)
    }

    /// Record a finished invocation. Logging problems never fail the caller.
    pub fn record(&self, entry: &LmLogEntry, prompt: &str, response: Option<&str>) {
        if let Err(err) = append_lm_log(&self.paths, entry) {
            tracing::warn!(error = %err, "failed to append lm_log entry");
        }
        if self.store_content {
            if let Err(err) = store_lm_content(
                &self.paths,
                entry.cycle,
                entry.kind,
                prompt,
                response.unwrap_or(""),
            ) {
                tracing::warn!(error = %err, "failed to store lm_log content");
            }
        }
    }
}

/// Append an LM log entry to the log file.
pub fn append_lm_log(paths: &WorkspacePaths, entry: &LmLogEntry) -> Result<()> {
    let log_path = paths.lm_log_path();
    if let Some(parent) = log_path.parent() {
        fs::create_dir_all(parent).context("create workspace directory for lm_log")?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("open lm_log for append: {}", log_path.display()))?;

    let line = serde_json::to_string(entry).context("serialize lm_log entry")?;
    writeln!(file, "{}", line).context("write lm_log entry")?;

    Ok(())
}

/// Store full prompt/response content for a cycle.
pub fn store_lm_content(
    paths: &WorkspacePaths,
    cycle: u32,
    kind: LmInvocationKind,
    prompt: &str,
    response: &str,
) -> Result<()> {
    let log_dir = paths.lm_log_dir();
    fs::create_dir_all(&log_dir).context("create lm_log directory")?;

    let prompt_path = log_dir.join(format!("cycle_{:05}_{}_prompt.txt", cycle, kind));
    let response_path = log_dir.join(format!("cycle_{:05}_{}_response.txt", cycle, kind));

    fs::write(&prompt_path, prompt)
        .with_context(|| format!("write prompt: {}", prompt_path.display()))?;
    fs::write(&response_path, response)
        .with_context(|| format!("write response: {}", response_path.display()))?;

    Ok(())
}

/// Load all LM log entries from the log file.
pub fn load_lm_log(paths: &WorkspacePaths) -> Result<Vec<LmLogEntry>> {
    let log_path = paths.lm_log_path();

    if !log_path.exists() {
        return Ok(Vec::new());
    }

    let file =
        File::open(&log_path).with_context(|| format!("open lm_log: {}", log_path.display()))?;

    let reader = BufReader::new(file);
    let mut entries = Vec::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("read line {} of lm_log", line_num + 1))?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<LmLogEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                tracing::warn!(line = line_num + 1, error = %e, "skip corrupt lm_log entry");
            }
        }
    }

    Ok(entries)
}

/// Get the next cycle number based on existing log entries.
pub fn next_cycle_number(paths: &WorkspacePaths) -> Result<u32> {
    let entries = load_lm_log(paths)?;
    let max_cycle = entries.iter().map(|e| e.cycle).max().unwrap_or(0);
    Ok(max_cycle + 1)
}

fn now_epoch_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}
