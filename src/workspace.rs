//! Typed paths into a workspace layout.
//!
//! Every pipeline stage reads the newest artifact of one kind and writes a new
//! timestamped artifact of another, so path construction and artifact
//! discovery live here instead of being rebuilt by each stage.
use crate::error::NotFound;
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Directory holding the raw review exports (never cleaned by `init`).
pub const RAW_DIR: &str = "raw-review-data";
/// Environment variable that overrides the default workspace root.
pub const DATA_DIR_ENV: &str = "JLENS_DATA_DIR";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Timestamped JSON artifacts produced and consumed by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    ProcessedReviews,
    Sample,
    JourneySteps,
    SummarizedReviews,
    RatingsByStep,
}

impl ArtifactKind {
    /// Directory (relative to the workspace root) holding this kind.
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::ProcessedReviews => "pre-processed-raw-data",
            Self::Sample => "sample_for_journey_determination",
            Self::JourneySteps => "journey-steps",
            Self::SummarizedReviews => "summarized-reviews",
            Self::RatingsByStep => "ratings-by-step",
        }
    }

    /// File name prefix preceding the timestamp.
    pub fn prefix(self) -> &'static str {
        match self {
            Self::ProcessedReviews => "processed_reviews",
            Self::Sample => "sample_for_journey_determination",
            Self::JourneySteps => "customer_journey_steps",
            Self::SummarizedReviews => "summarized_reviews",
            Self::RatingsByStep => "ratings_by_step",
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::ProcessedReviews => "processed review file",
            Self::Sample => "journey sample file",
            Self::JourneySteps => "journey steps file",
            Self::SummarizedReviews => "summarized review file",
            Self::RatingsByStep => "ratings file",
        }
    }

    /// Human-readable glob for error messages.
    pub fn glob(self) -> String {
        format!("{}_*.json", self.prefix())
    }

    /// Exact naming scheme: `<prefix>_<timestamp>[-N].json`.
    ///
    /// Group 1 captures the timestamp, group 2 the optional suffix number.
    fn pattern(self) -> Result<Regex> {
        let pattern = format!(
            r"^{}_(\d{{4}}-\d{{2}}-\d{{2}}_\d{{2}}-\d{{2}}-\d{{2}})(?:-(\d+))?\.json$",
            regex::escape(self.prefix())
        );
        Regex::new(&pattern)
            .with_context(|| format!("build artifact pattern for {}", self.prefix()))
    }
}

/// Convenience wrapper for locating workspace artifacts.
#[derive(Debug, Clone)]
pub struct WorkspacePaths {
    root: PathBuf,
}

impl WorkspacePaths {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Return the `raw-review-data/` directory path.
    pub fn raw_dir(&self) -> PathBuf {
        self.root.join(RAW_DIR)
    }

    /// Return the directory holding artifacts of `kind`.
    pub fn artifact_dir(&self, kind: ArtifactKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// Return the `config.json` path.
    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.json")
    }

    /// Return the `lm_log.jsonl` path.
    pub fn lm_log_path(&self) -> PathBuf {
        self.root.join("lm_log.jsonl")
    }

    /// Return the `lm_log/` directory path for full prompt/response storage.
    pub fn lm_log_dir(&self) -> PathBuf {
        self.root.join("lm_log")
    }

    /// Newest artifact of `kind`, failing with [`NotFound`] when there is none.
    pub fn latest_artifact(&self, kind: ArtifactKind) -> Result<PathBuf> {
        let dir = self.artifact_dir(kind);
        latest_matching(&dir, kind)?.ok_or_else(|| {
            NotFound {
                what: kind.label(),
                dir,
                pattern: kind.glob(),
            }
            .into()
        })
    }

    /// Fresh timestamped path for a new artifact of `kind`.
    ///
    /// Creates the artifact directory. A `-N` suffix is added when another
    /// artifact already claimed the same second.
    pub fn new_artifact_path(&self, kind: ArtifactKind) -> Result<PathBuf> {
        let dir = self.artifact_dir(kind);
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        let stamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let base = format!("{}_{stamp}", kind.prefix());
        let candidate = dir.join(format!("{base}.json"));
        if !candidate.exists() {
            return Ok(candidate);
        }
        for n in 1..1000 {
            let candidate = dir.join(format!("{base}-{n}.json"));
            if !candidate.exists() {
                return Ok(candidate);
            }
        }
        Err(anyhow!("too many {} artifacts named {base}", kind.prefix()))
    }
}

/// Resolve the workspace root: explicit flag, then the platform data dir.
pub fn resolve_root(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    let data_dir = dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .ok_or_else(|| anyhow!("cannot determine a data directory; pass --data-dir"))?;
    Ok(data_dir.join("journey-lens"))
}

/// Newest file in `dir` whose name matches `kind`, by creation time.
///
/// Falls back to modification time on filesystems without creation times;
/// ties are broken by [`ArtifactRank`].
fn latest_matching(dir: &Path, kind: ArtifactKind) -> Result<Option<PathBuf>> {
    if !dir.is_dir() {
        return Ok(None);
    }
    let pattern = kind.pattern()?;
    let mut newest: Option<(ArtifactRank, PathBuf)> = None;
    for entry in fs::read_dir(dir).with_context(|| format!("read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let meta = entry
            .metadata()
            .with_context(|| format!("stat {}", path.display()))?;
        let created = meta
            .created()
            .or_else(|_| meta.modified())
            .with_context(|| format!("read timestamps of {}", path.display()))?;
        let Some(rank) = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| ArtifactRank::parse(&pattern, name, created))
        else {
            continue;
        };
        let replace = match &newest {
            None => true,
            Some((best, _)) => rank > *best,
        };
        if replace {
            newest = Some((rank, path));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

/// Recency of one artifact file.
///
/// Orders by file time, then by the timestamp in the name, then by the
/// `-N` suffix, so `x-2.json` is newer than `x-1.json` and `x.json` when
/// the filesystem reports equal times.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ArtifactRank {
    created: SystemTime,
    stamp: String,
    suffix: u32,
}

impl ArtifactRank {
    fn parse(pattern: &Regex, name: &str, created: SystemTime) -> Option<Self> {
        let captures = pattern.captures(name)?;
        let stamp = captures.get(1)?.as_str().to_string();
        let suffix = match captures.get(2) {
            Some(number) => number.as_str().parse().ok()?,
            None => 0,
        };
        Some(Self {
            created,
            stamp,
            suffix,
        })
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
