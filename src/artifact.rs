//! JSON artifact I/O.
//!
//! Writes go through a temporary file in the destination directory followed by
//! a rename, so readers only ever see the previous or the new complete file.
use crate::batch::CheckpointSink;
use crate::review::ClassifiedReview;
use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Serialize `value` as pretty JSON and atomically replace `path` with it.
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    let bytes = serde_json::to_vec_pretty(value).context("serialize JSON artifact")?;

    let mut staged = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("stage temp file in {}", parent.display()))?;
    staged
        .write_all(&bytes)
        .with_context(|| format!("write staged {}", path.display()))?;
    staged
        .as_file()
        .sync_all()
        .with_context(|| format!("sync staged {}", path.display()))?;
    staged
        .persist(path)
        .with_context(|| format!("publish {}", path.display()))?;
    Ok(())
}

/// Read and parse a JSON artifact.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_slice(&bytes).with_context(|| format!("parse {}", path.display()))
}

/// Checkpoints classified reviews by rewriting one JSON artifact.
#[derive(Debug)]
pub struct JsonCheckpoint {
    path: PathBuf,
    writes: usize,
}

impl JsonCheckpoint {
    pub fn new(path: PathBuf) -> Self {
        Self { path, writes: 0 }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether at least one checkpoint reached disk.
    pub fn written(&self) -> bool {
        self.writes > 0
    }
}

impl CheckpointSink for JsonCheckpoint {
    fn commit(&mut self, reviews: &[ClassifiedReview]) -> Result<()> {
        write_json_atomic(&self.path, reviews)
            .with_context(|| format!("checkpoint {} reviews", reviews.len()))?;
        self.writes += 1;
        tracing::debug!(path = %self.path.display(), reviews = reviews.len(), "checkpoint written");
        Ok(())
    }
}
