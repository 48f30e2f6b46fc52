//! Workspace configuration.
//!
//! `config.json` at the workspace root holds the batch settings and the LM
//! backend. A missing file means defaults; a present file must validate.
use crate::batch::{BatchSettings, FailedBatchPolicy};
use crate::workspace::WorkspacePaths;
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

/// Current schema version for `config.json`.
pub const CONFIG_SCHEMA_VERSION: u32 = 1;
/// Environment variable naming a local LM command (used when config has no `lm`).
pub const LM_COMMAND_ENV: &str = "JLENS_LM_COMMAND";

const DEFAULT_BATCH_SIZE: usize = 5;
const DEFAULT_MAX_BATCHES: usize = 15;
const DEFAULT_SAMPLE_SIZE: usize = 50;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_BACKOFF_MS: u64 = 1000;
const DEFAULT_HTTP_ENDPOINT: &str = "https://api.openai.com/v1";
const DEFAULT_HTTP_MODEL: &str = "gpt-4-turbo-preview";
const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    pub schema_version: u32,
    /// Reviews per batch; the failure-isolation unit.
    pub batch_size: usize,
    /// Cap on batches attempted per classify run; `null` for no cap.
    pub max_batches: Option<usize>,
    #[serde(default)]
    pub failed_batch_policy: FailedBatchPolicy,
    /// Reviews drawn for journey discovery.
    pub sample_size: usize,
    /// Extra attempts per LM request after the first one fails.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// LM backend; falls back to `JLENS_LM_COMMAND`, then the default HTTP backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lm: Option<LmBackendConfig>,
    /// Store full prompts and responses under `lm_log/`.
    #[serde(default)]
    pub log_lm_content: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LmBackendConfig {
    /// A local command reading the prompt on stdin (parsed with shell-words).
    Command { command: String },
    /// An OpenAI-compatible chat-completions endpoint.
    Http {
        endpoint: String,
        model: String,
        api_key_env: String,
        #[serde(default = "default_timeout_secs")]
        timeout_secs: u64,
    },
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl PipelineConfig {
    pub fn batch_settings(&self) -> BatchSettings {
        BatchSettings {
            batch_size: self.batch_size,
            max_batches: self.max_batches,
            failed_batch_policy: self.failed_batch_policy,
        }
    }

    /// Resolve the LM backend: explicit command > config > env > default.
    pub fn resolve_lm(&self, explicit_command: Option<&str>) -> LmBackendConfig {
        if let Some(command) = explicit_command {
            return LmBackendConfig::Command {
                command: command.to_string(),
            };
        }
        if let Some(lm) = &self.lm {
            return lm.clone();
        }
        if let Ok(command) = std::env::var(LM_COMMAND_ENV) {
            if !command.trim().is_empty() {
                return LmBackendConfig::Command { command };
            }
        }
        default_http_backend()
    }
}

/// Build the default config written by `init`.
pub fn default_config() -> PipelineConfig {
    PipelineConfig {
        schema_version: CONFIG_SCHEMA_VERSION,
        batch_size: DEFAULT_BATCH_SIZE,
        max_batches: Some(DEFAULT_MAX_BATCHES),
        failed_batch_policy: FailedBatchPolicy::default(),
        sample_size: DEFAULT_SAMPLE_SIZE,
        max_retries: DEFAULT_MAX_RETRIES,
        retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
        lm: None,
        log_lm_content: false,
    }
}

fn default_http_backend() -> LmBackendConfig {
    LmBackendConfig::Http {
        endpoint: DEFAULT_HTTP_ENDPOINT.to_string(),
        model: DEFAULT_HTTP_MODEL.to_string(),
        api_key_env: DEFAULT_API_KEY_ENV.to_string(),
        timeout_secs: DEFAULT_TIMEOUT_SECS,
    }
}

/// Load `config.json`, or defaults when the workspace has none.
pub fn load_config(paths: &WorkspacePaths) -> Result<PipelineConfig> {
    let path = paths.config_path();
    if !path.is_file() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(default_config());
    }
    let bytes = fs::read(&path).with_context(|| format!("read config {}", path.display()))?;
    let config: PipelineConfig =
        serde_json::from_slice(&bytes).context("parse workspace config JSON")?;
    validate_config(&config)?;
    Ok(config)
}

/// Persist a config to disk in a stable JSON format.
pub fn write_config(paths: &WorkspacePaths, config: &PipelineConfig) -> Result<()> {
    let path = paths.config_path();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).context("create workspace dir")?;
    }
    let text = serde_json::to_string_pretty(config).context("serialize workspace config")?;
    fs::write(&path, text.as_bytes()).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Validate schema version and value ranges.
pub fn validate_config(config: &PipelineConfig) -> Result<()> {
    if config.schema_version != CONFIG_SCHEMA_VERSION {
        return Err(anyhow!(
            "unsupported config schema_version {}",
            config.schema_version
        ));
    }
    config.batch_settings().validate()?;
    if config.sample_size == 0 {
        return Err(anyhow!("sample_size must be at least 1"));
    }
    match &config.lm {
        Some(LmBackendConfig::Command { command }) if command.trim().is_empty() => {
            return Err(anyhow!("lm.command must be non-empty"));
        }
        Some(LmBackendConfig::Http {
            endpoint,
            model,
            api_key_env,
            ..
        }) => {
            for (label, value) in [
                ("lm.endpoint", endpoint),
                ("lm.model", model),
                ("lm.api_key_env", api_key_env),
            ] {
                if value.trim().is_empty() {
                    return Err(anyhow!("{label} must be non-empty"));
                }
            }
        }
        _ => {}
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
