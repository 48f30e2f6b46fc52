use crate::config::{load_config, PipelineConfig};
use crate::lm::LmClient;
use crate::lm_log::LmLogger;
use crate::workspace::WorkspacePaths;
use anyhow::Result;
use std::time::Duration;

/// Workspace paths plus the loaded config; built once per command.
pub(crate) struct PipelineContext {
    pub(crate) paths: WorkspacePaths,
    pub(crate) config: PipelineConfig,
}

impl PipelineContext {
    pub(crate) fn load(paths: &WorkspacePaths) -> Result<Self> {
        let config = load_config(paths)?;
        Ok(Self {
            paths: paths.clone(),
            config,
        })
    }

    /// Build the LM client; `explicit_command` wins over config and env.
    pub(crate) fn lm_client(&self, explicit_command: Option<&str>) -> Result<LmClient> {
        let backend = self.config.resolve_lm(explicit_command);
        let client = LmClient::new(
            &backend,
            self.config.max_retries,
            Duration::from_millis(self.config.retry_backoff_ms),
        )?;
        tracing::info!(backend = %client.describe(), "using LM backend");
        Ok(client)
    }

    pub(crate) fn lm_logger(&self) -> Result<LmLogger> {
        LmLogger::open(&self.paths, self.config.log_lm_content)
    }
}
