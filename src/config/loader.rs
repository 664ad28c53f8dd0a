use super::JobConfig;
use crate::error::{AccumulatorError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Builds a validated [`JobConfig`] from defaults, an optional TOML file and
/// the environment, in that order of precedence (later wins)
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    use_env: bool,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            path: None,
            use_env: true,
        }
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Ignore `ACCUMULATORS_*` environment variables
    pub fn without_env(mut self) -> Self {
        self.use_env = false;
        self
    }

    pub async fn load(&self) -> Result<JobConfig> {
        let mut config = match &self.path {
            Some(path) => Self::load_file(path).await?,
            None => JobConfig::default(),
        };

        if self.use_env {
            config.merge_env_vars()?;
        }

        config.validate()?;
        debug!("Loaded job configuration: {:?}", config);
        Ok(config)
    }

    async fn load_file(path: &Path) -> Result<JobConfig> {
        let content = fs::read_to_string(path).await.map_err(|e| {
            AccumulatorError::invalid_config(path.display().to_string(), e.to_string())
        })?;

        toml::from_str(&content).map_err(|e| {
            AccumulatorError::invalid_config(path.display().to_string(), e.to_string())
        })
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
