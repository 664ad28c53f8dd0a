//! Application configuration

use crate::config::ConfigLoader;
use std::path::PathBuf;

/// Settings taken from the command line
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    /// Verbosity level for logging
    pub verbose: u8,
    /// Optional TOML file with job settings
    pub job_config: Option<PathBuf>,
}

impl AppConfig {
    pub fn new(verbose: u8) -> Self {
        Self {
            verbose,
            job_config: None,
        }
    }

    pub fn with_job_config(mut self, path: Option<PathBuf>) -> Self {
        self.job_config = path;
        self
    }

    /// Get the log level string based on verbosity
    pub fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Loader for the job configuration described by these settings
    pub fn job_loader(&self) -> ConfigLoader {
        match &self.job_config {
            Some(path) => ConfigLoader::new().with_file(path),
            None => ConfigLoader::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_follows_verbosity() {
        assert_eq!(AppConfig::new(0).log_level(), "info");
        assert_eq!(AppConfig::new(1).log_level(), "debug");
        assert_eq!(AppConfig::new(4).log_level(), "trace");
    }
}
