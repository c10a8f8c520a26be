use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::defaults::FallbackConfig;
use crate::orchestrator::MAX_CONCURRENCY;
use crate::submitter::DEFAULT_SUBMIT_TIMEOUT;
use crate::validation::ValidationPolicy;

pub const DEFAULT_API_KEY_ENV: &str = "DEVIMPORT_API_KEY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("registry.application_id must be set")]
    MissingApplicationId,
    #[error("registry.timeout_secs must be greater than zero")]
    ZeroTimeout,
    #[error("submission.concurrency must be between 1 and {max}, got {0}", max = MAX_CONCURRENCY)]
    Concurrency(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    pub base_url: String,
    pub application_id: Option<String>,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:1885".to_string(),
            application_id: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            timeout_secs: DEFAULT_SUBMIT_TIMEOUT.as_secs(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubmissionSettings {
    pub concurrency: usize,
}

impl Default for SubmissionSettings {
    fn default() -> Self {
        Self { concurrency: 1 }
    }
}

/// Everything an import needs besides the file itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    pub registry: RegistrySettings,
    pub submission: SubmissionSettings,
    pub fallback: FallbackConfig,
    pub validation: ValidationPolicy,
}

impl ImportConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).context("failed to parse import config TOML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file at '{}'", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config TOML from '{}'", path.display()))
    }

    /// Checks values that serde cannot. The application ID is only needed
    /// when a real registry is contacted.
    pub fn validate(&self, needs_registry: bool) -> Result<(), ConfigError> {
        let application_id = self.registry.application_id.as_deref().unwrap_or("");
        if needs_registry && application_id.trim().is_empty() {
            return Err(ConfigError::MissingApplicationId);
        }
        if self.registry.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        let concurrency = self.submission.concurrency;
        if !(1..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(ConfigError::Concurrency(concurrency));
        }
        Ok(())
    }

    /// Reads the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        env::var(&self.registry.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            validation: self.validation.clone(),
            concurrency: self.submission.concurrency,
            submit_timeout: Duration::from_secs(self.registry.timeout_secs),
        }
    }
}

/// Per-run knobs handed to `ImportRun`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    pub validation: ValidationPolicy,
    pub concurrency: usize,
    pub submit_timeout: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            validation: ValidationPolicy::default(),
            concurrency: 1,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }
}
