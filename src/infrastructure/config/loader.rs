use std::path::Path;

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::errors::DomainError;
use crate::domain::models::config::Config;
use crate::services::run_plan::validate_topology;

/// Directory, relative to the project root, holding config files.
pub const CONFIG_DIR: &str = ".docval";

/// Prefix of environment overrides; nested keys are split on `__`.
pub const ENV_PREFIX: &str = "DOCVAL_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid quality weights: must each be in [0, 1] and sum to 1.0 (got {0:.4})")]
    InvalidWeights(f64),

    #[error("Invalid {name}: {value}. Must be between 0 and 1")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("discard_threshold ({discard}) must not exceed quality_threshold ({quality})")]
    ThresholdOrder { discard: f64, quality: f64 },

    #[error("Invalid max_iterations: {0}. Must be at least 1")]
    InvalidMaxIterations(u32),

    #[error("Invalid batch_concurrency: {0}. Must be at least 1")]
    InvalidBatchConcurrency(usize),

    #[error("Invalid similarity_threshold: {0}. Must be in (0, 1]")]
    InvalidSimilarityThreshold(f64),

    #[error("Deduplication needs at least one comparison field")]
    NoComparisonFields,

    #[error("Invalid {name}: must be greater than 0")]
    ZeroTimeout { name: &'static str },

    #[error(transparent)]
    Topology(#[from] DomainError),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration for the project in the current directory.
    ///
    /// Precedence (lowest to highest):
    /// 1. Serde defaults
    /// 2. .docval/config.yaml (project config)
    /// 3. .docval/local.yaml (local overrides, optional)
    /// 4. Environment variables (DOCVAL_* prefix, highest priority)
    ///
    /// Defaults are filled in by serde rather than merged as a provider so a
    /// `tiers`, `validators` or `profiles` value in a file replaces the shipped
    /// layout instead of being merged into it.
    pub fn load() -> Result<Config> {
        Self::load_from_dir(Path::new("."))
    }

    /// Load configuration for the project rooted at `root`.
    pub fn load_from_dir(root: &Path) -> Result<Config> {
        let dir = root.join(CONFIG_DIR);
        let config: Config = Figment::new()
            .merge(Yaml::file(dir.join("config.yaml")))
            .merge(Yaml::file(dir.join("local.yaml")))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Yaml::file(path.as_ref()))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let critic = &config.critic;
        if !critic.weights.is_valid() {
            return Err(ConfigError::InvalidWeights(critic.weights.sum()));
        }
        for (name, value) in [
            ("discard_threshold", critic.discard_threshold),
            ("quality_threshold", critic.quality_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        if critic.discard_threshold > critic.quality_threshold {
            return Err(ConfigError::ThresholdOrder {
                discard: critic.discard_threshold,
                quality: critic.quality_threshold,
            });
        }
        if critic.max_iterations == 0 {
            return Err(ConfigError::InvalidMaxIterations(critic.max_iterations));
        }
        if critic.batch_concurrency == 0 {
            return Err(ConfigError::InvalidBatchConcurrency(critic.batch_concurrency));
        }
        if critic.llm_timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout {
                name: "critic.llm_timeout_secs",
            });
        }

        let dedup = &config.dedup;
        if !(dedup.similarity_threshold > 0.0 && dedup.similarity_threshold <= 1.0) {
            return Err(ConfigError::InvalidSimilarityThreshold(dedup.similarity_threshold));
        }
        if dedup.fields.is_empty() {
            return Err(ConfigError::NoComparisonFields);
        }

        if config.llm.timeout_secs == 0 {
            return Err(ConfigError::ZeroTimeout {
                name: "llm.timeout_secs",
            });
        }

        validate_topology(&config.validation)?;

        Ok(())
    }
}
