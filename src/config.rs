//! # Configuration Module
//!
//! Loads driver settings from the environment (and a `.env` file when one
//! exists) and turns them into an [`EngineConfig`].

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use flowgraph_engine::EngineConfig;

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Driver configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum concurrent builds per layer
    pub parallelism: usize,

    /// Whole-run timeout; `None` means no limit
    pub run_timeout: Option<Duration>,

    /// Upper bound on executed layers per run
    pub max_layers: usize,

    /// Log filter for the application
    pub log_level: String,
}

// =============================================================================
// DEFAULT IMPLEMENTATION
// =============================================================================
impl Default for Config {
    fn default() -> Self {
        let engine = EngineConfig::default();
        Self {
            parallelism: engine.parallelism,
            run_timeout: engine.run_timeout,
            max_layers: engine.max_layers,
            log_level: "info".to_string(),
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from environment variables.
    ///
    /// Recognised variables: `FLOWGRAPH_PARALLELISM`,
    /// `FLOWGRAPH_RUN_TIMEOUT_SECS`, `FLOWGRAPH_MAX_LAYERS` and `RUST_LOG`.
    pub fn from_env() -> Result<Self> {
        // A missing .env file is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup (the environment in production)
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(val) = lookup("FLOWGRAPH_PARALLELISM") {
            config.parallelism = val
                .parse()
                .context("FLOWGRAPH_PARALLELISM must be a positive integer")?;
        }

        if let Some(val) = lookup("FLOWGRAPH_RUN_TIMEOUT_SECS") {
            let secs: u64 = val
                .parse()
                .context("FLOWGRAPH_RUN_TIMEOUT_SECS must be a whole number of seconds")?;
            config.run_timeout = Some(Duration::from_secs(secs));
        }

        if let Some(val) = lookup("FLOWGRAPH_MAX_LAYERS") {
            config.max_layers = val
                .parse()
                .context("FLOWGRAPH_MAX_LAYERS must be a positive integer")?;
        }

        if let Some(val) = lookup("RUST_LOG") {
            config.log_level = val;
        }

        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            anyhow::bail!("FLOWGRAPH_PARALLELISM must be at least 1");
        }

        if self.max_layers == 0 {
            anyhow::bail!("FLOWGRAPH_MAX_LAYERS must be at least 1");
        }

        if self.run_timeout == Some(Duration::ZERO) {
            anyhow::bail!("FLOWGRAPH_RUN_TIMEOUT_SECS must be greater than zero");
        }

        Ok(())
    }

    /// Engine settings for a graph run
    pub fn engine_config(&self) -> EngineConfig {
        let mut engine = EngineConfig::default()
            .with_parallelism(self.parallelism)
            .with_max_layers(self.max_layers);
        if let Some(timeout) = self.run_timeout {
            engine = engine.with_run_timeout(timeout);
        }
        engine
    }
}
