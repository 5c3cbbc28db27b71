//! Engine configuration
//!
//! Parallelism, scheduling switches and run limits.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::GraphError;

/// Graph engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum concurrent vertex builds inside one layer
    pub parallelism: usize,

    /// Treat cycle members as satisfied roots instead of failing on a stall
    pub cycle_tolerant: bool,

    /// Order each layer by ascending average build time
    pub sort_by_build_time: bool,

    /// Number of build durations kept per vertex
    pub build_time_history: usize,

    /// Timeout for a whole `process()` call
    #[serde(with = "humantime_serde")]
    pub run_timeout: Option<Duration>,

    /// Upper bound on executed layers per run (guards re-activation loops)
    pub max_layers: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parallelism: num_cpus::get(),
            cycle_tolerant: true,
            sort_by_build_time: true,
            build_time_history: 10,
            run_timeout: None,
            max_layers: 1000,
        }
    }
}

impl EngineConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set parallelism level
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Enable or disable cycle-tolerant scheduling
    pub fn with_cycle_tolerance(mut self, enabled: bool) -> Self {
        self.cycle_tolerant = enabled;
        self
    }

    /// Enable or disable the build-time tie-break
    pub fn with_build_time_sort(mut self, enabled: bool) -> Self {
        self.sort_by_build_time = enabled;
        self
    }

    /// Set how many build durations each vertex remembers
    pub fn with_build_time_history(mut self, len: usize) -> Self {
        self.build_time_history = len;
        self
    }

    /// Set the run timeout
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = Some(timeout);
        self
    }

    /// Set the layer limit
    pub fn with_max_layers(mut self, max: usize) -> Self {
        self.max_layers = max;
        self
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), GraphError> {
        if self.parallelism == 0 {
            return Err(GraphError::config_error("parallelism must be at least 1"));
        }
        if self.max_layers == 0 {
            return Err(GraphError::config_error("max_layers must be at least 1"));
        }
        if self.run_timeout.is_some_and(|t| t.is_zero()) {
            return Err(GraphError::config_error("run_timeout must be greater than zero"));
        }
        Ok(())
    }
}
