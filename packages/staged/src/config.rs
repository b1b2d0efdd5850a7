//! Configuration, loaded once at startup.
//!
//! ```toml
//! [universe]
//! buffer_capacity = 128
//!
//! [schedule]
//! parallel = true
//! num_threads = 4
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Settings for a `Universe`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UniverseConfig {
    /// Initial capacity, in commands, of freshly allocated command buffers.
    pub buffer_capacity: usize,
    /// The maximum number of idle command buffers kept for reuse.
    pub max_pooled_buffers: usize,
}

impl Default for UniverseConfig {
    fn default() -> Self {
        UniverseConfig {
            buffer_capacity: 64,
            max_pooled_buffers: 64,
        }
    }
}

/// Settings for a `Schedule`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Run the deferred systems of a stage in parallel.
    pub parallel: bool,
    /// Size of a dedicated thread pool. `None` uses the global rayon pool.
    pub num_threads: Option<usize>,
    /// Treat every pair of deferred systems as conflicting, so each one gets
    /// a stage (and a flush) of its own.
    pub serialize_deferred: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        ScheduleConfig {
            parallel: true,
            num_threads: None,
            serialize_deferred: false,
        }
    }
}

/// The full configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub universe: UniverseConfig,
    pub schedule: ScheduleConfig,
}

impl Config {
    /// Parse and validate a TOML configuration.
    pub fn from_toml_str(source: &str) -> Result<Config, ConfigError> {
        let config: Config = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.schedule.num_threads == Some(0) {
            return Err(ConfigError::Invalid("schedule.num_threads must be at least 1".into()));
        }

        Ok(())
    }
}
