//! Configuration management for the watch emulator.
//!
//! Hierarchical loading with:
//! - Default values as code base
//! - Configuration file support
//! - Environment variable overrides
//! - Section-wise validation
mod monitoring;
mod watch;
pub use monitoring::*;
pub use watch::*;


use std::env;
use std::fmt::Debug;

use config::Config;
use config::Environment;
use config::File;
use serde::Deserialize;
use serde::Serialize;

use crate::Result;

/// Environment variable prefix, e.g. `EMULATOR__WATCH__WATCHER_BUFFER_SIZE=64`
pub(crate) const ENV_PREFIX: &str = "EMULATOR";

/// Root configuration of one emulator instance
///
/// Sources are merged in the following order (later sources override earlier):
/// 1. Type defaults
/// 2. Configuration file named by `CONFIG_PATH`
/// 3. Environment variables with the `EMULATOR__` prefix
#[derive(Serialize, Deserialize, Clone, Default)]
pub struct EmulatorConfig {
    /// Watcher queues and timeout supervision
    #[serde(default)]
    pub watch: WatchConfig,
    /// Per-instance metrics
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

impl Debug for EmulatorConfig {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("EmulatorConfig")
            .field("watch", &self.watch)
            .field("monitoring", &self.monitoring)
            .finish()
    }
}

impl EmulatorConfig {
    /// Loads configuration from hierarchical sources without validation.
    ///
    /// Callers MUST call `validate()` once all overrides are applied.
    ///
    /// ```ignore
    /// std::env::set_var("EMULATOR__WATCH__WATCHER_BUFFER_SIZE", "64");
    /// let cfg = EmulatorConfig::new()?.validate()?;
    /// ```
    pub fn new() -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        if let Ok(config_path) = env::var("CONFIG_PATH") {
            builder = builder.add_source(File::with_name(&config_path).required(true));
        }

        builder = builder.add_source(env_source());

        let config: Self = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Applies additional overrides from a file without validation.
    ///
    /// Merging order:
    /// 1. Current configuration values
    /// 2. New configuration file
    /// 3. Latest environment variables
    pub fn with_override_config(
        &self,
        path: &str,
    ) -> Result<Self> {
        let config: Self = Config::builder()
            .add_source(Config::try_from(self)?)
            .add_source(File::with_name(path))
            .add_source(env_source())
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    /// Validates every section and returns the validated instance.
    pub fn validate(self) -> Result<Self> {
        self.watch.validate()?;
        self.monitoring.validate()?;
        Ok(self)
    }
}

fn env_source() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .ignore_empty(true)
        .try_parsing(true)
}
