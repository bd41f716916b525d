use serde::Deserialize;
use serde::Serialize;

use crate::Result;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitoringConfig {
    /// Record prometheus metrics in the instance registry
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl MonitoringConfig {
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

fn default_metrics_enabled() -> bool {
    true
}
