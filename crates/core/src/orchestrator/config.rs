//! Orchestrator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for the job orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Seconds a progress listener may stay silent before a `ping` is sent.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,

    /// How long a finished job waits for a listener before it is reaped.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// How often the reaper loop runs (seconds).
    #[serde(default = "default_reap_interval")]
    pub reap_interval_secs: u64,

    /// Filename prefix of in-flight files in the downloads directory.
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,
}

fn default_heartbeat() -> u64 {
    60
}

fn default_idle_timeout() -> u64 {
    600 // 10 minutes
}

fn default_reap_interval() -> u64 {
    30
}

fn default_temp_prefix() -> String {
    "tmp_".to_string()
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            heartbeat_secs: default_heartbeat(),
            idle_timeout_secs: default_idle_timeout(),
            reap_interval_secs: default_reap_interval(),
            temp_prefix: default_temp_prefix(),
        }
    }
}

impl OrchestratorConfig {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs.max(1))
    }
}
