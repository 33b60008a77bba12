//! Runtime configuration.
//!
//! Configuration is plain data with defaults for every field, so an empty
//! JSON object is a valid configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Settings for a [`Runtime`](crate::Runtime).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Time step handed to animation drivers on every frame, in milliseconds.
    pub frame_interval_ms: u64,

    /// Path prefix used when deploying worklets through the transport.
    pub deploy_prefix: String,

    /// Mapper runs allowed in one drain before it is abandoned as a cycle.
    pub max_batch_runs: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 16,
            deploy_prefix: "worklet".to_string(),
            max_batch_runs: 10_000,
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The configured frame interval.
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Transport path for a worklet with the given raw id.
    pub(crate) fn deploy_path(&self, raw_id: u64) -> String {
        format!("{}/{}", self.deploy_prefix, raw_id)
    }
}
