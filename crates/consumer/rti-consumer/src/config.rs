use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use rti_api_core::ChannelKind;

/// A custom channel the renderer wants per instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRequest {
    pub name: String,
    pub kind: ChannelKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Identity passed to providers.
    pub caller: String,
    /// Worker threads used to expand sources; 1 reads on the calling thread.
    pub workers: usize,
    /// Transform samples per instance when the provider answers with velocity.
    pub velocity_samples: usize,
    /// Read per-vertex velocities from each source's velocity map channel.
    pub vertex_velocities: bool,
    /// Channels to bind; empty binds every published channel.
    pub channels: Vec<ChannelRequest>,
    /// Source kinds to request (`DataFlags` bits); 0 means all.
    pub data_filter: u32,
    /// Emit a diagnostics summary through `log` after each collection.
    pub log_diagnostics: bool,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            caller: "rti-consumer".to_string(),
            workers: 1,
            velocity_samples: 2,
            vertex_velocities: true,
            channels: Vec::new(),
            data_filter: 0,
            log_diagnostics: true,
        }
    }
}

impl ConsumerConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let cfg: ConsumerConfig = serde_json::from_str(text).context("consumer config JSON")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.workers >= 1, "workers must be >= 1");
        ensure!(self.velocity_samples >= 1, "velocity_samples must be >= 1");
        Ok(())
    }
}
