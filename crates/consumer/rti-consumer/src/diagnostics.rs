use std::collections::HashMap;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use rti_core::MotionBlurNegotiation;

/// What the last collection did and how long each phase took.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Diagnostics {
    pub sources: usize,
    pub targets: usize,
    /// Collections that fell back to the aggregate mesh, over the consumer's life.
    pub fallbacks: u64,
    /// Sources whose velocity map channel was set but unusable.
    pub rejected_velocity_maps: usize,
    /// Bound channels the provider did not publish.
    pub missing_channels: Vec<String>,
    pub response: Option<MotionBlurNegotiation>,
    pub timings_ms: HashMap<String, f32>,
}

impl Diagnostics {
    /// Clear per-collection fields, keeping lifetime counters.
    pub(crate) fn begin(&mut self) {
        self.sources = 0;
        self.targets = 0;
        self.rejected_velocity_maps = 0;
        self.missing_channels.clear();
        self.response = None;
        self.timings_ms.clear();
    }

    pub(crate) fn record(&mut self, phase: &str, since: Instant) {
        self.timings_ms
            .insert(format!("{phase}_ms"), since.elapsed().as_secs_f32() * 1000.0);
    }

    pub(crate) fn log_summary(&self) {
        log::debug!(
            "instancing: {} sources, {} targets, {} fallbacks, response {:?}, timings {:?}",
            self.sources,
            self.targets,
            self.fallbacks,
            self.response,
            self.timings_ms
        );
        if !self.missing_channels.is_empty() {
            log::debug!("unpublished channels: {}", self.missing_channels.join(", "));
        }
    }
}
