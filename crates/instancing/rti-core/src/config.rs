//! Provider configuration.

use serde::{Deserialize, Serialize};

use crate::error::{InstancingError, InstancingResult};

/// Sizing hints and negotiation limits for an [`Instancer`](crate::Instancer).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstancingConfig {
    /// Initial capacity hints for per-thread reader buffers.
    pub scratch_samples: usize,
    pub scratch_custom_values: usize,

    /// Initial capacity hints for the pool's source/target storage.
    pub reserve_sources: usize,
    pub reserve_targets: usize,

    /// Upper bound on transform samples per target, whatever the generator
    /// claims to support. Must be at least 2.
    pub max_transform_samples: usize,

    /// Lowercase the caller identity before handing it to the generator.
    pub lowercase_caller: bool,
}

impl Default for InstancingConfig {
    fn default() -> Self {
        Self {
            scratch_samples: 16,
            scratch_custom_values: 16,
            reserve_sources: 8,
            reserve_targets: 1024,
            max_transform_samples: 16,
            lowercase_caller: true,
        }
    }
}

impl InstancingConfig {
    pub fn from_json(text: &str) -> InstancingResult<Self> {
        let cfg: InstancingConfig = serde_json::from_str(text)
            .map_err(|e| InstancingError::InvalidConfig(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> InstancingResult<()> {
        if self.max_transform_samples < 2 {
            return Err(InstancingError::InvalidConfig(format!(
                "max_transform_samples must be >= 2, got {}",
                self.max_transform_samples
            )));
        }
        Ok(())
    }
}
