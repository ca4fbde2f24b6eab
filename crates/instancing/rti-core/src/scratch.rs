//! Per-thread read buffers for renderer workers.
//!
//! Published data is shared and immutable; each worker owns a `FrameReader`
//! so expanding motion samples or gathering custom values never allocates
//! in steady state and never touches shared state.

use rti_api_core::{ChannelKind, ChannelValue, Matrix3};

use crate::channels::ChannelToken;
use crate::config::InstancingConfig;
use crate::motion::ShutterSpan;
use crate::sampling::{resample_transforms, sample_velocity};
use crate::target::{InstanceTarget, Motion};

#[derive(Debug, Default)]
pub struct FrameReader {
    samples: Vec<Matrix3>,
    values: Vec<ChannelValue>,
}

impl FrameReader {
    pub fn new(cfg: &InstancingConfig) -> Self {
        Self {
            samples: Vec::with_capacity(cfg.scratch_samples),
            values: Vec::with_capacity(cfg.scratch_custom_values),
        }
    }

    /// `count` transforms evenly spread over `span` for `target`, whatever
    /// representation it carries.
    pub fn motion_samples(
        &mut self,
        target: &InstanceTarget,
        span: &ShutterSpan,
        count: usize,
    ) -> &[Matrix3] {
        match target.motion() {
            Motion::Transforms(tms) => resample_transforms(tms, count, &mut self.samples),
            Motion::Velocity(v) => sample_velocity(v, span, count, &mut self.samples),
        }
        &self.samples
    }

    /// Values for `bindings` in order; missing or mismatched channels read
    /// as the zero value of the requested kind.
    pub fn custom_values(
        &mut self,
        target: &InstanceTarget,
        bindings: &[(ChannelToken, ChannelKind)],
    ) -> &[ChannelValue] {
        self.values.clear();
        self.values
            .extend(bindings.iter().map(|&(token, kind)| target.custom_value(token, kind)));
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::VelocityMotion;
    use rti_api_core::Point3;

    #[test]
    fn reuses_buffers_across_targets() {
        let mut reader = FrameReader::new(&InstancingConfig::default());
        let cap = reader.samples.capacity();
        let target = InstanceTarget {
            motion: Motion::Velocity(VelocityMotion {
                base: Matrix3::IDENTITY,
                velocity: Point3::new(0.0, 1.0, 0.0),
                spin: Point3::ORIGIN,
            }),
            ..InstanceTarget::default()
        };
        let span = ShutterSpan { open: 0.0, close: 1.0 };
        for _ in 0..4 {
            let s = reader.motion_samples(&target, &span, 2);
            assert_eq!(s.len(), 2);
            assert!((s[1].translation().y - 1.0).abs() < 1e-5);
        }
        assert_eq!(reader.samples.capacity(), cap);
    }

    #[test]
    fn unknown_channels_read_as_zero() {
        let mut reader = FrameReader::default();
        let target = InstanceTarget::default();
        let values = reader.custom_values(
            &target,
            &[(ChannelToken::NONE, ChannelKind::Float), (ChannelToken(3), ChannelKind::Color)],
        );
        assert_eq!(values[0], ChannelValue::Float(0.0));
        assert_eq!(values[1], ChannelValue::zero(ChannelKind::Color));
    }
}
