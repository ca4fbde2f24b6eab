//! Motion blur negotiation.
//!
//! The renderer fills a [`MotionBlurNegotiation`] with its shutter and
//! preferences and passes it to `update()`. The provider overwrites it with
//! what it will actually deliver; the renderer must read the record back and
//! never assume the request was honoured.

use serde::{Deserialize, Serialize};

use rti_api_core::{Interval, TimeValue};

/// Preferred (request) or delivered (response) per-target motion form.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformRepresentation {
    #[default]
    TransformsPreferred,
    VelocityPreferred,
}

/// Number of transform samples per target.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformCount {
    /// Any count the provider likes (request only).
    Any,
    /// No motion blur.
    #[default]
    None,
    /// One transform; motion comes from velocity/spin.
    Static,
    /// Exactly this many samples (always >= 2).
    Exactly(usize),
}

impl TransformCount {
    /// Decode the integer convention: -1 any, 0 none, 1 static, N exact.
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            i32::MIN..=-1 => TransformCount::Any,
            0 => TransformCount::None,
            1 => TransformCount::Static,
            n => TransformCount::Exactly(n as usize),
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            TransformCount::Any => -1,
            TransformCount::None => 0,
            TransformCount::Static => 1,
            TransformCount::Exactly(n) => i32::try_from(n).unwrap_or(i32::MAX),
        }
    }
}

/// Request/response record round-tripped through `update()`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionBlurNegotiation {
    /// `None` means no motion blur requested (or granted).
    pub shutter: Option<Interval>,
    pub representation: TransformRepresentation,
    pub transform_count: TransformCount,
}

impl MotionBlurNegotiation {
    /// Request without motion blur.
    pub fn none() -> Self {
        Self::default()
    }

    pub fn request(
        shutter: Interval,
        representation: TransformRepresentation,
        count: TransformCount,
    ) -> Self {
        Self {
            shutter: Some(shutter),
            representation,
            transform_count: count,
        }
    }

    /// How targets are laid out under this (response) record.
    pub fn layout(&self) -> MotionLayout {
        match (self.representation, self.transform_count) {
            (
                TransformRepresentation::VelocityPreferred,
                TransformCount::None | TransformCount::Static,
            ) => MotionLayout::Velocity,
            (_, TransformCount::Exactly(n)) if n >= 2 => MotionLayout::Samples(n),
            _ => MotionLayout::Static,
        }
    }
}

/// What every target of one cycle carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MotionLayout {
    /// One transform per target.
    Static,
    /// Exactly N evenly spaced transforms per target.
    Samples(usize),
    /// Base transform plus velocity/spin, no transform sequence.
    Velocity,
}

impl MotionLayout {
    /// Transform sequence length targets carry under this layout.
    pub fn transform_len(self) -> usize {
        match self {
            MotionLayout::Static => 1,
            MotionLayout::Samples(n) => n,
            MotionLayout::Velocity => 0,
        }
    }
}

/// What a generator can produce, independent of the request.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotionCapabilities {
    pub transforms: bool,
    pub max_transform_samples: usize,
    pub velocity: bool,
}

impl MotionCapabilities {
    pub const STATIC_ONLY: MotionCapabilities = MotionCapabilities {
        transforms: false,
        max_transform_samples: 1,
        velocity: false,
    };

    pub fn transforms(max_samples: usize) -> Self {
        Self {
            transforms: max_samples >= 2,
            max_transform_samples: max_samples,
            velocity: false,
        }
    }

    pub fn velocity_only() -> Self {
        Self {
            transforms: false,
            max_transform_samples: 1,
            velocity: true,
        }
    }

    pub fn with_velocity(mut self) -> Self {
        self.velocity = true;
        self
    }
}

impl Default for MotionCapabilities {
    fn default() -> Self {
        MotionCapabilities::STATIC_ONLY
    }
}

/// Shutter bounds in frames, relative to the update time.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ShutterSpan {
    pub open: f32,
    pub close: f32,
}

impl ShutterSpan {
    pub fn new(time: TimeValue, shutter: Option<Interval>) -> Self {
        match shutter {
            Some(iv) if !iv.is_empty() => Self {
                open: iv.start.frames_since(time),
                close: iv.end.frames_since(time),
            },
            _ => Self::default(),
        }
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.close - self.open
    }

    /// Frame offset at normalized shutter position `u` in [0, 1].
    #[inline]
    pub fn offset_at(&self, u: f32) -> f32 {
        self.open + self.width() * u.clamp(0.0, 1.0)
    }

    /// Normalized shutter position of the update time itself.
    pub fn fraction_of_update(&self) -> f32 {
        if self.width().abs() <= f32::EPSILON {
            0.0
        } else {
            (-self.open / self.width()).clamp(0.0, 1.0)
        }
    }
}

fn static_response() -> MotionBlurNegotiation {
    MotionBlurNegotiation {
        shutter: None,
        representation: TransformRepresentation::TransformsPreferred,
        transform_count: TransformCount::None,
    }
}

fn velocity_response(shutter: Interval) -> MotionBlurNegotiation {
    MotionBlurNegotiation {
        shutter: Some(shutter),
        representation: TransformRepresentation::VelocityPreferred,
        transform_count: TransformCount::None,
    }
}

fn samples_response(shutter: Interval, n: usize) -> MotionBlurNegotiation {
    MotionBlurNegotiation {
        shutter: Some(shutter),
        representation: TransformRepresentation::TransformsPreferred,
        transform_count: TransformCount::Exactly(n),
    }
}

/// Decide what a provider with `caps` delivers for `request`.
///
/// `limit` caps the number of samples honoured for an open (`Any`) request.
/// An exact request is either met exactly or answered with velocity or no
/// motion blur, never with a different sample count.
pub fn negotiate(
    request: &MotionBlurNegotiation,
    caps: MotionCapabilities,
    limit: usize,
) -> MotionBlurNegotiation {
    let shutter = match request.shutter {
        Some(iv) if !iv.is_empty() => iv,
        _ => return static_response(),
    };
    let max_samples = caps.max_transform_samples.min(limit);
    let can_sample = caps.transforms && max_samples >= 2;
    let fallback = |caps: MotionCapabilities| {
        if caps.velocity {
            velocity_response(shutter)
        } else {
            static_response()
        }
    };

    let count = match request.transform_count {
        TransformCount::Exactly(n) if n < 2 => TransformCount::from_raw(n as i32),
        c => c,
    };

    let response = match count {
        TransformCount::None => static_response(),
        TransformCount::Static => {
            if caps.velocity {
                velocity_response(shutter)
            } else if can_sample {
                samples_response(shutter, 2)
            } else {
                static_response()
            }
        }
        _ if request.representation == TransformRepresentation::VelocityPreferred
            && caps.velocity =>
        {
            velocity_response(shutter)
        }
        TransformCount::Exactly(n) => {
            if can_sample && n <= max_samples {
                samples_response(shutter, n)
            } else {
                fallback(caps)
            }
        }
        TransformCount::Any => {
            if can_sample {
                samples_response(shutter, max_samples)
            } else {
                fallback(caps)
            }
        }
    };
    log::debug!("motion blur negotiated: {:?} -> {:?}", request, response);
    response
}
