//! Time values and validity intervals on the host's global timeline.

use serde::{Deserialize, Serialize};

/// Host time ticks per second.
pub const TICKS_PER_SECOND: i32 = 4800;
/// Ticks per frame at the default 30 fps frame rate.
pub const TICKS_PER_FRAME: i32 = 160;

/// Point in time, in ticks.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeValue(pub i32);

impl TimeValue {
    pub const ZERO: TimeValue = TimeValue(0);

    #[inline]
    pub fn from_frames(frames: f32) -> Self {
        TimeValue((frames * TICKS_PER_FRAME as f32).round() as i32)
    }

    #[inline]
    pub fn frames(self) -> f32 {
        self.0 as f32 / TICKS_PER_FRAME as f32
    }

    #[inline]
    pub fn seconds(self) -> f32 {
        self.0 as f32 / TICKS_PER_SECOND as f32
    }

    /// Signed distance from `origin` to `self`, in frames.
    #[inline]
    pub fn frames_since(self, origin: TimeValue) -> f32 {
        (self.0 as i64 - origin.0 as i64) as f32 / TICKS_PER_FRAME as f32
    }
}

/// Inclusive time range. `start > end` encodes the empty interval.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval {
    pub start: TimeValue,
    pub end: TimeValue,
}

impl Interval {
    /// Unbounded validity: results never need recomputing.
    pub const FOREVER: Interval = Interval {
        start: TimeValue(i32::MIN),
        end: TimeValue(i32::MAX),
    };

    /// Empty validity: results must be recomputed on every query.
    pub const NEVER: Interval = Interval {
        start: TimeValue(i32::MIN),
        end: TimeValue(i32::MIN),
    };

    #[inline]
    pub const fn new(start: TimeValue, end: TimeValue) -> Self {
        Self { start, end }
    }

    /// Interval containing exactly one instant.
    #[inline]
    pub const fn instant(t: TimeValue) -> Self {
        Self { start: t, end: t }
    }

    #[inline]
    pub fn is_forever(&self) -> bool {
        *self == Interval::FOREVER
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start > self.end || *self == Interval::NEVER
    }

    #[inline]
    pub fn contains(&self, t: TimeValue) -> bool {
        !self.is_empty() && self.start <= t && t <= self.end
    }

    /// Length in ticks; zero for empty or single-instant intervals.
    #[inline]
    pub fn duration(&self) -> i64 {
        if self.is_empty() {
            0
        } else {
            self.end.0 as i64 - self.start.0 as i64
        }
    }

    pub fn intersect(&self, other: &Interval) -> Interval {
        if self.is_empty() || other.is_empty() {
            return Interval::NEVER;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start > end {
            Interval::NEVER
        } else {
            Interval::new(start, end)
        }
    }

    /// Time at normalized position `u` in [0, 1].
    pub fn lerp(&self, u: f32) -> TimeValue {
        let span = self.duration() as f64;
        TimeValue((self.start.0 as f64 + span * u.clamp(0.0, 1.0) as f64).round() as i32)
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval::FOREVER
    }
}
