//! Shutter sampling and conversion between motion representations.

use rti_api_core::blend::sample_sequence;
use rti_api_core::{Interval, Matrix3, Point3, TimeValue};

use crate::motion::ShutterSpan;
use crate::target::VelocityMotion;

/// `count` times spread evenly across `shutter`, in temporal order.
/// A single sample sits at the shutter open.
pub fn shutter_sample_times(shutter: Interval, count: usize, out: &mut Vec<TimeValue>) {
    out.clear();
    match count {
        0 => {}
        1 => out.push(shutter.start),
        n => out.extend((0..n).map(|i| shutter.lerp(i as f32 / (n - 1) as f32))),
    }
}

/// Resample an evenly spaced sequence to exactly `count` evenly spaced
/// samples. Endpoints are preserved; a single input is repeated.
pub fn resample_transforms(src: &[Matrix3], count: usize, out: &mut Vec<Matrix3>) {
    out.clear();
    if count == 0 {
        return;
    }
    if src.len() == count {
        out.extend_from_slice(src);
        return;
    }
    if count == 1 {
        out.push(src.first().copied().unwrap_or(Matrix3::IDENTITY));
        return;
    }
    out.extend((0..count).map(|i| sample_sequence(src, i as f32 / (count - 1) as f32)));
}

/// Sample a velocity record at `count` evenly spaced shutter positions.
pub fn sample_velocity(
    v: &VelocityMotion,
    span: &ShutterSpan,
    count: usize,
    out: &mut Vec<Matrix3>,
) {
    out.clear();
    match count {
        0 => {}
        1 => out.push(v.advance(span.open)),
        n => out.extend((0..n).map(|i| v.advance(span.offset_at(i as f32 / (n - 1) as f32)))),
    }
}

/// Per-frame velocity and spin from the first and last transform of a
/// sequence spread over `span`. The base is the transform at the update time.
pub fn derive_velocity(tms: &[Matrix3], span: &ShutterSpan) -> VelocityMotion {
    let (first, last) = match (tms.first(), tms.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => return VelocityMotion::stationary(Matrix3::IDENTITY),
    };
    let base = sample_sequence(tms, span.fraction_of_update());
    let frames = span.width();
    if tms.len() < 2 || frames.abs() <= f32::EPSILON {
        return VelocityMotion::stationary(base);
    }
    let velocity = (last.translation() - first.translation()) * frames.recip();
    let (_, r0, _) = first.decompose();
    let (_, r1, _) = last.decompose();
    // Row-vector convention: the world-space turn applied after r0 is r1 * r0^-1.
    let turn: Point3 = (r1 * r0.conjugate()).to_rotation_vector();
    VelocityMotion {
        base,
        velocity,
        spin: turn * frames.recip(),
    }
}
