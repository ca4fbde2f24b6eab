//! Blending utilities for transforms and their components.
//! - f32 linear interpolation for scalars and vector components
//! - quaternion slerp (shortest-arc, via nalgebra)
//! - transform TRS blending (pos/scale lerp, rot slerp)

use crate::math::{Matrix3, Point3, Quat};

/// Linear interpolation for f32
#[inline]
pub fn lerp_f(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Lerp for fixed-size arrays
pub fn lerp_array<const N: usize>(a: &[f32; N], b: &[f32; N], t: f32) -> [f32; N] {
    let mut out = [0.0f32; N];
    for i in 0..N {
        out[i] = lerp_f(a[i], b[i], t);
    }
    out
}

#[inline]
pub fn lerp_point(a: Point3, b: Point3, t: f32) -> Point3 {
    Point3::from(lerp_array(&a.to_array(), &b.to_array(), t))
}

/// Slerp between two unit quaternions q1, q2 (shortest arc).
pub fn slerp(q1: Quat, q2: Quat, t: f32) -> Quat {
    let qa = q1.to_unit();
    let qb = q2.to_unit();
    // `None` only when the ends are numerically coincident.
    qa.try_slerp(&qb, t, 1e-6)
        .unwrap_or(if t < 0.5 { qa } else { qb })
        .into()
}

/// Blend two affine transforms through their TRS decomposition.
pub fn blend_transforms(a: &Matrix3, b: &Matrix3, t: f32) -> Matrix3 {
    if t <= 0.0 {
        return *a;
    }
    if t >= 1.0 {
        return *b;
    }
    let (ap, ar, ascale) = a.decompose();
    let (bp, br, bscale) = b.decompose();
    Matrix3::from_trs(
        lerp_point(ap, bp, t),
        slerp(ar, br, t),
        lerp_point(ascale, bscale, t),
    )
}

/// Evaluate an evenly spaced transform sequence at normalized position `u`.
/// An empty sequence yields identity.
pub fn sample_sequence(tms: &[Matrix3], u: f32) -> Matrix3 {
    match tms.len() {
        0 => Matrix3::IDENTITY,
        1 => tms[0],
        n => {
            let pos = u.clamp(0.0, 1.0) * (n - 1) as f32;
            let i = (pos.floor() as usize).min(n - 2);
            blend_transforms(&tms[i], &tms[i + 1], pos - i as f32)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lerp_midpoint() {
        assert_eq!(lerp_f(0.0, 1.0, 0.5), 0.5);
        assert_eq!(lerp_array(&[0.0, 0.0, 0.0], &[1.0, 2.0, 3.0], 0.5), [0.5, 1.0, 1.5]);
    }

    #[test]
    fn slerp_half_turn_is_unit_length() {
        let a = Quat::IDENTITY;
        let b = Quat::from_axis_angle(Point3::new(0.0, 1.0, 0.0), 2.0);
        let m = slerp(a, b, 0.5);
        assert!((m.dot(m) - 1.0).abs() < 1e-5);
        let expected = Quat::from_axis_angle(Point3::new(0.0, 1.0, 0.0), 1.0);
        assert!((m.dot(expected).abs() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn blend_transforms_translates_linearly() {
        let a = Matrix3::from_translation(Point3::new(0.0, 0.0, 0.0));
        let b = Matrix3::from_translation(Point3::new(4.0, 2.0, 0.0));
        let m = blend_transforms(&a, &b, 0.25);
        assert!(m.approx_eq(&Matrix3::from_translation(Point3::new(1.0, 0.5, 0.0)), 1e-5));
    }

    #[test]
    fn sample_sequence_hits_samples_exactly() {
        let tms: Vec<Matrix3> = (0..3)
            .map(|i| Matrix3::from_translation(Point3::new(i as f32, 0.0, 0.0)))
            .collect();
        assert!(sample_sequence(&tms, 0.0).approx_eq(&tms[0], 1e-6));
        assert!(sample_sequence(&tms, 0.5).approx_eq(&tms[1], 1e-6));
        assert!(sample_sequence(&tms, 1.0).approx_eq(&tms[2], 1e-6));
        assert_eq!(sample_sequence(&[], 0.5), Matrix3::IDENTITY);
    }
}
