//! Affine math shared across the host boundary.
//!
//! `Matrix3` follows the host's row-vector convention: a point is transformed
//! as `p * M`, rows 0..3 hold the (scaled) local axes and row 3 holds the
//! translation. All numeric types use f32.
//!
//! The types here are plain serde records; rotation and decomposition work is
//! done by `nalgebra` in column-vector form, so every conversion transposes.

use std::ops::{Add, Mul, Neg, Sub};

use nalgebra::{Quaternion, Rotation3, Unit, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Texture vertex value used by per-instance mapping overrides.
pub type UvVert = Point3;

impl Point3 {
    pub const ORIGIN: Point3 = Point3::new(0.0, 0.0, 0.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    #[inline]
    pub fn dot(self, o: Point3) -> f32 {
        Vector3::from(self).dot(&Vector3::from(o))
    }

    #[inline]
    pub fn length(self) -> f32 {
        Vector3::from(self).norm()
    }

    #[inline]
    pub fn cross(self, o: Point3) -> Point3 {
        Vector3::from(self).cross(&Vector3::from(o)).into()
    }
}

impl From<[f32; 3]> for Point3 {
    fn from(a: [f32; 3]) -> Self {
        Point3::new(a[0], a[1], a[2])
    }
}

impl From<Point3> for Vector3<f32> {
    fn from(p: Point3) -> Self {
        Vector3::new(p.x, p.y, p.z)
    }
}

impl From<Vector3<f32>> for Point3 {
    fn from(v: Vector3<f32>) -> Self {
        Point3::new(v.x, v.y, v.z)
    }
}

impl Add for Point3 {
    type Output = Point3;
    fn add(self, o: Point3) -> Point3 {
        Point3::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl Sub for Point3 {
    type Output = Point3;
    fn sub(self, o: Point3) -> Point3 {
        Point3::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl Mul<f32> for Point3 {
    type Output = Point3;
    fn mul(self, s: f32) -> Point3 {
        Point3::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Neg for Point3 {
    type Output = Point3;
    fn neg(self) -> Point3 {
        Point3::new(-self.x, -self.y, -self.z)
    }
}

/// RGBA color (linear by convention).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Multiplicative identity: opaque white.
    pub const IDENTITY: Color = Color::new(1.0, 1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::IDENTITY
    }
}

/// Quaternion (x, y, z, w).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Quat {
    fn default() -> Self {
        Quat::IDENTITY
    }
}

impl From<Quat> for Quaternion<f32> {
    fn from(q: Quat) -> Self {
        Quaternion::new(q.w, q.x, q.y, q.z)
    }
}

impl From<Quaternion<f32>> for Quat {
    fn from(q: Quaternion<f32>) -> Self {
        Quat::new(q.i, q.j, q.k, q.w)
    }
}

impl From<UnitQuaternion<f32>> for Quat {
    fn from(q: UnitQuaternion<f32>) -> Self {
        q.into_inner().into()
    }
}

impl Quat {
    pub const IDENTITY: Quat = Quat::new(0.0, 0.0, 0.0, 1.0);

    #[inline]
    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    #[inline]
    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    #[inline]
    pub fn from_array(q: [f32; 4]) -> Self {
        Quat::new(q[0], q[1], q[2], q[3])
    }

    /// Unit quaternion; a zero quaternion maps to identity.
    pub fn to_unit(self) -> UnitQuaternion<f32> {
        Unit::try_new(Quaternion::from(self), f32::EPSILON)
            .unwrap_or_else(UnitQuaternion::identity)
    }

    pub fn from_axis_angle(axis: Point3, radians: f32) -> Self {
        match Unit::try_new(Vector3::from(axis), f32::EPSILON) {
            Some(axis) => UnitQuaternion::from_axis_angle(&axis, radians).into(),
            None => Quat::IDENTITY,
        }
    }

    /// Rotation vector (axis scaled by angle in radians) to quaternion.
    pub fn from_rotation_vector(v: Point3) -> Self {
        UnitQuaternion::from_scaled_axis(Vector3::from(v)).into()
    }

    /// Inverse of [`Quat::from_rotation_vector`], shortest arc.
    pub fn to_rotation_vector(self) -> Point3 {
        self.to_unit().scaled_axis().into()
    }

    #[inline]
    pub fn dot(self, o: Quat) -> f32 {
        Quaternion::from(self).dot(&Quaternion::from(o))
    }

    #[inline]
    pub fn negated(self) -> Quat {
        Quat::new(-self.x, -self.y, -self.z, -self.w)
    }

    #[inline]
    pub fn conjugate(self) -> Quat {
        Quaternion::from(self).conjugate().into()
    }

    pub fn normalized(self) -> Quat {
        self.to_unit().into()
    }

    /// Rotation matrix rows for the row-vector convention (`v * R`).
    pub fn to_rows(self) -> [[f32; 3]; 3] {
        let m = self.to_unit().to_rotation_matrix().into_inner();
        std::array::from_fn(|i| std::array::from_fn(|j| m[(j, i)]))
    }

    /// Extract a quaternion from orthonormal row-vector rotation rows.
    pub fn from_rows(rows: [[f32; 3]; 3]) -> Self {
        let m = nalgebra::Matrix3::from_fn(|r, c| rows[c][r]);
        UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(m)).into()
    }
}

impl Mul for Quat {
    type Output = Quat;
    /// Hamilton product.
    fn mul(self, o: Quat) -> Quat {
        (Quaternion::from(self) * Quaternion::from(o)).into()
    }
}

/// 3x4 affine transform (host `Matrix3`).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Matrix3 {
    pub rows: [[f32; 3]; 4],
}

impl Default for Matrix3 {
    fn default() -> Self {
        Matrix3::IDENTITY
    }
}

impl Matrix3 {
    pub const IDENTITY: Matrix3 = Matrix3 {
        rows: [
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
            [0.0, 0.0, 1.0],
            [0.0, 0.0, 0.0],
        ],
    };

    pub fn from_translation(t: Point3) -> Self {
        let mut m = Matrix3::IDENTITY;
        m.rows[3] = t.to_array();
        m
    }

    /// Linear part in column-vector form: column `i` is local axis `i`.
    pub fn linear(&self) -> nalgebra::Matrix3<f32> {
        nalgebra::Matrix3::from_fn(|r, c| self.rows[c][r])
    }

    /// Build from a column-vector linear part and a translation.
    pub fn from_linear(linear: &nalgebra::Matrix3<f32>, translation: Point3) -> Self {
        let mut rows = [[0.0f32; 3]; 4];
        for (i, row) in rows.iter_mut().take(3).enumerate() {
            *row = std::array::from_fn(|j| linear[(j, i)]);
        }
        rows[3] = translation.to_array();
        Matrix3 { rows }
    }

    /// Compose scale, then rotation, then translation.
    pub fn from_trs(translation: Point3, rotation: Quat, scale: Point3) -> Self {
        let rot = rotation.to_unit().to_rotation_matrix().into_inner();
        let linear = rot * nalgebra::Matrix3::from_diagonal(&Vector3::from(scale));
        Matrix3::from_linear(&linear, translation)
    }

    #[inline]
    pub fn translation(&self) -> Point3 {
        Point3::from(self.rows[3])
    }

    #[inline]
    pub fn set_translation(&mut self, t: Point3) {
        self.rows[3] = t.to_array();
    }

    #[inline]
    pub fn row(&self, i: usize) -> Point3 {
        Point3::from(self.rows[i])
    }

    pub fn determinant3(&self) -> f32 {
        self.linear().determinant()
    }

    /// Split into translation, rotation and per-axis scale. Shear is dropped.
    /// A mirrored basis is folded into a negative x scale.
    pub fn decompose(&self) -> (Point3, Quat, Point3) {
        let mut linear = self.linear();
        let mut scale = Vector3::from_fn(|i, _| linear.column(i).norm());
        if linear.determinant() < 0.0 {
            scale.x = -scale.x;
        }
        for (i, s) in scale.iter().enumerate() {
            if s.abs() > f32::EPSILON {
                linear.column_mut(i).unscale_mut(*s);
            }
        }
        let rotation =
            UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(linear));
        (self.translation(), rotation.into(), scale.into())
    }

    #[inline]
    pub fn transform_point(&self, p: Point3) -> Point3 {
        self.transform_vector(p) + self.translation()
    }

    #[inline]
    pub fn transform_vector(&self, v: Point3) -> Point3 {
        (self.linear() * Vector3::from(v)).into()
    }

    pub fn approx_eq(&self, other: &Matrix3, eps: f32) -> bool {
        self.rows
            .iter()
            .flatten()
            .zip(other.rows.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= eps)
    }
}

impl Mul for Matrix3 {
    type Output = Matrix3;
    /// `self` applied first, then `o`.
    fn mul(self, o: Matrix3) -> Matrix3 {
        let linear = o.linear() * self.linear();
        Matrix3::from_linear(&linear, o.transform_point(self.translation()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
    }

    #[test]
    fn quarter_turn_about_z_maps_x_to_y() {
        let q = Quat::from_axis_angle(Point3::new(0.0, 0.0, 1.0), std::f32::consts::FRAC_PI_2);
        let m = Matrix3::from_trs(Point3::ORIGIN, q, Point3::new(1.0, 1.0, 1.0));
        let p = m.transform_point(Point3::new(1.0, 0.0, 0.0));
        approx(p.x, 0.0, 1e-5);
        approx(p.y, 1.0, 1e-5);
        approx(p.z, 0.0, 1e-5);
    }

    #[test]
    fn rows_follow_row_vector_convention() {
        let q = Quat::from_axis_angle(Point3::new(0.0, 0.0, 1.0), std::f32::consts::FRAC_PI_2);
        let rows = q.to_rows();
        approx(rows[0][0], 0.0, 1e-6);
        approx(rows[0][1], 1.0, 1e-6);
        approx(rows[1][0], -1.0, 1e-6);
        approx(Quat::from_rows(rows).dot(q).abs(), 1.0, 1e-5);
    }

    #[test]
    fn decompose_recovers_trs() {
        let q = Quat::from_axis_angle(Point3::new(1.0, 2.0, 0.5), 0.8);
        let t = Point3::new(3.0, -1.0, 2.0);
        let s = Point3::new(2.0, 0.5, 1.5);
        let (t2, q2, s2) = Matrix3::from_trs(t, q, s).decompose();
        approx(t2.x, 3.0, 1e-5);
        approx(s2.x, 2.0, 1e-4);
        approx(s2.y, 0.5, 1e-4);
        approx(s2.z, 1.5, 1e-4);
        approx(q.dot(q2).abs(), 1.0, 1e-4);
    }

    #[test]
    fn mirrored_basis_folds_into_negative_x_scale() {
        let m = Matrix3::from_trs(Point3::ORIGIN, Quat::IDENTITY, Point3::new(-2.0, 1.0, 1.0));
        let (_, q, s) = m.decompose();
        approx(s.x, -2.0, 1e-5);
        approx(q.dot(Quat::IDENTITY).abs(), 1.0, 1e-5);
    }

    #[test]
    fn rotation_vector_round_trip() {
        let v = Point3::new(0.1, -0.3, 0.2);
        let back = Quat::from_rotation_vector(v).to_rotation_vector();
        approx(back.x, v.x, 1e-5);
        approx(back.y, v.y, 1e-5);
        approx(back.z, v.z, 1e-5);
        assert_eq!(Quat::IDENTITY.to_rotation_vector(), Point3::ORIGIN);
    }

    #[test]
    fn zero_quaternion_normalizes_to_identity() {
        assert_eq!(Quat::new(0.0, 0.0, 0.0, 0.0).normalized(), Quat::IDENTITY);
    }

    #[test]
    fn multiplication_applies_left_first() {
        let a = Matrix3::from_translation(Point3::new(1.0, 0.0, 0.0));
        let rot = Quat::from_axis_angle(Point3::new(0.0, 0.0, 1.0), std::f32::consts::FRAC_PI_2);
        let b = Matrix3::from_trs(Point3::ORIGIN, rot, Point3::new(1.0, 1.0, 1.0));
        let p = (a * b).transform_point(Point3::ORIGIN);
        approx(p.x, 0.0, 1e-5);
        approx(p.y, 1.0, 1e-5);
    }
}
