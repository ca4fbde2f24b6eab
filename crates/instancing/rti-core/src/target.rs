//! Instance targets: one positioned occurrence of a source.

use std::sync::Arc;

use hashbrown::HashMap;

use rti_api_core::blend::sample_sequence;
use rti_api_core::{ChannelKind, ChannelValue, Color, Material, Matrix3, Point3, Quat, UvVert};

use crate::channels::ChannelToken;
use crate::motion::ShutterSpan;

/// Mapping override: replaces every map vertex of `channel` on the source
/// mesh, for this instance only.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct UvOverride {
    pub channel: i32,
    pub value: UvVert,
}

/// Base transform plus per-frame linear velocity and spin.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VelocityMotion {
    /// Transform at the update time.
    pub base: Matrix3,
    /// World units per frame.
    pub velocity: Point3,
    /// Rotation vector (axis scaled by radians) per frame.
    pub spin: Point3,
}

impl VelocityMotion {
    pub fn stationary(base: Matrix3) -> Self {
        Self {
            base,
            velocity: Point3::ORIGIN,
            spin: Point3::ORIGIN,
        }
    }

    /// Transform `frames` after the update time. Spin turns the instance
    /// about its own pivot.
    pub fn advance(&self, frames: f32) -> Matrix3 {
        let spin = Quat::from_rotation_vector(self.spin * frames);
        let turn = Matrix3::from_trs(Point3::ORIGIN, spin, Point3::new(1.0, 1.0, 1.0));
        let mut out = Matrix3::IDENTITY;
        for i in 0..3 {
            out.rows[i] = turn.transform_vector(self.base.row(i)).to_array();
        }
        out.set_translation(self.base.translation() + self.velocity * frames);
        out
    }
}

/// Exactly one motion representation per target.
#[derive(Clone, Debug, PartialEq)]
pub enum Motion {
    /// 1..N transforms spread evenly over the shutter, in temporal order.
    Transforms(Vec<Matrix3>),
    Velocity(VelocityMotion),
}

impl Default for Motion {
    fn default() -> Self {
        Motion::Transforms(vec![Matrix3::IDENTITY])
    }
}

#[derive(Clone, Debug)]
pub struct InstanceTarget {
    pub(crate) birth_id: i64,
    pub(crate) user_instance_id: i64,
    pub(crate) material: Option<Arc<Material>>,
    pub(crate) material_id: i32,
    pub(crate) uv_overrides: Vec<UvOverride>,
    pub(crate) motion: Motion,
    pub(crate) custom: HashMap<ChannelToken, ChannelValue>,
    pub(crate) export_groups: u32,
    pub(crate) sim_groups: u32,
    pub(crate) mass: f32,
}

impl Default for InstanceTarget {
    fn default() -> Self {
        Self {
            birth_id: 0,
            user_instance_id: 0,
            material: None,
            material_id: -1,
            uv_overrides: Vec::new(),
            motion: Motion::default(),
            custom: HashMap::new(),
            export_groups: 0,
            sim_groups: 0,
            mass: 1.0,
        }
    }
}

impl InstanceTarget {
    /// Birth ID, unique among all targets of one provider. May be <= 0.
    #[inline]
    pub fn birth_id(&self) -> i64 {
        self.birth_id
    }

    /// Caller-defined instance ID; not unique, may be <= 0.
    #[inline]
    pub fn user_instance_id(&self) -> i64 {
        self.user_instance_id
    }

    /// Material override; `None` inherits the node material.
    #[inline]
    pub fn material_override(&self) -> Option<&Arc<Material>> {
        self.material.as_ref()
    }

    /// Material ID override; -1 means none.
    #[inline]
    pub fn material_id_override(&self) -> i32 {
        self.material_id
    }

    #[inline]
    pub fn uv_overrides(&self) -> &[UvOverride] {
        &self.uv_overrides
    }

    #[inline]
    pub fn motion(&self) -> &Motion {
        &self.motion
    }

    /// Transform sequence; empty when the cycle delivers velocity.
    pub fn transforms(&self) -> &[Matrix3] {
        match &self.motion {
            Motion::Transforms(tms) => tms,
            Motion::Velocity(_) => &[],
        }
    }

    /// Velocity/spin record; `None` when the cycle delivers transforms.
    pub fn velocity(&self) -> Option<&VelocityMotion> {
        match &self.motion {
            Motion::Velocity(v) => Some(v),
            Motion::Transforms(_) => None,
        }
    }

    /// Transform at normalized shutter position `u`, from either representation.
    pub fn transform_at(&self, u: f32, span: &ShutterSpan) -> Matrix3 {
        match &self.motion {
            Motion::Transforms(tms) => sample_sequence(tms, u),
            Motion::Velocity(v) => v.advance(span.offset_at(u)),
        }
    }

    /// Per-instance export group flags; 0 means none set.
    #[inline]
    pub fn export_groups(&self) -> u32 {
        self.export_groups
    }

    /// Per-instance simulation group flags; 0 means none set.
    #[inline]
    pub fn sim_groups(&self) -> u32 {
        self.sim_groups
    }

    #[inline]
    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Raw stored value for `token`, if any.
    #[inline]
    pub fn custom(&self, token: ChannelToken) -> Option<&ChannelValue> {
        self.custom.get(&token)
    }

    /// Value of `token` read as `kind`. Missing slots, the sentinel token and
    /// a kind that does not match the token's declaration all yield the zero
    /// value of `kind`; the mismatch itself is not reported.
    pub fn custom_value(&self, token: ChannelToken, kind: ChannelKind) -> ChannelValue {
        match self.custom.get(&token) {
            Some(v) if v.kind() == kind => v.clone(),
            _ => ChannelValue::zero(kind),
        }
    }

    pub fn custom_float(&self, token: ChannelToken) -> f32 {
        self.custom(token)
            .and_then(ChannelValue::as_float)
            .unwrap_or(0.0)
    }

    pub fn custom_int(&self, token: ChannelToken) -> i32 {
        self.custom(token)
            .and_then(ChannelValue::as_int)
            .unwrap_or(0)
    }

    pub fn custom_vector(&self, token: ChannelToken) -> Point3 {
        self.custom(token)
            .and_then(ChannelValue::as_vector)
            .unwrap_or(Point3::ORIGIN)
    }

    pub fn custom_color(&self, token: ChannelToken) -> Color {
        self.custom(token)
            .and_then(ChannelValue::as_color)
            .unwrap_or(Color::IDENTITY)
    }

    pub fn custom_transform(&self, token: ChannelToken) -> Matrix3 {
        self.custom(token)
            .and_then(ChannelValue::as_transform)
            .unwrap_or(Matrix3::IDENTITY)
    }

    pub fn custom_blob(&self, token: ChannelToken) -> &[u8] {
        self.custom(token)
            .and_then(ChannelValue::as_blob)
            .unwrap_or(&[])
    }
}
