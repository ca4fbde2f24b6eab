//! Typed per-instance channel values.

use serde::{Deserialize, Serialize};

use crate::math::{Color, Matrix3, Point3};

/// Declared kind of a custom data channel.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// Opaque bytes; size is declared per channel.
    CustomBlob,
    Int,
    Float,
    Vector,
    Color,
    Transform,
}

impl ChannelKind {
    pub const ALL: [ChannelKind; 6] = [
        ChannelKind::CustomBlob,
        ChannelKind::Int,
        ChannelKind::Float,
        ChannelKind::Vector,
        ChannelKind::Color,
        ChannelKind::Transform,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ChannelKind::CustomBlob => "custom_blob",
            ChannelKind::Int => "int",
            ChannelKind::Float => "float",
            ChannelKind::Vector => "vector",
            ChannelKind::Color => "color",
            ChannelKind::Transform => "transform",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ChannelValue {
    CustomBlob(Vec<u8>),
    Int(i32),
    Float(f32),
    Vector(Point3),
    Color(Color),
    Transform(Matrix3),
}

impl ChannelValue {
    #[inline]
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelValue::CustomBlob(_) => ChannelKind::CustomBlob,
            ChannelValue::Int(_) => ChannelKind::Int,
            ChannelValue::Float(_) => ChannelKind::Float,
            ChannelValue::Vector(_) => ChannelKind::Vector,
            ChannelValue::Color(_) => ChannelKind::Color,
            ChannelValue::Transform(_) => ChannelKind::Transform,
        }
    }

    /// Value reported for a missing or unset slot of `kind`.
    pub fn zero(kind: ChannelKind) -> ChannelValue {
        match kind {
            ChannelKind::CustomBlob => ChannelValue::CustomBlob(Vec::new()),
            ChannelKind::Int => ChannelValue::Int(0),
            ChannelKind::Float => ChannelValue::Float(0.0),
            ChannelKind::Vector => ChannelValue::Vector(Point3::ORIGIN),
            ChannelKind::Color => ChannelValue::Color(Color::IDENTITY),
            ChannelKind::Transform => ChannelValue::Transform(Matrix3::IDENTITY),
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match self {
            ChannelValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            ChannelValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<Point3> {
        match self {
            ChannelValue::Vector(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_color(&self) -> Option<Color> {
        match self {
            ChannelValue::Color(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_transform(&self) -> Option<Matrix3> {
        match self {
            ChannelValue::Transform(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            ChannelValue::CustomBlob(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}
