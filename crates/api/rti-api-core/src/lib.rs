//! rti-api-core: host value types shared by instancing providers and renderers
//! (math, time, mesh/node/material stand-ins, channel values, transform blending).

pub mod blend;
pub mod host;
pub mod math;
pub mod time;
pub mod value;

pub use host::{Face, Material, Mesh, MeshMap, SceneNode, TvFace};
pub use math::{Color, Matrix3, Point3, Quat, UvVert};
pub use time::{Interval, TimeValue, TICKS_PER_FRAME, TICKS_PER_SECOND};
pub use value::{ChannelKind, ChannelValue};
