//! Render-time instancing (engine-agnostic)
//!
//! Objects that expand into many copies of a few shapes publish them to
//! renderers as instance sources and targets instead of one aggregate mesh.
//! This crate holds the renderer-facing protocol (`provider`), its data
//! model (channels, sources, targets, motion blur negotiation), and the
//! object-side machinery (`Instancer`, `InstancePool`, `FrameBuilder`) that
//! generators plug into.

pub mod channels;
pub mod config;
pub mod error;
pub mod ids;
pub mod instancer;
pub mod motion;
pub mod pool;
pub mod provider;
pub mod sampling;
pub mod scatter;
pub mod scratch;
pub mod source;
pub mod target;
pub mod velocity;

// Re-exports for renderers and object plugins
pub use channels::{ChannelDescriptor, ChannelRegistry, ChannelToken};
pub use config::InstancingConfig;
pub use error::{InstancingError, InstancingResult};
pub use instancer::{GenerateContext, InstanceGenerator, Instancer};
pub use motion::{
    negotiate, MotionBlurNegotiation, MotionCapabilities, MotionLayout, ShutterSpan, TransformCount,
    TransformRepresentation,
};
pub use pool::{FrameBuilder, InstancePool, InstanceRecord, SourceSlot};
pub use provider::{
    render_time_instancing, Capability, InstancingProvider, InterfaceId, SceneObject, UpdateRequest,
    ViewHint, RENDER_TIME_INSTANCING_INTERFACE,
};
pub use scatter::{ScatterGenerator, ScatterLayout};
pub use scratch::FrameReader;
pub use source::{ClaimedData, DataFlags, InstanceSource, Ownership, SourceData, SourceKind};
pub use target::{InstanceTarget, Motion, UvOverride, VelocityMotion};
pub use velocity::{has_vertex_velocities, vertex_velocities};
pub use rti_api_core::{ChannelKind, ChannelValue, Interval, Matrix3, Mesh, Point3, TimeValue};
