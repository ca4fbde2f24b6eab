//! Renderer-facing instancing capability and the capability query on scene
//! objects.
//!
//! Usage from a renderer:
//!
//! ```ignore
//! match render_time_instancing(obj) {
//!     Some(provider) => {
//!         let mut motion = MotionBlurNegotiation::request(shutter, repr, count);
//!         let valid = provider.update(&UpdateRequest::new(t, "myrenderer"), &mut motion);
//!         let size = provider.channels().resolve("size", ChannelKind::Float);
//!         for source in provider.sources() {
//!             for target in source.targets() {
//!                 let s = target.custom_float(size);
//!                 // ... instance source.data() using target
//!             }
//!         }
//!         provider.release();
//!     }
//!     None => { /* render obj.aggregate_mesh(t) instead */ }
//! }
//! ```

use serde::{Deserialize, Serialize};

use rti_api_core::{Interval, Matrix3, Mesh, TimeValue};

use crate::channels::ChannelRegistry;
use crate::motion::{MotionBlurNegotiation, ShutterSpan};
use crate::source::{DataFlags, InstanceSource};

/// Capability identifier (two 32-bit words).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InterfaceId(pub u32, pub u32);

pub const RENDER_TIME_INSTANCING_INTERFACE: InterfaceId = InterfaceId(0x442741c3, 0x2e22675c);

/// Optional camera information an object may use to cull or level-of-detail.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewHint {
    /// World-to-camera transform.
    pub view_tm: Matrix3,
    pub fov_radians: f32,
    pub width: u32,
    pub height: u32,
}

/// Arguments of one `update()` call.
#[derive(Clone, Debug, PartialEq)]
pub struct UpdateRequest {
    pub time: TimeValue,
    pub view: Option<ViewHint>,
    /// Renderer identity ("arnold", "vray", ...). May be ignored.
    pub caller: String,
    /// Source kinds the renderer wants; empty means all.
    pub data_filter: DataFlags,
}

impl UpdateRequest {
    pub fn new(time: TimeValue, caller: impl Into<String>) -> Self {
        Self {
            time,
            view: None,
            caller: caller.into(),
            data_filter: DataFlags::NONE,
        }
    }

    pub fn with_view(mut self, view: ViewHint) -> Self {
        self.view = Some(view);
        self
    }

    pub fn with_filter(mut self, filter: DataFlags) -> Self {
        self.data_filter = filter;
        self
    }
}

/// Object-side instancing service, as seen by a renderer.
///
/// Everything returned by the accessors is valid from `update()` until
/// `release()`; `&mut self` on both makes the borrow checker enforce that.
/// Published data is immutable and may be read from many threads at once.
pub trait InstancingProvider {
    /// Refresh instancing data for `request.time`. `motion` carries the
    /// renderer's request in and the authoritative response out. Returns how
    /// long the result stays valid ([`Interval::FOREVER`] for static data).
    fn update(&mut self, request: &UpdateRequest, motion: &mut MotionBlurNegotiation) -> Interval;

    /// Free per-cycle data. Idempotent.
    fn release(&mut self);

    fn channels(&self) -> &ChannelRegistry;

    /// Sources of the current cycle; empty (never absent) when nothing was
    /// produced or after `release()`.
    fn sources(&self) -> &[InstanceSource];

    /// Negotiated shutter relative to the update time, for evaluating
    /// velocity targets.
    fn shutter_span(&self) -> ShutterSpan;

    /// Total number of targets across all sources.
    fn target_count(&self) -> usize {
        self.sources().iter().map(InstanceSource::len).sum()
    }
}

/// Capabilities an object can hand out.
pub enum Capability<'a> {
    RenderTimeInstancing(&'a mut dyn InstancingProvider),
}

/// Host base object, reduced to what a renderer needs from it here.
pub trait SceneObject {
    /// Capability query by identifier.
    fn get_interface(&mut self, _id: InterfaceId) -> Option<Capability<'_>> {
        None
    }

    /// Single mesh of all instances, for renderers that do not instance.
    fn aggregate_mesh(&mut self, time: TimeValue) -> Mesh;
}

/// Typed shortcut for the instancing capability.
pub fn render_time_instancing<O: SceneObject + ?Sized>(
    obj: &mut O,
) -> Option<&mut dyn InstancingProvider> {
    match obj.get_interface(RENDER_TIME_INSTANCING_INTERFACE)? {
        Capability::RenderTimeInstancing(p) => Some(p),
    }
}
