//! Render batches: one per source, detached from the provider's cycle.

use std::sync::Arc;

use rti_api_core::{ChannelValue, Material, Matrix3, Mesh, Point3, SceneNode};
use rti_core::{
    vertex_velocities, ClaimedData, DataFlags, FrameReader, InstanceSource, InstanceTarget,
    ShutterSpan, SourceData, UvOverride,
};

use crate::bindings::ChannelBindings;

#[derive(Debug, Clone)]
pub enum BatchGeometry {
    Mesh(Arc<Mesh>),
    Node(Arc<SceneNode>),
}

impl BatchGeometry {
    /// Take over caller-owned data; copy borrowed data so nothing of the
    /// provider's survives its release. Returns whether the data was claimed.
    fn detach(data: &SourceData) -> (Self, bool) {
        match data.claim() {
            Some(ClaimedData::Mesh(mesh)) => (BatchGeometry::Mesh(mesh), true),
            Some(ClaimedData::Node(node)) => (BatchGeometry::Node(node), true),
            None => match data {
                SourceData::Mesh { mesh, .. } => {
                    (BatchGeometry::Mesh(Arc::new(Mesh::clone(mesh))), false)
                }
                SourceData::Node { node, .. } => {
                    (BatchGeometry::Node(Arc::new(SceneNode::clone(node))), false)
                }
            },
        }
    }

    pub fn as_mesh(&self) -> Option<&Arc<Mesh>> {
        match self {
            BatchGeometry::Mesh(m) => Some(m),
            BatchGeometry::Node(_) => None,
        }
    }

    pub fn as_node(&self) -> Option<&Arc<SceneNode>> {
        match self {
            BatchGeometry::Node(n) => Some(n),
            BatchGeometry::Mesh(_) => None,
        }
    }
}

/// One instance, ready to draw.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawInstance {
    pub birth_id: i64,
    pub user_id: i64,
    /// Shutter samples in temporal order; one when motion blur is off.
    pub transforms: Vec<Matrix3>,
    pub material_id: i32,
    pub material: Option<Material>,
    pub uv_overrides: Vec<UvOverride>,
    /// Bound channel values in binding order.
    pub values: Vec<ChannelValue>,
    pub export_groups: u32,
    pub sim_groups: u32,
    pub mass: f32,
}

#[derive(Debug, Clone)]
pub struct RenderBatch {
    pub geometry: BatchGeometry,
    /// Data was handed over by the provider rather than copied.
    pub claimed: bool,
    pub flags: DataFlags,
    /// Per mesh vertex, units/frame.
    pub vertex_velocities: Option<Vec<Point3>>,
    pub instances: Vec<DrawInstance>,
}

impl RenderBatch {
    #[inline]
    pub fn len(&self) -> usize {
        self.instances.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct BatchSettings<'a> {
    pub bindings: &'a ChannelBindings,
    pub span: ShutterSpan,
    pub samples: usize,
    pub vertex_velocities: bool,
}

fn draw_instance(
    target: &InstanceTarget,
    settings: &BatchSettings<'_>,
    reader: &mut FrameReader,
) -> DrawInstance {
    let transforms = reader
        .motion_samples(target, &settings.span, settings.samples)
        .to_vec();
    let values = reader
        .custom_values(target, settings.bindings.pairs())
        .to_vec();
    DrawInstance {
        birth_id: target.birth_id(),
        user_id: target.user_instance_id(),
        transforms,
        material_id: target.material_id_override(),
        material: target.material_override().map(|m| Material::clone(m)),
        uv_overrides: target.uv_overrides().to_vec(),
        values,
        export_groups: target.export_groups(),
        sim_groups: target.sim_groups(),
        mass: target.mass(),
    }
}

pub(crate) fn build_batch(
    source: &InstanceSource,
    settings: &BatchSettings<'_>,
    reader: &mut FrameReader,
) -> RenderBatch {
    let (geometry, claimed) = BatchGeometry::detach(source.data());
    let velocities = match source.data().as_mesh() {
        Some(mesh) if settings.vertex_velocities && source.velocity_map_channel() >= 0 => {
            let v = vertex_velocities(mesh, source.velocity_map_channel());
            if v.is_none() {
                log::debug!(
                    "velocity map channel {} unusable ({} faces on mesh)",
                    source.velocity_map_channel(),
                    mesh.face_count()
                );
            }
            v
        }
        _ => None,
    };
    let instances = source
        .targets()
        .iter()
        .map(|t| draw_instance(t, settings, reader))
        .collect();
    RenderBatch {
        geometry,
        claimed,
        flags: source.flags(),
        vertex_velocities: velocities,
        instances,
    }
}
