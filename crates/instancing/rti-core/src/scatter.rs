//! Data-driven generator: a fixed scatter of instances described in JSON.
//!
//! Moving instances (non-zero velocity or spin) are evaluated at the
//! negotiated sample times, or handed out as velocity records when the
//! cycle delivers velocity. A layout marked not ready fails every update,
//! the way a simulation without a cached frame would.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use serde::{Deserialize, Serialize};

use rti_api_core::{
    ChannelKind, ChannelValue, Face, Interval, Matrix3, Mesh, MeshMap, Point3, Quat, SceneNode,
    TvFace,
};

use crate::channels::ChannelToken;
use crate::error::{InstancingError, InstancingResult};
use crate::instancer::{GenerateContext, InstanceGenerator};
use crate::motion::{MotionCapabilities, MotionLayout};
use crate::pool::{FrameBuilder, InstanceRecord, SourceSlot};
use crate::source::{Ownership, SourceData};
use crate::target::{Motion, VelocityMotion};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeSpec {
    /// Unit right triangle in the XY plane.
    Triangle,
    /// Square of side `size` in the XY plane, two faces.
    Quad {
        #[serde(default = "one")]
        size: f32,
    },
    Inline {
        mesh: Mesh,
    },
    Node {
        handle: u64,
        #[serde(default)]
        name: String,
    },
}

/// Uniform per-vertex velocity written into a map channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VelocityMapSpec {
    pub channel: usize,
    pub velocity: [f32; 3],
    /// Faces left out of the map, to produce a face-count mismatch.
    #[serde(default)]
    pub drop_faces: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub shape: ShapeSpec,
    #[serde(default)]
    pub caller_releases: bool,
    #[serde(default = "no_channel")]
    pub velocity_map_channel: i32,
    #[serde(default)]
    pub velocity_map: Option<VelocityMapSpec>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelSpec {
    pub name: String,
    pub kind: ChannelKind,
    #[serde(default)]
    pub byte_size: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UvSpec {
    pub channel: i32,
    pub value: [f32; 3],
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InstanceSpec {
    pub source: String,
    pub birth_id: Option<i64>,
    pub user_id: i64,
    pub position: [f32; 3],
    /// Quaternion x, y, z, w.
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    /// Units per frame.
    pub velocity: [f32; 3],
    /// Rotation vector, radians per frame.
    pub spin: [f32; 3],
    pub material_id: i32,
    pub uv: Vec<UvSpec>,
    /// Channel name to value.
    pub channels: HashMap<String, ChannelValue>,
    pub export_groups: u32,
    pub sim_groups: u32,
    pub mass: f32,
}

impl Default for InstanceSpec {
    fn default() -> Self {
        Self {
            source: String::new(),
            birth_id: None,
            user_id: 0,
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
            velocity: [0.0; 3],
            spin: [0.0; 3],
            material_id: -1,
            uv: Vec::new(),
            channels: HashMap::new(),
            export_groups: 0,
            sim_groups: 0,
            mass: 1.0,
        }
    }
}

impl InstanceSpec {
    fn base(&self) -> Matrix3 {
        Matrix3::from_trs(
            self.position.into(),
            Quat::from_array(self.rotation).normalized(),
            self.scale.into(),
        )
    }

    fn is_moving(&self) -> bool {
        self.velocity
            .iter()
            .chain(self.spin.iter())
            .any(|v| *v != 0.0)
    }

    fn velocity_motion(&self) -> VelocityMotion {
        VelocityMotion {
            base: self.base(),
            velocity: self.velocity.into(),
            spin: self.spin.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScatterLayout {
    pub name: String,
    pub capabilities: MotionCapabilities,
    pub ready: bool,
    pub channels: Vec<ChannelSpec>,
    pub sources: Vec<SourceSpec>,
    pub instances: Vec<InstanceSpec>,
}

impl Default for ScatterLayout {
    fn default() -> Self {
        Self {
            name: String::new(),
            capabilities: MotionCapabilities::STATIC_ONLY,
            ready: true,
            channels: Vec::new(),
            sources: Vec::new(),
            instances: Vec::new(),
        }
    }
}

impl ScatterLayout {
    pub fn from_json(text: &str) -> InstancingResult<Self> {
        let layout: ScatterLayout = serde_json::from_str(text)
            .map_err(|e| InstancingError::InvalidConfig(e.to_string()))?;
        layout.validate()?;
        Ok(layout)
    }

    /// Every instance names a known source and only declared channels with
    /// values of the declared kind. Declared birth IDs are unique.
    pub fn validate(&self) -> InstancingResult<()> {
        let mut declared = HashSet::new();
        for (i, inst) in self.instances.iter().enumerate() {
            if let Some(id) = inst.birth_id {
                if !declared.insert(id) {
                    return Err(InstancingError::InvalidConfig(format!(
                        "instance {i}: birth id {id} declared twice"
                    )));
                }
            }
            if !self.sources.iter().any(|s| s.name == inst.source) {
                return Err(InstancingError::InvalidConfig(format!(
                    "instance {i}: unknown source '{}'",
                    inst.source
                )));
            }
            for (name, value) in &inst.channels {
                match self.channels.iter().find(|c| &c.name == name) {
                    Some(c) if c.kind == value.kind() => {}
                    Some(c) => {
                        return Err(InstancingError::InvalidConfig(format!(
                            "instance {i}: channel '{name}' is {}, value is {}",
                            c.kind.name(),
                            value.kind().name()
                        )))
                    }
                    None => {
                        return Err(InstancingError::InvalidConfig(format!(
                            "instance {i}: undeclared channel '{name}'"
                        )))
                    }
                }
            }
        }
        Ok(())
    }
}

fn one() -> f32 {
    1.0
}

fn no_channel() -> i32 {
    -1
}

fn build_mesh(shape: &ShapeSpec) -> Option<Mesh> {
    match shape {
        ShapeSpec::Triangle => Some(Mesh {
            verts: vec![Point3::ORIGIN, Point3::new(1.0, 0.0, 0.0), Point3::new(0.0, 1.0, 0.0)],
            faces: vec![Face { v: [0, 1, 2] }],
            maps: Vec::new(),
        }),
        ShapeSpec::Quad { size } => Some(Mesh {
            verts: vec![
                Point3::ORIGIN,
                Point3::new(*size, 0.0, 0.0),
                Point3::new(*size, *size, 0.0),
                Point3::new(0.0, *size, 0.0),
            ],
            faces: vec![Face { v: [0, 1, 2] }, Face { v: [0, 2, 3] }],
            maps: Vec::new(),
        }),
        ShapeSpec::Inline { mesh } => Some(mesh.clone()),
        ShapeSpec::Node { .. } => None,
    }
}

fn build_source(spec: &SourceSpec) -> SourceData {
    let data = match (&spec.shape, build_mesh(&spec.shape)) {
        (ShapeSpec::Node { handle, name }, _) => SourceData::node(Arc::new(SceneNode {
            handle: *handle,
            name: name.clone(),
        })),
        (_, Some(mut mesh)) => {
            if let Some(vm) = &spec.velocity_map {
                let keep = mesh.face_count().saturating_sub(vm.drop_faces);
                let map = MeshMap {
                    tv: vec![vm.velocity.into(); mesh.vert_count()],
                    tf: mesh
                        .faces
                        .iter()
                        .take(keep)
                        .map(|f| TvFace { t: f.v })
                        .collect(),
                };
                mesh.set_map(vm.channel, map);
            }
            SourceData::mesh(Arc::new(mesh))
        }
        (_, None) => SourceData::mesh(Arc::new(Mesh::default())),
    };
    if spec.caller_releases {
        data.with_ownership(Ownership::CallerReleases)
    } else {
        data
    }
}

/// [`InstanceGenerator`] over a [`ScatterLayout`]. Source data is built once,
/// so the same source keeps the same identity across cycles.
#[derive(Debug)]
pub struct ScatterGenerator {
    layout: ScatterLayout,
    sources: Vec<(SourceData, i32)>,
    source_index: HashMap<String, usize>,
    slots: Vec<Option<SourceSlot>>,
    tokens: HashMap<String, ChannelToken>,
    birth_ids: Vec<i64>,
    generated: u64,
}

/// Birth ID per instance: the declared one, else the next free ID counting
/// down from -1, so an item keeps its ID from cycle to cycle.
fn stable_birth_ids(instances: &[InstanceSpec]) -> Vec<i64> {
    let declared: HashSet<i64> = instances.iter().filter_map(|inst| inst.birth_id).collect();
    let mut next = -1i64;
    instances
        .iter()
        .map(|inst| {
            inst.birth_id.unwrap_or_else(|| {
                while declared.contains(&next) {
                    next -= 1;
                }
                let id = next;
                next -= 1;
                id
            })
        })
        .collect()
}

impl ScatterGenerator {
    pub fn new(layout: ScatterLayout) -> InstancingResult<Self> {
        layout.validate()?;
        let sources = layout
            .sources
            .iter()
            .map(|s| (build_source(s), s.velocity_map_channel))
            .collect();
        let source_index = layout
            .sources
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        Ok(Self {
            slots: vec![None; layout.sources.len()],
            birth_ids: stable_birth_ids(&layout.instances),
            layout,
            sources,
            source_index,
            tokens: HashMap::new(),
            generated: 0,
        })
    }

    pub fn from_json(text: &str) -> InstancingResult<Self> {
        Self::new(ScatterLayout::from_json(text)?)
    }

    #[inline]
    pub fn layout(&self) -> &ScatterLayout {
        &self.layout
    }

    /// Built data of the source named `name`.
    pub fn source_data(&self, name: &str) -> Option<&SourceData> {
        self.source_index.get(name).map(|&i| &self.sources[i].0)
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.layout.ready = ready;
    }

    /// Successful generate calls so far.
    #[inline]
    pub fn generated(&self) -> u64 {
        self.generated
    }

    fn motion_for(inst: &InstanceSpec, ctx: &GenerateContext<'_>) -> Motion {
        if !inst.is_moving() {
            return Motion::Transforms(vec![inst.base()]);
        }
        let vm = inst.velocity_motion();
        match ctx.layout {
            MotionLayout::Velocity => Motion::Velocity(vm),
            MotionLayout::Static => Motion::Transforms(vec![vm.base]),
            MotionLayout::Samples(_) => Motion::Transforms(
                ctx.sample_times
                    .iter()
                    .map(|t| vm.advance(t.frames_since(ctx.time)))
                    .collect(),
            ),
        }
    }
}

impl InstanceGenerator for ScatterGenerator {
    fn capabilities(&self) -> MotionCapabilities {
        self.layout.capabilities
    }

    fn generate(
        &mut self,
        ctx: &GenerateContext<'_>,
        frame: &mut FrameBuilder<'_>,
    ) -> InstancingResult<Interval> {
        if !self.layout.ready {
            return Err(InstancingError::Generator(format!(
                "scatter '{}' has no data at t={}",
                self.layout.name, ctx.time.0
            )));
        }

        self.tokens.clear();
        for ch in &self.layout.channels {
            let token = match ch.kind {
                ChannelKind::CustomBlob => frame.blob_channel(&ch.name, ch.byte_size),
                kind => frame.channel(&ch.name, kind),
            };
            self.tokens.insert(ch.name.clone(), token);
        }

        self.slots.iter_mut().for_each(|s| *s = None);
        let mut moving = false;
        for (inst, &birth_id) in self.layout.instances.iter().zip(&self.birth_ids) {
            let Some(&si) = self.source_index.get(&inst.source) else {
                continue;
            };
            let slot = match self.slots[si] {
                Some(slot) => slot,
                None => {
                    let (data, vmc) = &self.sources[si];
                    let slot = frame.source(data.clone(), *vmc);
                    self.slots[si] = Some(slot);
                    slot
                }
            };
            moving |= inst.is_moving();

            let mut record = InstanceRecord::new(Self::motion_for(inst, ctx))
                .with_birth_id(birth_id)
                .with_user_id(inst.user_id)
                .with_material_id(inst.material_id)
                .with_groups(inst.export_groups, inst.sim_groups)
                .with_mass(inst.mass);
            for uv in &inst.uv {
                record = record.with_uv(uv.channel, uv.value.into());
            }
            for (name, value) in &inst.channels {
                if let Some(&token) = self.tokens.get(name) {
                    record = record.with_custom(token, value.clone());
                }
            }
            frame.emit(slot, record)?;
        }

        self.generated += 1;
        Ok(if moving {
            Interval::instant(ctx.time)
        } else {
            Interval::FOREVER
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instancer::Instancer;
    use crate::motion::MotionBlurNegotiation;
    use crate::provider::{InstancingProvider, UpdateRequest};
    use rti_api_core::TimeValue;

    const LAYOUT: &str = r#"{
        "name": "pair",
        "channels": [{ "name": "size", "kind": "float" }],
        "sources": [
            { "name": "tri", "shape": { "kind": "triangle" } },
            { "name": "q", "shape": { "kind": "quad", "size": 2.0 },
              "velocity_map_channel": 2,
              "velocity_map": { "channel": 2, "velocity": [1, 0, 0] } }
        ],
        "instances": [
            { "source": "tri", "position": [1, 2, 3],
              "channels": { "size": { "type": "float", "data": 0.5 } } },
            { "source": "q", "velocity": [0, 1, 0] }
        ]
    }"#;

    #[test]
    fn parses_and_builds_sources() {
        let scatter = ScatterGenerator::from_json(LAYOUT).unwrap();
        assert_eq!(scatter.layout().instances[1].mass, 1.0);
        assert_eq!(scatter.layout().instances[0].material_id, -1);
        let quad = scatter.source_data("q").and_then(SourceData::as_mesh).unwrap();
        assert_eq!(quad.face_count(), 2);
        assert!(quad.map_support(2));
    }

    #[test]
    fn unknown_source_is_rejected() {
        let text = r#"{ "instances": [{ "source": "nope" }] }"#;
        assert!(matches!(
            ScatterLayout::from_json(text),
            Err(InstancingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn channel_kind_must_match_declaration() {
        let text = r#"{
            "channels": [{ "name": "size", "kind": "float" }],
            "sources": [{ "name": "a", "shape": { "kind": "triangle" } }],
            "instances": [{ "source": "a", "channels": { "size": { "type": "int", "data": 1 } } }]
        }"#;
        assert!(ScatterLayout::from_json(text).is_err());
    }

    #[test]
    fn source_identity_is_stable() {
        let scatter = ScatterGenerator::from_json(LAYOUT).unwrap();
        let a = scatter.source_data("tri").unwrap().clone();
        assert!(a.same_data(scatter.source_data("tri").unwrap()));
        assert!(!a.same_data(scatter.source_data("q").unwrap()));
    }

    #[test]
    fn duplicate_declared_birth_ids_are_rejected() {
        let text = r#"{
            "sources": [{ "name": "a", "shape": { "kind": "triangle" } }],
            "instances": [{ "source": "a", "birth_id": 4 }, { "source": "a", "birth_id": 4 }]
        }"#;
        assert!(ScatterLayout::from_json(text).is_err());
    }

    #[test]
    fn undeclared_birth_ids_avoid_declared_ones_and_stay_put() {
        let text = r#"{
            "sources": [{ "name": "a", "shape": { "kind": "triangle" } }],
            "instances": [
                { "source": "a" },
                { "source": "a", "birth_id": -1 },
                { "source": "a" },
                { "source": "a", "birth_id": -3 }
            ]
        }"#;
        let mut p = Instancer::new(ScatterGenerator::from_json(text).unwrap());
        for t in [0, 160] {
            let mut motion = MotionBlurNegotiation::none();
            p.update(&UpdateRequest::new(TimeValue(t), "test"), &mut motion);
            assert!(p.last_error().is_none());
            let ids: Vec<i64> = p.sources()[0].targets().iter().map(|tg| tg.birth_id()).collect();
            assert_eq!(ids, vec![-2, -1, -4, -3]);
            p.release();
        }
    }
}
