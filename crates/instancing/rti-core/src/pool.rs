//! Reusable per-provider storage and the frame builder generators write into.
//!
//! The pool keeps its source/target vectors across cycles so steady-state
//! updates do not reallocate. A [`FrameBuilder`] groups emitted instances by
//! source data identity and coerces every instance to the negotiated motion
//! layout, so renderers only ever see the representation the response names.

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};

use rti_api_core::{ChannelKind, ChannelValue, Material, Matrix3};

use crate::channels::{ChannelRegistry, ChannelToken};
use crate::config::InstancingConfig;
use crate::error::{InstancingError, InstancingResult};
use crate::ids::IdAllocator;
use crate::motion::{MotionLayout, ShutterSpan};
use crate::sampling::{derive_velocity, resample_transforms, sample_velocity};
use crate::source::{DataFlags, InstanceSource, SourceData, SourceKind};
use crate::target::{InstanceTarget, Motion, UvOverride, VelocityMotion};

/// Everything a generator says about one instance.
#[derive(Clone, Debug)]
pub struct InstanceRecord {
    /// `None` lets the pool allocate one at the end of the cycle, clear of
    /// every ID the generator supplied.
    pub birth_id: Option<i64>,
    pub user_instance_id: i64,
    pub material: Option<Arc<Material>>,
    pub material_id: i32,
    pub uv_overrides: Vec<UvOverride>,
    pub motion: Motion,
    pub custom: Vec<(ChannelToken, ChannelValue)>,
    pub export_groups: u32,
    pub sim_groups: u32,
    pub mass: f32,
}

impl Default for InstanceRecord {
    fn default() -> Self {
        Self {
            birth_id: None,
            user_instance_id: 0,
            material: None,
            material_id: -1,
            uv_overrides: Vec::new(),
            motion: Motion::default(),
            custom: Vec::new(),
            export_groups: 0,
            sim_groups: 0,
            mass: 1.0,
        }
    }
}

impl InstanceRecord {
    pub fn new(motion: Motion) -> Self {
        Self {
            motion,
            ..Self::default()
        }
    }

    /// Static instance at `tm`.
    pub fn at(tm: Matrix3) -> Self {
        Self::new(Motion::Transforms(vec![tm]))
    }

    pub fn with_birth_id(mut self, id: i64) -> Self {
        self.birth_id = Some(id);
        self
    }

    pub fn with_user_id(mut self, id: i64) -> Self {
        self.user_instance_id = id;
        self
    }

    pub fn with_material(mut self, material: Arc<Material>) -> Self {
        self.material = Some(material);
        self
    }

    pub fn with_material_id(mut self, id: i32) -> Self {
        self.material_id = id;
        self
    }

    pub fn with_uv(mut self, channel: i32, value: rti_api_core::UvVert) -> Self {
        self.uv_overrides.push(UvOverride { channel, value });
        self
    }

    pub fn with_custom(mut self, token: ChannelToken, value: ChannelValue) -> Self {
        self.custom.push((token, value));
        self
    }

    pub fn with_groups(mut self, export_groups: u32, sim_groups: u32) -> Self {
        self.export_groups = export_groups;
        self.sim_groups = sim_groups;
        self
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }
}

/// Handle to a source being built in the current cycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SourceSlot {
    cycle: u64,
    /// `None` when the request filter excluded the source.
    index: Option<usize>,
}

impl SourceSlot {
    #[inline]
    pub fn is_published(&self) -> bool {
        self.index.is_some()
    }
}

#[derive(Debug, Default)]
pub struct InstancePool {
    pub(crate) channels: ChannelRegistry,
    sources: Vec<InstanceSource>,
    spare_targets: Vec<Vec<InstanceTarget>>,
    by_identity: HashMap<(SourceKind, usize), usize>,
    birth_ids: HashSet<i64>,
    /// (source, target) positions still waiting for an allocated birth ID.
    pending_ids: Vec<(usize, usize)>,
    ids: IdAllocator,
    cycle: u64,
}

impl InstancePool {
    pub fn new(cfg: &InstancingConfig) -> Self {
        Self {
            sources: Vec::with_capacity(cfg.reserve_sources),
            birth_ids: HashSet::with_capacity(cfg.reserve_targets),
            ..Self::default()
        }
    }

    #[inline]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    #[inline]
    pub fn sources(&self) -> &[InstanceSource] {
        &self.sources
    }

    #[inline]
    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    /// Start a new cycle: drop last cycle's data, deactivate channels.
    pub fn begin_cycle(&mut self) -> u64 {
        self.clear();
        self.channels.begin_cycle();
        self.cycle = self.cycle.wrapping_add(1);
        self.cycle
    }

    /// Drop published sources and targets, keeping allocations for reuse.
    pub fn clear(&mut self) {
        for mut source in self.sources.drain(..) {
            source.targets.clear();
            self.spare_targets.push(source.targets);
        }
        self.by_identity.clear();
        self.birth_ids.clear();
        self.pending_ids.clear();
    }

    /// Close a successful cycle: allocate the birth IDs the generator left
    /// out, then drop empty sources. Returns how many sources were dropped.
    pub fn finish_cycle(&mut self) -> usize {
        for (source, target) in self.pending_ids.drain(..) {
            let id = loop {
                let id = self.ids.alloc_birth_id();
                if self.birth_ids.insert(id) {
                    break id;
                }
            };
            self.sources[source].targets[target].birth_id = id;
        }
        self.prune_empty()
    }

    /// Drop sources that ended the cycle without targets. Returns how many.
    pub fn prune_empty(&mut self) -> usize {
        let before = self.sources.len();
        let spare = &mut self.spare_targets;
        self.sources.retain_mut(|source| {
            if source.targets.is_empty() {
                spare.push(std::mem::take(&mut source.targets));
                false
            } else {
                true
            }
        });
        let removed = before - self.sources.len();
        if removed > 0 {
            self.by_identity.clear();
            for (i, source) in self.sources.iter().enumerate() {
                self.by_identity.insert(source.data.identity(), i);
            }
        }
        removed
    }

    /// Drop everything published, channels included.
    pub fn discard(&mut self) {
        self.clear();
        self.channels.begin_cycle();
    }

    pub fn builder(
        &mut self,
        layout: MotionLayout,
        span: ShutterSpan,
        filter: DataFlags,
    ) -> FrameBuilder<'_> {
        FrameBuilder {
            cycle: self.cycle,
            pool: self,
            layout,
            span,
            filter,
            filtered_out: 0,
        }
    }
}

/// Write access to the pool for the cycle being built.
#[derive(Debug)]
pub struct FrameBuilder<'a> {
    pool: &'a mut InstancePool,
    cycle: u64,
    layout: MotionLayout,
    span: ShutterSpan,
    filter: DataFlags,
    filtered_out: usize,
}

impl FrameBuilder<'_> {
    #[inline]
    pub fn layout(&self) -> MotionLayout {
        self.layout
    }

    #[inline]
    pub fn span(&self) -> ShutterSpan {
        self.span
    }

    /// Instances dropped because their source kind was filtered out.
    #[inline]
    pub fn filtered_out(&self) -> usize {
        self.filtered_out
    }

    /// Publish a channel for this cycle.
    pub fn channel(&mut self, name: &str, kind: ChannelKind) -> ChannelToken {
        self.pool.channels.register(name, kind)
    }

    pub fn blob_channel(&mut self, name: &str, byte_size: usize) -> ChannelToken {
        self.pool.channels.register_blob(name, byte_size)
    }

    /// Slot for `data`. The same allocation always maps to the same source;
    /// the first velocity map channel given for it wins.
    pub fn source(&mut self, data: SourceData, velocity_map_channel: i32) -> SourceSlot {
        if !self.filter.admits(data.kind()) {
            return SourceSlot {
                cycle: self.cycle,
                index: None,
            };
        }
        let key = data.identity();
        let pool = &mut *self.pool;
        let index = match pool.by_identity.get(&key) {
            Some(&index) => index,
            None => {
                let mut source = InstanceSource::new(data, velocity_map_channel);
                if let Some(spare) = pool.spare_targets.pop() {
                    source.targets = spare;
                }
                pool.sources.push(source);
                let index = pool.sources.len() - 1;
                pool.by_identity.insert(key, index);
                index
            }
        };
        SourceSlot {
            cycle: self.cycle,
            index: Some(index),
        }
    }

    pub fn emit(&mut self, slot: SourceSlot, record: InstanceRecord) -> InstancingResult<()> {
        if slot.cycle != self.cycle {
            return Err(InstancingError::UnknownSource {
                slot: slot.index.unwrap_or(usize::MAX),
                cycle: slot.cycle,
            });
        }
        let Some(index) = slot.index else {
            self.filtered_out += 1;
            return Ok(());
        };
        if index >= self.pool.sources.len() {
            return Err(InstancingError::UnknownSource {
                slot: index,
                cycle: slot.cycle,
            });
        }

        let mut custom = HashMap::with_capacity(record.custom.len());
        for (token, value) in record.custom {
            let declared = self.pool.channels.kind_of(token);
            if declared != Some(value.kind()) {
                return Err(InstancingError::ChannelKindConflict {
                    token,
                    declared,
                    actual: value.kind(),
                });
            }
            custom.insert(token, value);
        }

        let targets = self.pool.sources[index].targets.len();
        let birth_id = match record.birth_id {
            Some(id) => {
                if !self.pool.birth_ids.insert(id) {
                    return Err(InstancingError::DuplicateBirthId(id));
                }
                id
            }
            None => {
                self.pool.pending_ids.push((index, targets));
                0
            }
        };

        let motion = conform_motion(record.motion, self.layout, &self.span);
        self.pool.sources[index].targets.push(InstanceTarget {
            birth_id,
            user_instance_id: record.user_instance_id,
            material: record.material,
            material_id: record.material_id,
            uv_overrides: record.uv_overrides,
            motion,
            custom,
            export_groups: record.export_groups,
            sim_groups: record.sim_groups,
            mass: record.mass,
        });
        Ok(())
    }
}

/// Bring a generator-supplied motion into the negotiated layout.
fn conform_motion(motion: Motion, layout: MotionLayout, span: &ShutterSpan) -> Motion {
    match (layout, motion) {
        (MotionLayout::Velocity, Motion::Velocity(v)) => Motion::Velocity(v),
        (MotionLayout::Velocity, Motion::Transforms(tms)) => {
            Motion::Velocity(derive_velocity(&tms, span))
        }
        (MotionLayout::Static, Motion::Velocity(v)) => Motion::Transforms(vec![v.base]),
        (MotionLayout::Static, Motion::Transforms(mut tms)) => {
            if tms.len() != 1 {
                log::trace!("static layout: collapsing {} transforms", tms.len());
                let first = tms.first().copied().unwrap_or(Matrix3::IDENTITY);
                tms.clear();
                tms.push(first);
            }
            Motion::Transforms(tms)
        }
        (MotionLayout::Samples(n), Motion::Transforms(tms)) => {
            if tms.len() == n {
                Motion::Transforms(tms)
            } else {
                log::trace!("resampling {} transforms to {}", tms.len(), n);
                let mut out = Vec::with_capacity(n);
                resample_transforms(&tms, n, &mut out);
                Motion::Transforms(out)
            }
        }
        (MotionLayout::Samples(n), Motion::Velocity(v)) => {
            let mut out = Vec::with_capacity(n);
            sample_velocity(&v, span, n, &mut out);
            Motion::Transforms(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rti_api_core::{Mesh, Point3};

    fn tx(x: f32) -> Matrix3 {
        Matrix3::from_translation(Point3::new(x, 0.0, 0.0))
    }

    #[test]
    fn groups_by_allocation_identity() {
        let mut pool = InstancePool::new(&InstancingConfig::default());
        pool.begin_cycle();
        let a = Arc::new(Mesh::default());
        let b = Arc::new(Mesh::default());
        let mut fb = pool.builder(MotionLayout::Static, ShutterSpan::default(), DataFlags::NONE);
        let sa = fb.source(SourceData::mesh(Arc::clone(&a)), -1);
        let sb = fb.source(SourceData::mesh(Arc::clone(&b)), -1);
        let sa2 = fb.source(SourceData::mesh(Arc::clone(&a)), 3);
        assert_eq!(sa, sa2);
        assert_ne!(sa, sb);
        fb.emit(sa, InstanceRecord::at(tx(0.0))).unwrap();
        fb.emit(sa2, InstanceRecord::at(tx(1.0))).unwrap();
        fb.emit(sb, InstanceRecord::at(tx(2.0))).unwrap();
        assert_eq!(pool.sources().len(), 2);
        assert_eq!(pool.sources()[0].len(), 2);
        assert_eq!(pool.sources()[0].velocity_map_channel(), -1);
    }

    #[test]
    fn sources_without_targets_are_pruned() {
        let mut pool = InstancePool::new(&InstancingConfig::default());
        pool.begin_cycle();
        let used = Arc::new(Mesh::default());
        let mut fb = pool.builder(MotionLayout::Static, ShutterSpan::default(), DataFlags::NONE);
        fb.source(SourceData::mesh(Arc::new(Mesh::default())), -1);
        let slot = fb.source(SourceData::mesh(Arc::clone(&used)), -1);
        fb.emit(slot, InstanceRecord::default()).unwrap();
        fb.source(SourceData::mesh(Arc::new(Mesh::default())), -1);
        assert_eq!(pool.prune_empty(), 2);
        assert_eq!(pool.sources().len(), 1);
        assert!(pool.sources()[0].data().same_data(&SourceData::mesh(used)));
    }

    #[test]
    fn stale_slot_is_rejected() {
        let mut pool = InstancePool::new(&InstancingConfig::default());
        pool.begin_cycle();
        let mesh = Arc::new(Mesh::default());
        let slot = pool
            .builder(MotionLayout::Static, ShutterSpan::default(), DataFlags::NONE)
            .source(SourceData::mesh(mesh), -1);
        pool.begin_cycle();
        let mut fb = pool.builder(MotionLayout::Static, ShutterSpan::default(), DataFlags::NONE);
        let err = fb.emit(slot, InstanceRecord::default()).unwrap_err();
        assert!(matches!(err, InstancingError::UnknownSource { .. }));
    }

    #[test]
    fn duplicate_birth_ids_are_rejected() {
        let mut pool = InstancePool::new(&InstancingConfig::default());
        pool.begin_cycle();
        let mut fb = pool.builder(MotionLayout::Static, ShutterSpan::default(), DataFlags::NONE);
        let s = fb.source(SourceData::mesh(Arc::new(Mesh::default())), -1);
        fb.emit(s, InstanceRecord::default().with_birth_id(5)).unwrap();
        assert_eq!(
            fb.emit(s, InstanceRecord::default().with_birth_id(5)),
            Err(InstancingError::DuplicateBirthId(5))
        );
        fb.emit(s, InstanceRecord::default()).unwrap();
        fb.emit(s, InstanceRecord::default()).unwrap();
        pool.finish_cycle();
        let ids: Vec<i64> = pool.sources()[0].targets().iter().map(|t| t.birth_id()).collect();
        assert_eq!(ids, vec![5, -1, -2]);
    }

    #[test]
    fn allocated_birth_ids_skip_supplied_ones() {
        let mut pool = InstancePool::new(&InstancingConfig::default());
        pool.begin_cycle();
        let mut fb = pool.builder(MotionLayout::Static, ShutterSpan::default(), DataFlags::NONE);
        let s = fb.source(SourceData::mesh(Arc::new(Mesh::default())), -1);
        fb.emit(s, InstanceRecord::default()).unwrap();
        fb.emit(s, InstanceRecord::default().with_birth_id(-1)).unwrap();
        fb.emit(s, InstanceRecord::default()).unwrap();
        fb.emit(s, InstanceRecord::default().with_birth_id(-3)).unwrap();
        pool.finish_cycle();
        let ids: Vec<i64> = pool.sources()[0].targets().iter().map(|t| t.birth_id()).collect();
        assert_eq!(ids, vec![-2, -1, -4, -3]);

        // The allocator keeps counting across cycles.
        pool.begin_cycle();
        let mut fb = pool.builder(MotionLayout::Static, ShutterSpan::default(), DataFlags::NONE);
        let s = fb.source(SourceData::mesh(Arc::new(Mesh::default())), -1);
        fb.emit(s, InstanceRecord::default()).unwrap();
        pool.finish_cycle();
        assert_eq!(pool.sources()[0].targets()[0].birth_id(), -5);
    }

    #[test]
    fn custom_value_must_match_declared_kind() {
        let mut pool = InstancePool::new(&InstancingConfig::default());
        pool.begin_cycle();
        let mut fb = pool.builder(MotionLayout::Static, ShutterSpan::default(), DataFlags::NONE);
        let size = fb.channel("size", ChannelKind::Float);
        let s = fb.source(SourceData::mesh(Arc::new(Mesh::default())), -1);
        let err = fb
            .emit(s, InstanceRecord::default().with_custom(size, ChannelValue::Int(3)))
            .unwrap_err();
        assert!(matches!(err, InstancingError::ChannelKindConflict { .. }));
        fb.emit(s, InstanceRecord::default().with_custom(size, ChannelValue::Float(3.0)))
            .unwrap();
    }

    #[test]
    fn filtered_sources_swallow_instances() {
        let mut pool = InstancePool::new(&InstancingConfig::default());
        pool.begin_cycle();
        let mut fb = pool.builder(MotionLayout::Static, ShutterSpan::default(), DataFlags::INODE);
        let s = fb.source(SourceData::mesh(Arc::new(Mesh::default())), -1);
        assert!(!s.is_published());
        fb.emit(s, InstanceRecord::default()).unwrap();
        assert_eq!(fb.filtered_out(), 1);
        assert!(pool.sources().is_empty());
    }

    #[test]
    fn motion_is_conformed_to_layout() {
        let span = ShutterSpan { open: 0.0, close: 1.0 };
        let v = VelocityMotion {
            base: tx(0.0),
            velocity: Point3::new(1.0, 0.0, 0.0),
            spin: Point3::ORIGIN,
        };
        match conform_motion(Motion::Velocity(v), MotionLayout::Samples(3), &span) {
            Motion::Transforms(tms) => {
                assert_eq!(tms.len(), 3);
                assert!(tms[2].approx_eq(&tx(1.0), 1e-5));
            }
            other => panic!("expected transforms, got {other:?}"),
        }
        let pair = || Motion::Transforms(vec![tx(0.0), tx(2.0)]);
        let m = conform_motion(pair(), MotionLayout::Velocity, &span);
        assert!(matches!(m, Motion::Velocity(v) if (v.velocity.x - 2.0).abs() < 1e-5));
        let m = conform_motion(pair(), MotionLayout::Static, &span);
        assert_eq!(m, Motion::Transforms(vec![tx(0.0)]));
    }
}
