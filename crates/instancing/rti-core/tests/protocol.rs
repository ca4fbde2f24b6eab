use std::sync::Arc;

use rti_core::{
    render_time_instancing, Capability, ChannelKind, ChannelToken, ChannelValue, DataFlags,
    FrameBuilder, FrameReader, GenerateContext, InstanceGenerator, InstanceRecord, InstancingConfig,
    InstancingProvider, InstancingResult, Instancer, InterfaceId, Interval, Matrix3, Mesh, Motion,
    MotionBlurNegotiation, MotionCapabilities, MotionLayout, Point3, SceneObject, SourceData,
    SourceKind, TimeValue, TransformCount, TransformRepresentation, UpdateRequest, VelocityMotion,
    RENDER_TIME_INSTANCING_INTERFACE,
};
use rti_api_core::SceneNode;

struct Rocks {
    mesh: Arc<Mesh>,
    node: Arc<SceneNode>,
    positions: Vec<Point3>,
    caps: MotionCapabilities,
    alternate_node: bool,
    tag_channel: bool,
}

impl Rocks {
    fn new(count: usize, caps: MotionCapabilities) -> Self {
        Self {
            mesh: Arc::new(Mesh::default()),
            node: Arc::new(SceneNode {
                handle: 9,
                name: "pebble".into(),
            }),
            positions: (0..count).map(|i| Point3::new(i as f32 * 2.0, 0.0, 0.0)).collect(),
            caps,
            alternate_node: false,
            tag_channel: false,
        }
    }
}

impl InstanceGenerator for Rocks {
    fn capabilities(&self) -> MotionCapabilities {
        self.caps
    }

    fn generate(
        &mut self,
        ctx: &GenerateContext<'_>,
        frame: &mut FrameBuilder<'_>,
    ) -> InstancingResult<Interval> {
        let size = frame.channel("size", ChannelKind::Float);
        if self.tag_channel {
            frame.channel("tag", ChannelKind::Int);
        }
        let mesh_slot = frame.source(SourceData::mesh(Arc::clone(&self.mesh)), -1);
        let node_slot = frame.source(SourceData::node(Arc::clone(&self.node)), -1);
        for (i, p) in self.positions.iter().enumerate() {
            let slot = if self.alternate_node && i % 2 == 1 {
                node_slot
            } else {
                mesh_slot
            };
            // One unit along x per frame.
            let motion = match ctx.layout {
                MotionLayout::Velocity => Motion::Velocity(VelocityMotion {
                    base: Matrix3::from_translation(*p),
                    velocity: Point3::new(1.0, 0.0, 0.0),
                    spin: Point3::new(0.0, 0.0, 0.1),
                }),
                _ => Motion::Transforms(
                    ctx.sample_times
                        .iter()
                        .map(|t| {
                            let dx = t.frames_since(ctx.time);
                            Matrix3::from_translation(*p + Point3::new(dx, 0.0, 0.0))
                        })
                        .collect(),
                ),
            };
            let record = InstanceRecord::new(motion)
                .with_user_id(i as i64)
                .with_custom(size, ChannelValue::Float(i as f32 + 0.5));
            frame.emit(slot, record)?;
        }
        Ok(Interval::FOREVER)
    }
}

fn one_frame_shutter() -> Interval {
    Interval::new(TimeValue(0), TimeValue(160))
}

#[test]
fn static_copies_of_one_mesh() {
    let mut provider = Instancer::new(Rocks::new(3, MotionCapabilities::transforms(8)));
    let mut motion = MotionBlurNegotiation::none();
    let valid = provider.update(&UpdateRequest::new(TimeValue(0), "test"), &mut motion);

    assert!(valid.is_forever());
    assert_eq!(motion.transform_count, TransformCount::None);
    assert_eq!(motion.transform_count.as_raw(), 0);
    assert_eq!(provider.sources().len(), 1);
    let source = &provider.sources()[0];
    assert_eq!(source.len(), 3);
    for target in source.targets() {
        assert_eq!(target.transforms().len(), 1);
        assert!(target.velocity().is_none());
    }
    provider.release();
}

#[test]
fn velocity_only_object_answers_with_velocity() {
    let mut provider = Instancer::new(Rocks::new(4, MotionCapabilities::velocity_only()));
    let mut motion = MotionBlurNegotiation::request(
        one_frame_shutter(),
        TransformRepresentation::TransformsPreferred,
        TransformCount::Exactly(2),
    );
    provider.update(&UpdateRequest::new(TimeValue(0), "test"), &mut motion);

    assert_eq!(motion.representation, TransformRepresentation::VelocityPreferred);
    assert_eq!(motion.transform_count, TransformCount::None);
    assert_eq!(provider.target_count(), 4);
    for target in provider.sources().iter().flat_map(|s| s.targets()) {
        assert!(target.transforms().is_empty());
        let v = target.velocity().expect("velocity record");
        assert_eq!(v.velocity, Point3::new(1.0, 0.0, 0.0));
        assert!((v.spin.z - 0.1).abs() < 1e-6);
    }
    provider.release();
}

#[test]
fn exact_sample_count_is_delivered() {
    let mut provider = Instancer::new(Rocks::new(2, MotionCapabilities::transforms(8)));
    for n in [2usize, 3, 5, 8] {
        let mut motion = MotionBlurNegotiation::request(
            one_frame_shutter(),
            TransformRepresentation::TransformsPreferred,
            TransformCount::Exactly(n),
        );
        provider.update(&UpdateRequest::new(TimeValue(0), "test"), &mut motion);
        assert_eq!(motion.transform_count, TransformCount::Exactly(n));
        for target in provider.sources()[0].targets() {
            let tms = target.transforms();
            assert_eq!(tms.len(), n);
            let start = tms[0].translation().x;
            let end = tms[n - 1].translation().x;
            assert!((end - start - 1.0).abs() < 1e-5);
        }
        provider.release();
    }
}

#[test]
fn unsupported_count_falls_back_to_static() {
    let mut provider = Instancer::new(Rocks::new(2, MotionCapabilities::transforms(4)));
    let mut motion = MotionBlurNegotiation::request(
        one_frame_shutter(),
        TransformRepresentation::TransformsPreferred,
        TransformCount::Exactly(12),
    );
    provider.update(&UpdateRequest::new(TimeValue(0), "test"), &mut motion);
    assert_eq!(motion.transform_count, TransformCount::None);
    assert_eq!(motion.representation, TransformRepresentation::TransformsPreferred);
    assert!(provider
        .sources()
        .iter()
        .flat_map(|s| s.targets())
        .all(|t| t.transforms().len() == 1));
    provider.release();
}

#[test]
fn sentinels_and_zero_defaults() {
    let mut provider = Instancer::new(Rocks::new(1, MotionCapabilities::STATIC_ONLY));
    let mut motion = MotionBlurNegotiation::none();
    provider.update(&UpdateRequest::new(TimeValue(0), "test"), &mut motion);

    let channels = provider.channels();
    assert_eq!(channels.resolve("missing", ChannelKind::Float), ChannelToken::NONE);
    assert_eq!(channels.resolve("size", ChannelKind::Int), ChannelToken::NONE);
    let size = channels.resolve("size", ChannelKind::Float);
    assert!(!size.is_none());

    let source = &provider.sources()[0];
    assert_eq!(source.velocity_map_channel(), -1);
    let target = &source.targets()[0];
    assert_eq!(target.custom_float(size), 0.5);
    assert_eq!(target.custom_float(ChannelToken::NONE), 0.0);
    assert_eq!(target.custom_int(size), 0);
    assert_eq!(target.material_id_override(), -1);
    assert!(target.material_override().is_none());
    assert!(target.uv_overrides().is_empty());
    assert_eq!(target.export_groups(), 0);
    assert_eq!(target.mass(), 1.0);
    provider.release();
}

#[test]
fn release_empties_the_frame_and_is_idempotent() {
    let mut provider = Instancer::new(Rocks::new(3, MotionCapabilities::STATIC_ONLY));
    let mut motion = MotionBlurNegotiation::none();
    provider.update(&UpdateRequest::new(TimeValue(0), "test"), &mut motion);
    provider.release();
    assert!(provider.sources().is_empty());
    assert!(provider.channels().is_empty());
    provider.release();
    assert!(provider.sources().is_empty());
}

#[test]
fn targets_are_grouped_by_shared_data() {
    let mut rocks = Rocks::new(6, MotionCapabilities::STATIC_ONLY);
    rocks.alternate_node = true;
    let mut provider = Instancer::new(rocks);
    let mut motion = MotionBlurNegotiation::none();
    provider.update(&UpdateRequest::new(TimeValue(0), "test"), &mut motion);

    let sources = provider.sources();
    assert_eq!(sources.len(), 2);
    assert!(!sources[0].data().same_data(sources[1].data()));
    for source in sources {
        let expect_odd = source.kind() == SourceKind::Node;
        assert!(source
            .targets()
            .iter()
            .all(|t| (t.user_instance_id() % 2 == 1) == expect_odd));
        let flags = source.flags();
        assert!(flags.contains(DataFlags::MESH) || flags.contains(DataFlags::INODE));
    }
    assert_eq!(provider.target_count(), 6);
    provider.release();
}

#[test]
fn data_filter_limits_source_kinds() {
    let mut rocks = Rocks::new(6, MotionCapabilities::STATIC_ONLY);
    rocks.alternate_node = true;
    let mut provider = Instancer::new(rocks);
    let mut motion = MotionBlurNegotiation::none();
    provider.update(
        &UpdateRequest::new(TimeValue(0), "test").with_filter(DataFlags::INODE),
        &mut motion,
    );
    assert_eq!(provider.sources().len(), 1);
    assert_eq!(provider.sources()[0].kind(), SourceKind::Node);
    assert_eq!(provider.target_count(), 3);
    provider.release();
}

#[test]
fn tokens_are_stable_across_cycles() {
    let mut provider = Instancer::new(Rocks::new(1, MotionCapabilities::STATIC_ONLY));
    let mut motion = MotionBlurNegotiation::none();

    provider.update(&UpdateRequest::new(TimeValue(0), "test"), &mut motion);
    let size = provider.channels().resolve("size", ChannelKind::Float);
    provider.release();

    provider.generator_mut().tag_channel = true;
    provider.update(&UpdateRequest::new(TimeValue(160), "test"), &mut motion);
    assert_eq!(provider.channels().resolve("size", ChannelKind::Float), size);
    let tag = provider.channels().resolve("tag", ChannelKind::Int);
    assert!(!tag.is_none());
    assert_eq!(provider.channels().channel_names(ChannelKind::Int), vec!["tag"]);
    provider.release();

    provider.generator_mut().tag_channel = false;
    provider.update(&UpdateRequest::new(TimeValue(320), "test"), &mut motion);
    assert_eq!(provider.channels().resolve("tag", ChannelKind::Int), ChannelToken::NONE);
    assert_eq!(provider.channels().resolve("size", ChannelKind::Float), size);
    assert_eq!(provider.channels().len(), 1);
    provider.release();
}

#[test]
fn concurrent_readers_see_the_same_frame() {
    let mut provider = Instancer::new(Rocks::new(64, MotionCapabilities::velocity_only()));
    let mut motion = MotionBlurNegotiation::request(
        one_frame_shutter(),
        TransformRepresentation::VelocityPreferred,
        TransformCount::Any,
    );
    provider.update(&UpdateRequest::new(TimeValue(0), "test"), &mut motion);
    let span = provider.shutter_span();
    let sources = provider.sources();
    let size = provider.channels().resolve("size", ChannelKind::Float);
    let cfg = InstancingConfig::default();

    let sums: Vec<f32> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cfg = &cfg;
                scope.spawn(move || {
                    let mut reader = FrameReader::new(cfg);
                    let mut sum = 0.0;
                    for target in sources.iter().flat_map(|s| s.targets()) {
                        let tms = reader.motion_samples(target, &span, 3);
                        sum += tms[2].translation().x;
                        sum += reader.custom_values(target, &[(size, ChannelKind::Float)])[0]
                            .as_float()
                            .unwrap_or(0.0);
                    }
                    sum
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert!(sums.windows(2).all(|w| w[0] == w[1]));
    provider.release();
}

struct Scatterer {
    provider: Instancer<Rocks>,
}

impl SceneObject for Scatterer {
    fn get_interface(&mut self, id: InterfaceId) -> Option<Capability<'_>> {
        if id == RENDER_TIME_INSTANCING_INTERFACE {
            Some(Capability::RenderTimeInstancing(&mut self.provider))
        } else {
            None
        }
    }

    fn aggregate_mesh(&mut self, _time: TimeValue) -> Mesh {
        Mesh::default()
    }
}

struct PlainMesh;

impl SceneObject for PlainMesh {
    fn aggregate_mesh(&mut self, _time: TimeValue) -> Mesh {
        Mesh::default()
    }
}

#[test]
fn capability_query_by_identifier() {
    let mut obj = Scatterer {
        provider: Instancer::new(Rocks::new(2, MotionCapabilities::STATIC_ONLY)),
    };
    assert!(obj.get_interface(InterfaceId(1, 2)).is_none());
    let provider = render_time_instancing(&mut obj).expect("instancing capability");
    let mut motion = MotionBlurNegotiation::none();
    provider.update(&UpdateRequest::new(TimeValue(0), "test"), &mut motion);
    assert_eq!(provider.target_count(), 2);
    provider.release();

    assert!(render_time_instancing(&mut PlainMesh).is_none());
}
