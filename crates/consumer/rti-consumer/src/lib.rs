//! rti-consumer
//!
//! Renderer side of render-time instancing. Queries an object for the
//! instancing capability, runs one update/release cycle, and copies what the
//! renderer needs into [`RenderBatch`]es that outlive the cycle. Objects
//! without the capability, or with nothing to instance, are rendered from
//! their aggregate mesh.

pub mod batch;
pub mod bindings;
pub mod config;
pub mod diagnostics;

use std::time::Instant;

use anyhow::{anyhow, Result};

use rti_api_core::{Interval, Mesh, TimeValue};
use rti_core::{
    render_time_instancing, DataFlags, FrameReader, InstanceSource, InstancingConfig,
    InstancingProvider, MotionBlurNegotiation, MotionLayout, SceneObject, ShutterSpan,
    UpdateRequest, ViewHint,
};

pub use crate::batch::{BatchGeometry, DrawInstance, RenderBatch};
pub use crate::bindings::ChannelBindings;
pub use crate::config::{ChannelRequest, ConsumerConfig};
pub use crate::diagnostics::Diagnostics;

/// What the renderer asks for this frame.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectRequest {
    pub time: TimeValue,
    pub motion: MotionBlurNegotiation,
    pub view: Option<ViewHint>,
}

impl CollectRequest {
    pub fn new(time: TimeValue) -> Self {
        Self {
            time,
            motion: MotionBlurNegotiation::none(),
            view: None,
        }
    }

    pub fn with_motion(mut self, motion: MotionBlurNegotiation) -> Self {
        self.motion = motion;
        self
    }

    pub fn with_view(mut self, view: ViewHint) -> Self {
        self.view = Some(view);
        self
    }
}

#[derive(Debug, Clone)]
pub struct InstancedScene {
    /// Negotiated motion blur response.
    pub response: MotionBlurNegotiation,
    pub validity: Interval,
    pub span: ShutterSpan,
    pub bindings: ChannelBindings,
    pub batches: Vec<RenderBatch>,
}

impl InstancedScene {
    pub fn instance_count(&self) -> usize {
        self.batches.iter().map(RenderBatch::len).sum()
    }
}

#[derive(Debug, Clone)]
pub enum Collected {
    /// The object rendered as one mesh.
    Aggregate(Mesh),
    Instanced(InstancedScene),
}

#[derive(Debug, Default)]
pub struct Consumer {
    config: ConsumerConfig,
    diagnostics: Diagnostics,
}

impl Consumer {
    pub fn new(config: ConsumerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            diagnostics: Diagnostics::default(),
        })
    }

    #[inline]
    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Diagnostics of the last collection.
    #[inline]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn collect<O: SceneObject + ?Sized>(
        &mut self,
        obj: &mut O,
        req: &CollectRequest,
    ) -> Result<Collected> {
        let total = Instant::now();
        self.diagnostics.begin();

        let instanced = match render_time_instancing(obj) {
            Some(provider) => self.run_cycle(provider, req)?,
            None => {
                log::debug!("object has no instancing capability");
                None
            }
        };

        let out = match instanced {
            Some(scene) => Collected::Instanced(scene),
            None => {
                let t = Instant::now();
                self.diagnostics.fallbacks += 1;
                let mesh = obj.aggregate_mesh(req.time);
                self.diagnostics.record("aggregate", t);
                Collected::Aggregate(mesh)
            }
        };
        self.diagnostics.record("total", total);
        if self.config.log_diagnostics {
            self.diagnostics.log_summary();
        }
        Ok(out)
    }

    /// One update/release cycle. `None` when nothing was instanced.
    fn run_cycle(
        &mut self,
        provider: &mut dyn InstancingProvider,
        req: &CollectRequest,
    ) -> Result<Option<InstancedScene>> {
        let mut update = UpdateRequest::new(req.time, self.config.caller.clone())
            .with_filter(DataFlags(self.config.data_filter));
        if let Some(view) = req.view {
            update = update.with_view(view);
        }
        let mut motion = req.motion;

        let t = Instant::now();
        let validity = provider.update(&update, &mut motion);
        self.diagnostics.record("update", t);
        self.diagnostics.response = Some(motion);

        let t = Instant::now();
        let built = if provider.sources().is_empty() {
            Ok(None)
        } else {
            self.read_frame(&*provider, motion, validity).map(Some)
        };
        self.diagnostics.record("collect", t);

        let t = Instant::now();
        provider.release();
        self.diagnostics.record("release", t);
        built
    }

    fn read_frame(
        &mut self,
        provider: &dyn InstancingProvider,
        response: MotionBlurNegotiation,
        validity: Interval,
    ) -> Result<InstancedScene> {
        let bindings = ChannelBindings::resolve(provider.channels(), &self.config.channels);
        let span = provider.shutter_span();
        let samples = match response.layout() {
            MotionLayout::Static => 1,
            MotionLayout::Samples(n) => n,
            MotionLayout::Velocity => self.config.velocity_samples,
        };
        let settings = batch::BatchSettings {
            bindings: &bindings,
            span,
            samples,
            vertex_velocities: self.config.vertex_velocities,
        };
        let sources = provider.sources();
        let batches = read_sources(sources, &settings, self.config.workers)?;

        self.diagnostics.sources = sources.len();
        self.diagnostics.targets = provider.target_count();
        self.diagnostics.missing_channels = bindings.missing().map(str::to_string).collect();
        self.diagnostics.rejected_velocity_maps = sources
            .iter()
            .zip(batches.iter())
            .filter(|(s, b)| {
                self.config.vertex_velocities
                    && s.velocity_map_channel() >= 0
                    && s.data().as_mesh().is_some()
                    && b.vertex_velocities.is_none()
            })
            .count();

        Ok(InstancedScene {
            response,
            validity,
            span,
            bindings,
            batches,
        })
    }
}

fn reader() -> FrameReader {
    FrameReader::new(&InstancingConfig::default())
}

/// Build one batch per source, spreading sources over `workers` threads.
fn read_sources(
    sources: &[InstanceSource],
    settings: &batch::BatchSettings<'_>,
    workers: usize,
) -> Result<Vec<RenderBatch>> {
    let workers = workers.clamp(1, sources.len().max(1));
    if workers == 1 {
        let mut reader = reader();
        return Ok(sources
            .iter()
            .map(|s| batch::build_batch(s, settings, &mut reader))
            .collect());
    }

    let chunk = sources.len().div_ceil(workers);
    std::thread::scope(|scope| -> Result<Vec<RenderBatch>> {
        let handles: Vec<_> = sources
            .chunks(chunk)
            .map(|part| {
                scope.spawn(move || {
                    let mut reader = reader();
                    part.iter()
                        .map(|s| batch::build_batch(s, settings, &mut reader))
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut out = Vec::with_capacity(sources.len());
        for handle in handles {
            let part = handle
                .join()
                .map_err(|_| anyhow!("instancing reader thread panicked"))?;
            out.extend(part);
        }
        Ok(out)
    })
}

/// Collect with the default configuration.
pub fn collect<O: SceneObject + ?Sized>(obj: &mut O, req: &CollectRequest) -> Result<Collected> {
    Consumer::default().collect(obj, req)
}
