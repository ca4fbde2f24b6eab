//! Generic provider: drives an [`InstanceGenerator`] through the
//! update/release cycle and publishes what it builds.

use rti_api_core::{Interval, TimeValue};

use crate::channels::ChannelRegistry;
use crate::config::InstancingConfig;
use crate::error::InstancingResult;
use crate::motion::{
    negotiate, MotionBlurNegotiation, MotionCapabilities, MotionLayout, ShutterSpan,
};
use crate::pool::{FrameBuilder, InstancePool};
use crate::provider::{InstancingProvider, UpdateRequest, ViewHint};
use crate::sampling::shutter_sample_times;
use crate::source::{DataFlags, InstanceSource, SourceKind};

/// Read-only view of one update for a generator.
#[derive(Debug)]
pub struct GenerateContext<'a> {
    pub time: TimeValue,
    /// Caller identity, lowercased unless configured otherwise.
    pub caller: &'a str,
    pub view: Option<&'a ViewHint>,
    pub data_filter: DataFlags,
    /// Negotiated response.
    pub motion: &'a MotionBlurNegotiation,
    pub layout: MotionLayout,
    pub span: ShutterSpan,
    /// Times the transform samples correspond to; a single entry (the
    /// update time) when the layout is static or velocity-based.
    pub sample_times: &'a [TimeValue],
    pub cycle: u64,
}

impl GenerateContext<'_> {
    /// Whether sources of `kind` survive the request filter.
    #[inline]
    pub fn wants(&self, kind: SourceKind) -> bool {
        self.data_filter.admits(kind)
    }
}

/// Object-side producer of instances. Implementors describe the scene for
/// one time; negotiation, grouping, and lifetime are handled by [`Instancer`].
pub trait InstanceGenerator {
    /// What this generator can deliver for motion blur.
    fn capabilities(&self) -> MotionCapabilities;

    /// Emit this cycle's channels and instances. Returns the validity
    /// interval of the result.
    fn generate(
        &mut self,
        ctx: &GenerateContext<'_>,
        frame: &mut FrameBuilder<'_>,
    ) -> InstancingResult<Interval>;

    /// Called once per cycle when the renderer releases.
    fn release(&mut self) {}
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum CycleState {
    Idle,
    Live,
}

pub struct Instancer<G> {
    generator: G,
    config: InstancingConfig,
    pool: InstancePool,
    state: CycleState,
    span: ShutterSpan,
    caller: String,
    sample_times: Vec<TimeValue>,
    last_error: Option<String>,
}

impl<G: InstanceGenerator> Instancer<G> {
    pub fn new(generator: G) -> Self {
        Self::with_config(generator, InstancingConfig::default())
    }

    pub fn with_config(generator: G, config: InstancingConfig) -> Self {
        Self {
            generator,
            pool: InstancePool::new(&config),
            sample_times: Vec::with_capacity(config.scratch_samples),
            config,
            state: CycleState::Idle,
            span: ShutterSpan::default(),
            caller: String::new(),
            last_error: None,
        }
    }

    #[inline]
    pub fn config(&self) -> &InstancingConfig {
        &self.config
    }

    #[inline]
    pub fn generator(&self) -> &G {
        &self.generator
    }

    #[inline]
    pub fn generator_mut(&mut self) -> &mut G {
        &mut self.generator
    }

    /// Number of updates performed so far.
    #[inline]
    pub fn cycle(&self) -> u64 {
        self.pool.cycle()
    }

    /// Whether an update is awaiting its release.
    #[inline]
    pub fn is_live(&self) -> bool {
        self.state == CycleState::Live
    }

    /// Caller identity seen by the generator in the last update.
    pub fn caller(&self) -> &str {
        &self.caller
    }

    /// Generator failure from the last update, if any.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}

impl<G: InstanceGenerator> InstancingProvider for Instancer<G> {
    fn update(&mut self, request: &UpdateRequest, motion: &mut MotionBlurNegotiation) -> Interval {
        if self.state == CycleState::Live {
            log::warn!(
                "update() called before release() of cycle {}; releasing implicitly",
                self.pool.cycle()
            );
            self.release();
        }
        let cycle = self.pool.begin_cycle();

        self.caller.clear();
        if self.config.lowercase_caller {
            self.caller.push_str(&request.caller.to_lowercase());
        } else {
            self.caller.push_str(&request.caller);
        }

        let response = negotiate(
            motion,
            self.generator.capabilities(),
            self.config.max_transform_samples,
        );
        *motion = response;
        let layout = response.layout();
        self.span = ShutterSpan::new(request.time, response.shutter);
        match (layout, response.shutter) {
            (MotionLayout::Samples(n), Some(shutter)) => {
                shutter_sample_times(shutter, n, &mut self.sample_times)
            }
            _ => {
                self.sample_times.clear();
                self.sample_times.push(request.time);
            }
        }

        let ctx = GenerateContext {
            time: request.time,
            caller: &self.caller,
            view: request.view.as_ref(),
            data_filter: request.data_filter,
            motion: &response,
            layout,
            span: self.span,
            sample_times: &self.sample_times,
            cycle,
        };
        let mut frame = self.pool.builder(layout, self.span, request.data_filter);
        let result = self.generator.generate(&ctx, &mut frame);
        let filtered_out = frame.filtered_out();

        self.state = CycleState::Live;
        match result {
            Ok(valid) => {
                self.last_error = None;
                let pruned = self.pool.finish_cycle();
                if pruned > 0 {
                    log::trace!("cycle {cycle}: dropped {pruned} sources without targets");
                }
                log::debug!(
                    "cycle {cycle}: {} sources, {} targets, {filtered_out} filtered, layout {layout:?}",
                    self.pool.sources().len(),
                    self.target_count(),
                );
                valid
            }
            Err(err) => {
                log::warn!("cycle {cycle}: generator failed, publishing nothing: {err}");
                self.last_error = Some(err.to_string());
                self.pool.discard();
                Interval::instant(request.time)
            }
        }
    }

    fn release(&mut self) {
        if self.state != CycleState::Live {
            return;
        }
        self.generator.release();
        self.pool.discard();
        self.state = CycleState::Idle;
        log::debug!("cycle {} released", self.pool.cycle());
    }

    fn channels(&self) -> &ChannelRegistry {
        self.pool.channels()
    }

    fn sources(&self) -> &[InstanceSource] {
        self.pool.sources()
    }

    fn shutter_span(&self) -> ShutterSpan {
        self.span
    }
}
