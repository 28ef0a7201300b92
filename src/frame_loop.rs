// The feedback state machine: perturb -> infer -> blend -> reseed -> display.
// Visual: the first tick turns a white canvas into an image; every tick after that
// re-imagines the last image, slightly jittered and anchored to the one before.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::backend::{GenerateRequest, InferenceBackend};
use crate::blend::{DEFAULT_ALPHA, blend};
use crate::error::{BackendError, LoopError};
use crate::params::SharedParams;
use crate::perturb::PerturbationEngine;
use crate::seed::{DEFAULT_RESEED_EVERY, SeedScheduler};
use crate::sink::DisplaySink;
use crate::types::{BLANK_FILL, BLANK_SIZE, Frame};

/// Pause between the end of one tick and the start of the next.
pub const DEFAULT_TICK_DELAY: Duration = Duration::from_millis(50);

#[derive(Clone, Debug)]
pub struct LoopConfig {
    pub tick_delay: Duration,
    pub blend_alpha: f32,
    pub reseed_every: u64,
    pub blank_size: u32,
    pub blank_fill: [u8; 3],
}

impl LoopConfig {
    /// The neutral reference used when there is no previous frame yet.
    pub fn blank_frame(&self) -> Frame {
        Frame::solid(self.blank_size, self.blank_size, self.blank_fill)
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            tick_delay: DEFAULT_TICK_DELAY,
            blend_alpha: DEFAULT_ALPHA,
            reseed_every: DEFAULT_RESEED_EVERY,
            blank_size: BLANK_SIZE,
            blank_fill: BLANK_FILL,
        }
    }
}

/// What survives between ticks (and across stop/start).
#[derive(Clone, Debug, Default)]
pub struct LoopState {
    pub previous_frame: Option<Frame>,
    pub frame_count: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TickOutcome {
    /// Not running; nothing happened.
    Idle,
    /// Prompt was empty at tick time; state untouched, loop keeps going.
    NoPrompt,
    /// First image of the run, shown unblended.
    First,
    /// Regular tick: blended frame shown and committed.
    Blended { frame_count: u64, seed: u64 },
    /// Transient backend failure; state untouched, next tick retries.
    Failed(BackendError),
    /// Stopped while inference was in flight; the result was thrown away.
    Discarded,
}

pub struct FrameLoop<B, S, R> {
    backend: B,
    sink: S,
    perturb: PerturbationEngine<R>,
    seeds: SeedScheduler,
    params: SharedParams,
    config: LoopConfig,
    state: LoopState,
    running: Arc<AtomicBool>,
    next_due: Option<Instant>,
}

impl<B, S, R> FrameLoop<B, S, R>
where
    B: InferenceBackend,
    S: DisplaySink,
    R: Rng,
{
    pub fn new(
        backend: B,
        sink: S,
        perturb: PerturbationEngine<R>,
        params: SharedParams,
        config: LoopConfig,
    ) -> Self {
        Self {
            backend,
            sink,
            perturb,
            seeds: SeedScheduler::new(config.reseed_every),
            params,
            config,
            state: LoopState::default(),
            running: Arc::new(AtomicBool::new(false)),
            next_due: None,
        }
    }

    /// Shared with `LoopHandle` so a stop lands even while `generate` is blocking.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> &LoopState {
        &self.state
    }

    pub fn params(&self) -> &SharedParams {
        &self.params
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// When the next tick should run, if one is scheduled.
    pub fn next_due(&self) -> Option<Instant> {
        self.next_due
    }

    /// Idle -> Running; the first tick is due immediately.
    pub fn start(&mut self, now: Instant) -> Result<(), LoopError> {
        if !self.params.snapshot().has_prompt() {
            warn!("refusing to start: prompt is empty");
            return Err(LoopError::EmptyPrompt);
        }
        if self.is_running() && self.next_due.is_some() {
            return Ok(());
        }
        self.running.store(true, Ordering::SeqCst);
        self.next_due = Some(now);
        info!(
            backend = self.backend.name(),
            frame_count = self.state.frame_count,
            jitter = self.perturb.bound(),
            reseed_every = self.seeds.cadence(),
            "Generation started"
        );
        Ok(())
    }

    /// Running -> Idle. Keeps the previous frame and count so a restart resumes.
    pub fn stop(&mut self) {
        let was_running = self.running.swap(false, Ordering::SeqCst);
        self.next_due = None;
        if was_running {
            info!(frame_count = self.state.frame_count, "Generation stopped");
        }
    }

    /// Run the scheduled tick if it is due, then schedule the next one.
    /// A fatal error stops the loop and is returned.
    pub fn poll(&mut self, now: Instant) -> Result<Option<TickOutcome>, LoopError> {
        match self.next_due {
            Some(due) if now >= due => {}
            _ => return Ok(None),
        }
        self.next_due = None;

        match self.tick() {
            Ok(outcome) => {
                self.schedule_next(Instant::now());
                Ok(Some(outcome))
            }
            Err(e) => {
                error!(error = %e, "frame loop stopped");
                self.stop();
                Err(e)
            }
        }
    }

    // Delay counts from completion, so ticks can never overlap.
    fn schedule_next(&mut self, completed_at: Instant) {
        self.next_due = self
            .is_running()
            .then(|| completed_at + self.config.tick_delay);
    }

    /// One full iteration. Nothing is committed or shown unless every step succeeds.
    #[tracing::instrument(level = "debug", skip(self), fields(frame_count = self.state.frame_count))]
    pub fn tick(&mut self) -> Result<TickOutcome, LoopError> {
        if !self.is_running() {
            return Ok(TickOutcome::Idle);
        }

        // 1) Latest knobs, whatever the UI set since the last tick.
        let params = self.params.snapshot();
        if !params.has_prompt() {
            debug!("prompt empty, tick skipped");
            return Ok(TickOutcome::NoPrompt);
        }

        // 2) Reference: blank canvas on the first tick, jittered last frame after that.
        let reference = match &self.state.previous_frame {
            None => self.config.blank_frame(),
            Some(prev) => self.perturb.perturb(prev),
        };

        let req = GenerateRequest {
            prompt: params.prompt.trim(),
            reference: &reference,
            strength: params.strength,
            guidance_scale: params.guidance_scale,
            steps: params.steps,
            seed: params.seed,
        };
        debug!(
            seed = req.seed,
            steps = req.steps,
            strength = req.strength,
            guidance = req.guidance_scale,
            "generate"
        );

        // 3) Inference.
        let output = match self.backend.generate(&req) {
            Ok(frame) => frame,
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => {
                warn!(error = %e, "tick skipped, will retry");
                return Ok(TickOutcome::Failed(e));
            }
        };

        if !self.is_running() {
            debug!("stopped during inference, result discarded");
            return Ok(TickOutcome::Discarded);
        }

        // 4) First frame goes straight through.
        let Some(previous) = self.state.previous_frame.as_ref() else {
            self.sink.show(&output);
            self.state.previous_frame = Some(output);
            return Ok(TickOutcome::First);
        };

        // 5) Blend, commit, show.
        let blended = blend(previous, &output, self.config.blend_alpha)?;
        self.sink.show(&blended);
        self.state.previous_frame = Some(blended);
        self.state.frame_count += 1;

        // 6) Reseed against the live value so a seed typed during inference isn't lost.
        let frame_count = self.state.frame_count;
        let seeds = self.seeds;
        let seed = self.params.update(|p| {
            let next = seeds.advance(frame_count, p.seed);
            if next != p.seed {
                info!(frame_count, from = p.seed, to = next, "reseeded");
                p.seed = next;
            }
            p.seed
        });

        Ok(TickOutcome::Blended { frame_count, seed })
    }
}
