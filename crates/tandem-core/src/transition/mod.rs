//! Automated deck-to-deck transitions
//!
//! A transition is a fixed 60-step choreography over the crossfader and
//! both effect chains. The schedule itself is pure data (`TransitionPlan`)
//! so it can be inspected and tested without an engine; `TransitionRunner`
//! plays a plan against a shared engine on a worker thread with progress
//! reporting and cancellation. Whether a run completes, fails or is
//! cancelled, the effect chains are returned to a neutral state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::effect::{FilterKind, DEFAULT_ECHO_SECONDS, MAX_CUTOFF, MIN_CUTOFF};
use crate::engine::MixEngine;
use crate::error::EngineError;
use crate::types::DeckId;

/// Number of scheduled steps; step indices run 0..=TRANSITION_STEPS
pub const TRANSITION_STEPS: u32 = 60;

/// Lowpass sweep span on the outgoing deck, down from wide open
const LOWPASS_SWEEP_HZ: f32 = 18_000.0;

/// Highpass sweep span on the incoming deck, up from the floor
const HIGHPASS_SWEEP_HZ: f32 = 180.0;

/// Progress point where the outgoing echo tail starts blending in
const ECHO_ONSET: f32 = 0.7;

/// Echo mix reached at the end of the sweep
const ECHO_PEAK_MIX: f32 = 0.3;

const ECHO_FEEDBACK: f32 = 0.4;

/// Choreography parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionConfig {
    /// Total wall-clock length of the transition
    pub duration_secs: f64,
    /// Sweep the filters on both decks
    pub use_filter: bool,
    /// Blend an echo tail into the outgoing deck near the end
    pub use_echo: bool,
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            duration_secs: 8.0,
            use_filter: true,
            use_echo: true,
        }
    }
}

/// Parameter values for one step of the choreography
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionStep {
    pub progress: f32,
    pub crossfader: f32,
    /// Lowpass cutoff for the outgoing deck, if filters are in use
    pub outgoing_lowpass: Option<f32>,
    /// Highpass cutoff for the incoming deck, if filters are in use
    pub incoming_highpass: Option<f32>,
    /// Echo (time, feedback, mix) for the outgoing deck, if echo is in use
    pub outgoing_echo: Option<(f32, f32, f32)>,
}

/// The full schedule from one deck to the other
#[derive(Debug, Clone)]
pub struct TransitionPlan {
    pub from: DeckId,
    pub to: DeckId,
    pub config: TransitionConfig,
    fader_start: f32,
    fader_target: f32,
}

impl TransitionPlan {
    /// Build a plan crossing from `from` to its opposite deck
    ///
    /// `fader_start` is the crossfader position when the transition begins;
    /// the fader moves linearly from there to the incoming deck's end stop.
    pub fn new(from: DeckId, config: TransitionConfig, fader_start: f32) -> Self {
        let to = from.other();
        let fader_target = match to {
            DeckId::A => 0.0,
            DeckId::B => 1.0,
        };
        Self {
            from,
            to,
            config,
            fader_start: fader_start.clamp(0.0, 1.0),
            fader_target,
        }
    }

    /// Parameter values at step `i` (0..=TRANSITION_STEPS)
    pub fn step(&self, i: u32) -> TransitionStep {
        let progress = (i.min(TRANSITION_STEPS) as f32) / TRANSITION_STEPS as f32;
        let crossfader = self.fader_start + (self.fader_target - self.fader_start) * progress;

        let (outgoing_lowpass, incoming_highpass) = if self.config.use_filter {
            (
                Some((MAX_CUTOFF - progress * LOWPASS_SWEEP_HZ).max(MIN_CUTOFF)),
                Some(MIN_CUTOFF + progress * HIGHPASS_SWEEP_HZ),
            )
        } else {
            (None, None)
        };

        let outgoing_echo = if self.config.use_echo && progress > ECHO_ONSET {
            let mix = (progress - ECHO_ONSET) / (1.0 - ECHO_ONSET) * ECHO_PEAK_MIX;
            Some((DEFAULT_ECHO_SECONDS, ECHO_FEEDBACK, mix))
        } else {
            None
        };

        TransitionStep {
            progress,
            crossfader,
            outgoing_lowpass,
            incoming_highpass,
            outgoing_echo,
        }
    }

    /// Wall-clock pause between consecutive steps
    pub fn step_interval(&self) -> Duration {
        Duration::from_secs_f64(self.config.duration_secs.max(0.0) / TRANSITION_STEPS as f64)
    }

    fn apply(&self, engine: &mut MixEngine, step: &TransitionStep) {
        engine.set_crossfader(step.crossfader);
        if let Some(cutoff) = step.outgoing_lowpass {
            engine.set_filter(self.from, FilterKind::Lowpass, cutoff);
        }
        if let Some(cutoff) = step.incoming_highpass {
            engine.set_filter(self.to, FilterKind::Highpass, cutoff);
        }
        if let Some((time, feedback, mix)) = step.outgoing_echo {
            engine.set_echo(self.from, time, feedback, mix);
        }
    }
}

/// Progress report emitted after each applied step
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransitionEvent {
    Step { step: u32, progress: f32 },
    Finished,
    Cancelled,
}

/// Runs transition plans against a shared engine
pub struct TransitionRunner {
    engine: Arc<Mutex<MixEngine>>,
    running: Arc<AtomicBool>,
    cancel: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TransitionRunner {
    pub fn new(engine: Arc<Mutex<MixEngine>>) -> Self {
        Self {
            engine,
            running: Arc::new(AtomicBool::new(false)),
            cancel: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Start a transition away from `from`
    ///
    /// The incoming deck is started if it has a track and is not already
    /// playing. Returns a progress receiver; events end with `Finished` or
    /// `Cancelled`. Fails with `Busy` while a previous run is live and with
    /// `InvalidArgument` for a non-positive duration.
    pub fn start(
        &mut self,
        from: DeckId,
        config: TransitionConfig,
    ) -> Result<Receiver<TransitionEvent>, EngineError> {
        if !(config.duration_secs.is_finite() && config.duration_secs > 0.0) {
            return Err(EngineError::InvalidArgument(
                "transition duration must be positive",
            ));
        }
        if self.running.swap(true, Ordering::AcqRel) {
            return Err(EngineError::Busy);
        }
        self.cancel.store(false, Ordering::Release);
        self.reap();

        let plan = {
            let mut engine = lock_engine(&self.engine);
            let plan = TransitionPlan::new(from, config, engine.crossfader());
            if engine.deck_state(plan.to).has_track() {
                engine.play(plan.to);
            }
            plan
        };
        log::info!(
            "transition {} -> {} over {:.1}s",
            plan.from,
            plan.to,
            config.duration_secs
        );

        let (event_tx, event_rx) = std::sync::mpsc::channel();
        let engine = Arc::clone(&self.engine);
        let running = Arc::clone(&self.running);
        let cancel = Arc::clone(&self.cancel);

        let handle = std::thread::spawn(move || {
            run_plan(&engine, &plan, &cancel, &event_tx);
            running.store(false, Ordering::Release);
        });
        self.handle = Some(handle);
        Ok(event_rx)
    }

    /// Request cancellation of the current run, if any
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Block until the current run ends
    pub fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    fn reap(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for TransitionRunner {
    fn drop(&mut self) {
        self.cancel();
        self.wait();
    }
}

fn lock_engine(engine: &Arc<Mutex<MixEngine>>) -> std::sync::MutexGuard<'_, MixEngine> {
    match engine.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Restores neutral effect state when the run ends for any reason
struct ResetGuard<'a> {
    engine: &'a Arc<Mutex<MixEngine>>,
}

impl Drop for ResetGuard<'_> {
    fn drop(&mut self) {
        let mut engine = lock_engine(self.engine);
        for deck in DeckId::ALL {
            engine.set_filter(deck, FilterKind::Lowpass, MAX_CUTOFF);
            engine.set_echo(deck, DEFAULT_ECHO_SECONDS, 0.0, 0.0);
        }
    }
}

fn run_plan(
    engine: &Arc<Mutex<MixEngine>>,
    plan: &TransitionPlan,
    cancel: &AtomicBool,
    events: &Sender<TransitionEvent>,
) {
    let _guard = ResetGuard { engine };
    let interval = plan.step_interval();

    for i in 0..=TRANSITION_STEPS {
        if cancel.load(Ordering::Acquire) {
            log::debug!("transition cancelled at step {i}");
            let _ = events.send(TransitionEvent::Cancelled);
            return;
        }

        let step = plan.step(i);
        {
            let mut engine = lock_engine(engine);
            plan.apply(&mut engine, &step);
        }
        let _ = events.send(TransitionEvent::Step {
            step: i,
            progress: step.progress,
        });

        if i < TRANSITION_STEPS {
            std::thread::sleep(interval);
        }
    }

    let _ = events.send(TransitionEvent::Finished);
}
