//! Deck transport
//!
//! A deck owns a loaded track, its transport state and its effect chain.
//! Playback position is never stored as a running counter: the transport
//! keeps an origin position plus a reference reading of the engine clock,
//! and position is derived as `origin + (clock − reference) · rate`. The
//! snapshot only changes on transport transitions, so any thread can read
//! a consistent position without locking the audio path.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use crate::effect::{EffectChain, FilterKind};
use crate::error::EngineError;
use crate::types::{DeckId, DeckState, SharedTrack, StereoBuffer};

/// Engine-wide sample clock
///
/// Advanced once per processed block by the engine; decks hold a clone and
/// convert the frame count to seconds.
#[derive(Clone)]
pub struct EngineClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
}

impl EngineClock {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate,
        }
    }

    /// Advance the clock by one processed block
    pub fn advance(&self, frames: usize) {
        self.frames.fetch_add(frames as u64, Ordering::Relaxed);
    }

    /// Current clock reading in seconds
    pub fn seconds(&self) -> f64 {
        self.frames.load(Ordering::Relaxed) as f64 / self.sample_rate as f64
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

/// Lock-free transport snapshot
///
/// Multi-word transitions run under a seqlock-style version counter: the
/// writer bumps it to odd before the stores and back to even after, and
/// readers retry until they see the same even version on both sides. The
/// deck is the only writer (it holds the transport behind `&mut`), so
/// writers never contend with each other.
pub struct TransportAtomics {
    /// Seqlock version, odd while a transition is in flight
    version: AtomicU64,
    /// DeckState discriminant
    state: AtomicU8,
    /// Position at the last transition, f64 bits
    origin: AtomicU64,
    /// Engine clock at the last transition, f64 bits
    reference: AtomicU64,
    /// Playback rate, f32 bits
    rate: AtomicU32,
    /// Loop bounds in seconds, f64 bits
    loop_start: AtomicU64,
    loop_end: AtomicU64,
    loop_active: AtomicBool,
    /// Track duration in seconds, f64 bits (0 when empty)
    duration: AtomicU64,
}

impl TransportAtomics {
    fn new() -> Self {
        Self {
            version: AtomicU64::new(0),
            state: AtomicU8::new(DeckState::Empty as u8),
            origin: AtomicU64::new(0f64.to_bits()),
            reference: AtomicU64::new(0f64.to_bits()),
            rate: AtomicU32::new(1.0f32.to_bits()),
            loop_start: AtomicU64::new(0f64.to_bits()),
            loop_end: AtomicU64::new(0f64.to_bits()),
            loop_active: AtomicBool::new(false),
            duration: AtomicU64::new(0f64.to_bits()),
        }
    }

    /// Run a multi-word transport update under the version counter
    fn transition<F: FnOnce(&Self)>(&self, f: F) {
        self.version.fetch_add(1, Ordering::Relaxed);
        f(self);
        self.version.fetch_add(1, Ordering::Release);
    }

    pub fn state(&self) -> DeckState {
        match self.state.load(Ordering::Relaxed) {
            0 => DeckState::Empty,
            1 => DeckState::Loaded,
            2 => DeckState::Playing,
            3 => DeckState::Paused,
            _ => DeckState::Stopped,
        }
    }

    fn set_state(&self, state: DeckState) {
        self.state.store(state as u8, Ordering::Relaxed);
    }

    fn origin(&self) -> f64 {
        f64::from_bits(self.origin.load(Ordering::Relaxed))
    }

    fn set_origin(&self, secs: f64) {
        self.origin.store(secs.to_bits(), Ordering::Relaxed);
    }

    fn reference(&self) -> f64 {
        f64::from_bits(self.reference.load(Ordering::Relaxed))
    }

    fn set_reference(&self, secs: f64) {
        self.reference.store(secs.to_bits(), Ordering::Relaxed);
    }

    pub fn rate(&self) -> f32 {
        f32::from_bits(self.rate.load(Ordering::Relaxed))
    }

    fn set_rate(&self, rate: f32) {
        self.rate.store(rate.to_bits(), Ordering::Relaxed);
    }

    pub fn loop_active(&self) -> bool {
        self.loop_active.load(Ordering::Relaxed)
    }

    pub fn loop_bounds(&self) -> (f64, f64) {
        (
            f64::from_bits(self.loop_start.load(Ordering::Relaxed)),
            f64::from_bits(self.loop_end.load(Ordering::Relaxed)),
        )
    }

    pub fn duration(&self) -> f64 {
        f64::from_bits(self.duration.load(Ordering::Relaxed))
    }

    /// Derive the current position from a clock reading
    ///
    /// While playing the position advances from the origin at the playback
    /// rate; when looping it wraps at the track duration, otherwise it
    /// clamps there. Stopped, paused and loaded states report the origin.
    /// Retries until a stable snapshot is read, so a concurrent transition
    /// can never yield a position mixing old and new anchors.
    pub fn position(&self, clock_secs: f64) -> f64 {
        loop {
            let before = self.version.load(Ordering::Acquire);
            let state = self.state();
            let origin = self.origin();
            let reference = self.reference();
            let rate = self.rate() as f64;
            let duration = self.duration();
            let loop_active = self.loop_active();
            let after = self.version.load(Ordering::Acquire);
            if before != after || before & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }

            if state != DeckState::Playing {
                return origin;
            }
            let elapsed = (clock_secs - reference).max(0.0);
            let raw = origin + elapsed * rate;
            if duration <= 0.0 {
                return 0.0;
            }
            return if loop_active {
                raw % duration
            } else {
                raw.min(duration)
            };
        }
    }
}

/// One playback deck
pub struct Deck {
    id: DeckId,
    track: Option<SharedTrack>,
    transport: Arc<TransportAtomics>,
    cue_points: Vec<f64>,
    chain: EffectChain,
    clock: EngineClock,
}

impl Deck {
    pub fn new(id: DeckId, clock: EngineClock) -> Self {
        let sample_rate = clock.sample_rate();
        Self {
            id,
            track: None,
            transport: Arc::new(TransportAtomics::new()),
            cue_points: Vec::new(),
            chain: EffectChain::new(sample_rate),
            clock,
        }
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    /// Shared handle to the transport snapshot for lock-free readers
    pub fn transport(&self) -> Arc<TransportAtomics> {
        Arc::clone(&self.transport)
    }

    pub fn state(&self) -> DeckState {
        self.transport.state()
    }

    pub fn track(&self) -> Option<&SharedTrack> {
        self.track.as_ref()
    }

    /// Load a track, replacing any previous one
    ///
    /// Any ongoing playback stops, position resets to zero, the loop is
    /// cleared and spans the whole track, and effect tails are flushed.
    pub fn load_track(&mut self, track: SharedTrack) {
        let duration = track.duration();
        log::info!(
            "deck {}: loaded track, {:.1}s at {} Hz",
            self.id,
            duration,
            track.sample_rate()
        );
        self.track = Some(track);
        self.cue_points.clear();
        self.chain.reset();
        let now = self.clock.seconds();
        self.transport.transition(|t| {
            t.set_origin(0.0);
            t.set_reference(now);
            t.set_rate(1.0);
            t.loop_start.store(0f64.to_bits(), Ordering::Relaxed);
            t.loop_end.store(duration.to_bits(), Ordering::Relaxed);
            t.loop_active.store(false, Ordering::Relaxed);
            t.duration.store(duration.to_bits(), Ordering::Relaxed);
            t.set_state(DeckState::Loaded);
        });
    }

    /// Start or resume playback from the stored position
    ///
    /// No-op if already playing or if the deck is empty.
    pub fn play(&mut self) {
        match self.transport.state() {
            DeckState::Empty | DeckState::Playing => {}
            _ => {
                let now = self.clock.seconds();
                self.transport.transition(|t| {
                    t.set_reference(now);
                    t.set_state(DeckState::Playing);
                });
                log::debug!("deck {}: play at {:.3}s", self.id, self.transport.origin());
            }
        }
    }

    /// Pause, keeping the current position
    pub fn pause(&mut self) {
        if self.transport.state() == DeckState::Playing {
            let pos = self.transport.position(self.clock.seconds());
            self.transport.transition(|t| {
                t.set_origin(pos);
                t.set_state(DeckState::Paused);
            });
        }
    }

    /// Stop, keeping the stored position
    pub fn stop(&mut self) {
        match self.transport.state() {
            DeckState::Empty => {}
            DeckState::Playing => {
                let pos = self.transport.position(self.clock.seconds());
                self.transport.transition(|t| {
                    t.set_origin(pos);
                    t.set_state(DeckState::Stopped);
                });
            }
            _ => self.transport.set_state(DeckState::Stopped),
        }
    }

    /// Jump to a position in seconds, clamped to the track
    ///
    /// A playing deck keeps playing from the new position. No-op on an
    /// empty deck.
    pub fn seek(&mut self, seconds: f64) {
        if self.transport.state() == DeckState::Empty {
            return;
        }
        let clamped = seconds.clamp(0.0, self.transport.duration());
        let now = self.clock.seconds();
        self.transport.transition(|t| {
            t.set_origin(clamped);
            t.set_reference(now);
        });
    }

    /// Change the playback rate without disturbing the position
    pub fn set_playback_rate(&mut self, rate: f32) -> Result<(), EngineError> {
        if !(rate.is_finite() && rate > 0.0) {
            return Err(EngineError::InvalidArgument("playback rate must be positive"));
        }
        if self.transport.state() == DeckState::Playing {
            // Re-anchor so the rate change applies from here, not retroactively
            let now = self.clock.seconds();
            let pos = self.transport.position(now);
            self.transport.transition(|t| {
                t.set_origin(pos);
                t.set_reference(now);
                t.set_rate(rate);
            });
        } else {
            self.transport.set_rate(rate);
        }
        Ok(())
    }

    /// Enable or disable looping, optionally updating the bounds
    pub fn set_loop(
        &mut self,
        enabled: bool,
        start: Option<f64>,
        end: Option<f64>,
    ) -> Result<(), EngineError> {
        if self.transport.state() == DeckState::Empty {
            return Err(EngineError::NotLoaded(self.id));
        }
        let duration = self.transport.duration();
        let (cur_start, cur_end) = self.transport.loop_bounds();
        let new_start = start.unwrap_or(cur_start);
        let new_end = end.unwrap_or(cur_end);
        if !(new_start >= 0.0 && new_start < new_end && new_end <= duration) {
            return Err(EngineError::InvalidArgument(
                "loop bounds must satisfy 0 <= start < end <= duration",
            ));
        }
        self.transport.transition(|t| {
            t.loop_start.store(new_start.to_bits(), Ordering::Relaxed);
            t.loop_end.store(new_end.to_bits(), Ordering::Relaxed);
            t.loop_active.store(enabled, Ordering::Relaxed);
        });
        Ok(())
    }

    /// Store a cue point at a position in seconds
    pub fn add_cue_point(&mut self, seconds: f64) -> Result<usize, EngineError> {
        if self.transport.state() == DeckState::Empty {
            return Err(EngineError::NotLoaded(self.id));
        }
        let clamped = seconds.clamp(0.0, self.transport.duration());
        self.cue_points.push(clamped);
        Ok(self.cue_points.len() - 1)
    }

    /// Jump to a stored cue point
    pub fn jump_to_cue(&mut self, index: usize) -> Result<(), EngineError> {
        let target = *self
            .cue_points
            .get(index)
            .ok_or(EngineError::InvalidArgument("no such cue point"))?;
        self.seek(target);
        Ok(())
    }

    pub fn cue_points(&self) -> &[f64] {
        &self.cue_points
    }

    pub fn effects(&mut self) -> &mut EffectChain {
        &mut self.chain
    }

    /// Filter state for transition planning and snapshots
    pub fn filter_state(&self) -> (FilterKind, f32) {
        (self.chain.filter_kind(), self.chain.filter_cutoff())
    }

    /// Current position in seconds
    pub fn position(&self) -> f64 {
        self.transport.position(self.clock.seconds())
    }

    /// Render one block of post-effect deck output
    ///
    /// `pre_gain` is the crossfader contribution, applied before the effect
    /// chain so echo and reverb tails fade with the fader. The buffer length
    /// selects the block size.
    pub fn render(&mut self, buffer: &mut StereoBuffer, pre_gain: f32) {
        buffer.fill_silence();

        let playing = self.transport.state() == DeckState::Playing;
        if playing {
            if let Some(track) = &self.track {
                let rate = self.transport.rate() as f64;
                let engine_sr = self.clock.sample_rate() as f64;
                let pos0 = self.transport.position(self.clock.seconds());
                let duration = track.duration();
                let loop_active = self.transport.loop_active();
                let (loop_start, loop_end) = self.transport.loop_bounds();
                let mut ended = false;

                for (i, sample) in buffer.iter_mut().enumerate() {
                    let mut t = pos0 + i as f64 * rate / engine_sr;
                    if loop_active {
                        let span = loop_end - loop_start;
                        if t >= loop_end && span > 0.0 {
                            t = loop_start + (t - loop_start) % span;
                        }
                    } else if t >= duration {
                        ended = true;
                        break;
                    }
                    *sample = track.sample_at(t) * pre_gain;
                }

                if ended {
                    self.transport.transition(|t| {
                        t.set_origin(0.0);
                        t.set_state(DeckState::Stopped);
                    });
                    log::debug!("deck {}: reached end of track", self.id);
                }
            }
        }

        // Effects always run so tails ring out after pause or stop
        self.chain.process(buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrackBuffer;
    use std::sync::Arc;

    fn test_track(seconds: f64, sample_rate: u32) -> SharedTrack {
        let frames = (seconds * sample_rate as f64) as usize;
        let mono: Vec<f32> = (0..frames).map(|i| (i as f32 * 0.05).sin() * 0.5).collect();
        Arc::new(TrackBuffer::from_mono(mono, sample_rate))
    }

    fn deck_with_track(seconds: f64) -> (Deck, EngineClock) {
        let clock = EngineClock::new(8000);
        let mut deck = Deck::new(DeckId::A, clock.clone());
        deck.load_track(test_track(seconds, 8000));
        (deck, clock)
    }

    #[test]
    fn test_empty_deck_transport_is_a_no_op() {
        let clock = EngineClock::new(8000);
        let mut deck = Deck::new(DeckId::A, clock.clone());
        deck.play();
        deck.seek(1.0);
        clock.advance(8000);
        assert_eq!(deck.state(), DeckState::Empty);
        assert_eq!(deck.position(), 0.0);
        assert!(matches!(
            deck.add_cue_point(1.0),
            Err(EngineError::NotLoaded(DeckId::A))
        ));
    }

    #[test]
    fn test_position_never_mixes_anchors_across_a_transition() {
        let transport = Arc::new(TransportAtomics::new());
        transport.duration.store(5000f64.to_bits(), Ordering::Relaxed);
        transport.set_state(DeckState::Playing);

        let writer = {
            let t = Arc::clone(&transport);
            std::thread::spawn(move || {
                for i in 0..20_000u32 {
                    let (origin, reference) = if i % 2 == 0 {
                        (0.0, 0.0)
                    } else {
                        (1000.0, 1000.0)
                    };
                    t.transition(|t| {
                        t.set_origin(origin);
                        t.set_reference(reference);
                    });
                }
            })
        };

        // Both anchor pairs derive position 1000 at clock 1000 s; a read
        // mixing old and new anchors would derive 0 or 2000 instead.
        for _ in 0..20_000 {
            assert_eq!(transport.position(1000.0), 1000.0);
        }
        writer.join().unwrap();
    }

    #[test]
    fn test_position_advances_with_clock() {
        let (mut deck, clock) = deck_with_track(10.0);
        deck.play();
        clock.advance(8000 * 2);
        assert!((deck.position() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_pause_freezes_position() {
        let (mut deck, clock) = deck_with_track(10.0);
        deck.play();
        clock.advance(8000 * 3);
        deck.pause();
        clock.advance(8000 * 5);
        assert_eq!(deck.state(), DeckState::Paused);
        assert!((deck.position() - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_seek_then_position_round_trips() {
        let (mut deck, clock) = deck_with_track(10.0);
        deck.seek(4.5);
        assert!((deck.position() - 4.5).abs() < 1e-9);
        deck.play();
        clock.advance(8000);
        assert!((deck.position() - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_seek_clamps_to_duration() {
        let (mut deck, _clock) = deck_with_track(10.0);
        deck.seek(999.0);
        assert!((deck.position() - 10.0).abs() < 1e-9);
        deck.seek(-5.0);
        assert_eq!(deck.position(), 0.0);
    }

    #[test]
    fn test_rate_change_does_not_jump_position() {
        let (mut deck, clock) = deck_with_track(10.0);
        deck.play();
        clock.advance(8000 * 2);
        deck.set_playback_rate(2.0).unwrap();
        assert!((deck.position() - 2.0).abs() < 1e-9);
        clock.advance(8000);
        assert!((deck.position() - 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_rate_rejected() {
        let (mut deck, _clock) = deck_with_track(10.0);
        assert!(deck.set_playback_rate(0.0).is_err());
        assert!(deck.set_playback_rate(-1.0).is_err());
        assert!(deck.set_playback_rate(f32::NAN).is_err());
    }

    #[test]
    fn test_loop_bounds_validated() {
        let (mut deck, _clock) = deck_with_track(10.0);
        assert!(deck.set_loop(true, Some(2.0), Some(1.0)).is_err());
        assert!(deck.set_loop(true, Some(0.0), Some(11.0)).is_err());
        assert!(deck.set_loop(true, Some(2.0), Some(4.0)).is_ok());
        assert!(deck.transport().loop_active());
    }

    #[test]
    fn test_looping_position_wraps() {
        let (mut deck, clock) = deck_with_track(10.0);
        deck.set_loop(true, Some(0.0), Some(10.0)).unwrap();
        deck.play();
        clock.advance(8000 * 13);
        assert!((deck.position() - 3.0).abs() < 1e-9);
        assert_eq!(deck.state(), DeckState::Playing);
    }

    #[test]
    fn test_natural_end_stops_at_zero() {
        let (mut deck, clock) = deck_with_track(0.5);
        deck.play();
        clock.advance(8000);

        let mut block = StereoBuffer::silence(256);
        deck.render(&mut block, 1.0);

        assert_eq!(deck.state(), DeckState::Stopped);
        assert_eq!(deck.position(), 0.0);
    }

    #[test]
    fn test_render_loops_inside_region() {
        let (mut deck, clock) = deck_with_track(2.0);
        deck.set_loop(true, Some(0.5), Some(1.0)).unwrap();
        deck.seek(0.9);
        deck.play();
        clock.advance((0.9 * 8000.0) as usize);

        // Block spans the loop end; playback must keep producing audio
        let mut block = StereoBuffer::silence(4096);
        deck.render(&mut block, 1.0);
        assert!(block.peak() > 0.0);
        assert_eq!(deck.state(), DeckState::Playing);
    }

    #[test]
    fn test_cue_points_round_trip() {
        let (mut deck, _clock) = deck_with_track(10.0);
        let idx = deck.add_cue_point(6.25).unwrap();
        deck.jump_to_cue(idx).unwrap();
        assert!((deck.position() - 6.25).abs() < 1e-9);
        assert!(deck.jump_to_cue(42).is_err());
    }

    #[test]
    fn test_load_resets_transport() {
        let (mut deck, clock) = deck_with_track(10.0);
        deck.play();
        clock.advance(8000 * 4);
        deck.load_track(test_track(5.0, 8000));
        assert_eq!(deck.state(), DeckState::Loaded);
        assert_eq!(deck.position(), 0.0);
        assert!((deck.transport().duration() - 5.0).abs() < 1e-9);
    }
}
