//! The mixing engine
//!
//! Owns both decks, the mixer, the analysers and the recording tap, and
//! renders the summed output one block at a time. All buffers are
//! allocated up front; `process` performs no allocation, locking or
//! blocking system calls.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::effect::FilterKind;
use crate::engine::analyser::{AnalyserTap, ANALYSER_BINS};
use crate::engine::deck::{Deck, EngineClock, TransportAtomics};
use crate::engine::mixer::Mixer;
use crate::error::EngineError;
use crate::record::{RecordingTap, RECORD_RING_CAPACITY};
use crate::types::{DeckId, DeckState, SharedTrack, StereoBuffer, MAX_BUFFER_SIZE, NUM_DECKS};

/// Read-only view of one deck's state for displays
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeckSnapshot {
    pub state: DeckState,
    pub position: f64,
    pub duration: f64,
    pub rate: f32,
    pub loop_active: bool,
    pub loop_bounds: (f64, f64),
}

pub struct MixEngine {
    clock: EngineClock,
    decks: [Deck; NUM_DECKS],
    mixer: Mixer,
    analysers: [AnalyserTap; NUM_DECKS],
    deck_buffers: [StereoBuffer; NUM_DECKS],
    recording: Option<rtrb::Producer<crate::types::StereoSample>>,
    record_overruns: Arc<AtomicU64>,
    disposed: bool,
}

impl MixEngine {
    pub fn new(sample_rate: u32) -> Self {
        let clock = EngineClock::new(sample_rate);
        Self {
            decks: [
                Deck::new(DeckId::A, clock.clone()),
                Deck::new(DeckId::B, clock.clone()),
            ],
            clock,
            mixer: Mixer::new(),
            analysers: [AnalyserTap::new(), AnalyserTap::new()],
            deck_buffers: [
                StereoBuffer::silence(MAX_BUFFER_SIZE),
                StereoBuffer::silence(MAX_BUFFER_SIZE),
            ],
            recording: None,
            record_overruns: Arc::new(AtomicU64::new(0)),
            disposed: false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.clock.sample_rate()
    }

    fn deck(&self, id: DeckId) -> &Deck {
        &self.decks[id.index()]
    }

    fn deck_mut(&mut self, id: DeckId) -> &mut Deck {
        &mut self.decks[id.index()]
    }

    // Transport

    pub fn load_track(&mut self, id: DeckId, track: SharedTrack) {
        self.deck_mut(id).load_track(track);
    }

    pub fn play(&mut self, id: DeckId) {
        self.deck_mut(id).play();
    }

    pub fn pause(&mut self, id: DeckId) {
        self.deck_mut(id).pause();
    }

    pub fn stop(&mut self, id: DeckId) {
        self.deck_mut(id).stop();
    }

    pub fn seek(&mut self, id: DeckId, seconds: f64) {
        self.deck_mut(id).seek(seconds);
    }

    pub fn set_playback_rate(&mut self, id: DeckId, rate: f32) -> Result<(), EngineError> {
        self.deck_mut(id).set_playback_rate(rate)
    }

    pub fn set_loop(
        &mut self,
        id: DeckId,
        enabled: bool,
        start: Option<f64>,
        end: Option<f64>,
    ) -> Result<(), EngineError> {
        self.deck_mut(id).set_loop(enabled, start, end)
    }

    pub fn add_cue_point(&mut self, id: DeckId, seconds: f64) -> Result<usize, EngineError> {
        self.deck_mut(id).add_cue_point(seconds)
    }

    pub fn jump_to_cue(&mut self, id: DeckId, index: usize) -> Result<(), EngineError> {
        self.deck_mut(id).jump_to_cue(index)
    }

    pub fn cue_points(&self, id: DeckId) -> &[f64] {
        self.deck(id).cue_points()
    }

    // Mixer

    pub fn set_crossfader(&mut self, position: f32) {
        self.mixer.set_crossfader(position);
    }

    pub fn crossfader(&self) -> f32 {
        self.mixer.crossfader()
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        self.mixer.set_master_volume(volume);
    }

    pub fn master_volume(&self) -> f32 {
        self.mixer.master_volume()
    }

    // Effects

    pub fn set_filter(&mut self, id: DeckId, kind: FilterKind, cutoff: f32) {
        self.deck_mut(id).effects().set_filter(kind, cutoff);
    }

    pub fn set_echo(&mut self, id: DeckId, time_secs: f32, feedback: f32, mix: f32) {
        self.deck_mut(id).effects().set_echo(time_secs, feedback, mix);
    }

    pub fn set_reverb(&mut self, id: DeckId, mix: f32) {
        self.deck_mut(id).effects().set_reverb(mix);
    }

    pub fn filter_state(&self, id: DeckId) -> (FilterKind, f32) {
        self.deck(id).filter_state()
    }

    // State readers

    pub fn deck_state(&self, id: DeckId) -> DeckState {
        self.deck(id).state()
    }

    pub fn current_position(&self, id: DeckId) -> f64 {
        self.deck(id).position()
    }

    /// Shared transport handle for lock-free position reads off-thread
    pub fn transport(&self, id: DeckId) -> Arc<TransportAtomics> {
        self.deck(id).transport()
    }

    pub fn deck_snapshot(&self, id: DeckId) -> DeckSnapshot {
        let transport = self.deck(id).transport();
        DeckSnapshot {
            state: transport.state(),
            position: transport.position(self.clock.seconds()),
            duration: transport.duration(),
            rate: transport.rate(),
            loop_active: transport.loop_active(),
            loop_bounds: transport.loop_bounds(),
        }
    }

    /// Fill `out` with the byte-scaled spectrum of one deck
    pub fn analyser_data(&mut self, id: DeckId, out: &mut [u8; ANALYSER_BINS]) {
        self.analysers[id.index()].frequency_data(out);
    }

    // Recording

    /// Begin capturing the master output
    ///
    /// Returns the consumer half of the ring; feed it to a `MixRecorder`
    /// or drain it yourself. A second call without `stop_recording` fails.
    pub fn start_recording(&mut self) -> Result<RecordingTap, EngineError> {
        if self.recording.is_some() {
            return Err(EngineError::AlreadyRecording);
        }
        let (producer, consumer) = rtrb::RingBuffer::new(RECORD_RING_CAPACITY);
        self.recording = Some(producer);
        self.record_overruns.store(0, Ordering::Relaxed);
        log::info!("recording started");
        Ok(RecordingTap::new(consumer, self.clock.sample_rate()))
    }

    /// Stop feeding the recording ring
    pub fn stop_recording(&mut self) {
        if self.recording.take().is_some() {
            let overruns = self.record_overruns.load(Ordering::Relaxed);
            if overruns > 0 {
                log::warn!("recording dropped {overruns} frames");
            }
            log::info!("recording stopped");
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording.is_some()
    }

    /// Frames dropped because the recording consumer fell behind
    pub fn record_overruns(&self) -> u64 {
        self.record_overruns.load(Ordering::Relaxed)
    }

    /// Render one block of master output
    ///
    /// Blocks larger than `MAX_BUFFER_SIZE` frames are rendered in
    /// `MAX_BUFFER_SIZE` chunks. Deck gains follow the equal-power
    /// crossfader and are applied before each deck's effect chain so tails
    /// fade with the fader.
    pub fn process(&mut self, out: &mut StereoBuffer) {
        if self.disposed || out.is_empty() {
            out.fill_silence();
            return;
        }

        let (gain_a, gain_b) = self.mixer.gains();
        let gains = [gain_a, gain_b];
        let total = out.len();
        let mut offset = 0;
        while offset < total {
            let frames = (total - offset).min(MAX_BUFFER_SIZE);
            for i in 0..NUM_DECKS {
                self.deck_buffers[i].set_len_from_capacity(frames);
                self.decks[i].render(&mut self.deck_buffers[i], gains[i]);
                self.analysers[i].feed(&self.deck_buffers[i]);
            }

            self.mixer.mix_frames(
                self.deck_buffers[0].as_slice(),
                self.deck_buffers[1].as_slice(),
                &mut out.as_mut_slice()[offset..offset + frames],
            );

            self.clock.advance(frames);
            offset += frames;
        }

        if let Some(producer) = &mut self.recording {
            for sample in out.iter() {
                if producer.push(*sample).is_err() {
                    self.record_overruns.fetch_add(1, Ordering::Relaxed);
                }
            }
        }
    }

    /// Release the engine; further processing outputs silence
    ///
    /// Idempotent. Ongoing recording taps see their producer dropped and
    /// drain whatever is queued.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.stop_recording();
        for deck in &mut self.decks {
            deck.stop();
        }
        log::info!("engine disposed");
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}
