//! Common types for Tandem
//!
//! Fundamental audio types shared by the engine and the analysis crate:
//! stereo sample/buffer handling, deck identity and transport state, and
//! the decoded-PCM track buffer supplied by the host.

use std::ops::{Index, IndexMut};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Default sample rate (48kHz - standard professional audio rate)
/// This is the default; the actual rate is passed to `MixEngine::new`.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Number of decks in the engine
pub const NUM_DECKS: usize = 2;

/// Maximum buffer size to pre-allocate for real-time safety
/// Covers all common callback configurations (64, 128, 256, 512, 1024, 2048, 4096)
pub const MAX_BUFFER_SIZE: usize = 8192;

/// Audio sample type (32-bit float for processing)
pub type Sample = f32;

/// Deck identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeckId {
    A,
    B,
}

impl DeckId {
    /// Both decks in order
    pub const ALL: [DeckId; NUM_DECKS] = [DeckId::A, DeckId::B];

    /// The other deck
    pub fn other(&self) -> DeckId {
        match self {
            DeckId::A => DeckId::B,
            DeckId::B => DeckId::A,
        }
    }

    /// Array index for this deck
    #[inline]
    pub fn index(&self) -> usize {
        match self {
            DeckId::A => 0,
            DeckId::B => 1,
        }
    }
}

impl std::fmt::Display for DeckId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeckId::A => write!(f, "A"),
            DeckId::B => write!(f, "B"),
        }
    }
}

/// Transport state for a deck
///
/// `Empty → Loaded → {Playing, Paused, Stopped}`. A deck without a track
/// is Empty and cannot transition to Playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeckState {
    #[default]
    Empty,
    Loaded,
    Playing,
    Paused,
    Stopped,
}

impl DeckState {
    /// Whether a track is present in this state
    pub fn has_track(&self) -> bool {
        !matches!(self, DeckState::Empty)
    }
}

/// A single stereo sample (left and right channels)
///
/// Uses `#[repr(C)]` to ensure predictable memory layout: [left, right].
/// This enables zero-copy conversion between `&[StereoSample]` and `&[f32]`
/// (interleaved format) using bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Get the peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

impl std::ops::MulAssign<Sample> for StereoSample {
    #[inline]
    fn mul_assign(&mut self, factor: Sample) {
        self.left *= factor;
        self.right *= factor;
    }
}

/// A buffer of stereo samples
///
/// Primary processing buffer. Pre-allocate to `MAX_BUFFER_SIZE` and use
/// `set_len_from_capacity` on the render path to stay allocation-free.
#[derive(Debug, Clone)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    /// Create a buffer from separate left and right channel slices
    pub fn from_channels(left: &[Sample], right: &[Sample]) -> Self {
        assert_eq!(left.len(), right.len(), "Channel lengths must match");
        let samples = left
            .iter()
            .zip(right.iter())
            .map(|(&l, &r)| StereoSample::new(l, r))
            .collect();
        Self { samples }
    }

    /// Get the number of stereo samples in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Panics in debug builds if new_len > capacity. Fills newly exposed
    /// elements with silence.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        let current_len = self.samples.len();
        if new_len > current_len {
            debug_assert!(
                new_len <= self.samples.capacity(),
                "set_len_from_capacity called with len > capacity"
            );
            self.samples.resize(new_len, StereoSample::silence());
        } else {
            self.samples.truncate(new_len);
        }
    }

    /// Fill the buffer with silence
    pub fn fill_silence(&mut self) {
        self.samples.fill(StereoSample::silence());
    }

    /// Get a slice of the samples
    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    /// Get a mutable slice of the samples
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    /// Get a zero-copy view of samples as interleaved f32 [L, R, L, R, ...]
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }

    /// Get an iterator over the samples
    pub fn iter(&self) -> impl Iterator<Item = &StereoSample> {
        self.samples.iter()
    }

    /// Get a mutable iterator over the samples
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StereoSample> {
        self.samples.iter_mut()
    }

    /// Get the peak amplitude in the buffer
    pub fn peak(&self) -> Sample {
        self.samples.iter().map(|s| s.peak()).fold(0.0, Sample::max)
    }
}

impl Index<usize> for StereoBuffer {
    type Output = StereoSample;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.samples[index]
    }
}

impl IndexMut<usize> for StereoBuffer {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.samples[index]
    }
}

impl Default for StereoBuffer {
    fn default() -> Self {
        Self { samples: Vec::new() }
    }
}

/// Decoded PCM supplied by the host's decoder
///
/// Channel-separated float samples at a known sample rate. Tracks are
/// immutable once constructed and shared into a deck as `Arc<TrackBuffer>`;
/// the deck holds the only playing reference.
#[derive(Debug, Clone)]
pub struct TrackBuffer {
    channels: Vec<Vec<Sample>>,
    sample_rate: u32,
}

impl TrackBuffer {
    /// Create a track buffer from channel-separated PCM
    ///
    /// All channels must have equal length. At least one channel is required.
    pub fn new(channels: Vec<Vec<Sample>>, sample_rate: u32) -> Self {
        assert!(!channels.is_empty(), "TrackBuffer requires at least one channel");
        assert!(sample_rate > 0, "TrackBuffer requires a positive sample rate");
        let len = channels[0].len();
        assert!(
            channels.iter().all(|c| c.len() == len),
            "All channels must have equal length"
        );
        Self { channels, sample_rate }
    }

    /// Create a mono track buffer
    pub fn from_mono(samples: Vec<Sample>, sample_rate: u32) -> Self {
        Self::new(vec![samples], sample_rate)
    }

    /// Number of channels
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Channel data by index
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.channels[index]
    }

    /// Length in frames
    pub fn frames(&self) -> usize {
        self.channels[0].len()
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Duration in seconds
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// Read a stereo frame at a fractional position (seconds) with linear
    /// interpolation
    ///
    /// Mono tracks feed both channels; out-of-range positions read silence.
    #[inline]
    pub fn sample_at(&self, seconds: f64) -> StereoSample {
        if seconds < 0.0 {
            return StereoSample::silence();
        }
        let pos = seconds * self.sample_rate as f64;
        let idx = pos as usize;
        if idx + 1 >= self.frames() {
            return StereoSample::silence();
        }
        let frac = (pos - idx as f64) as f32;

        let left_ch = &self.channels[0];
        let right_ch = if self.channels.len() > 1 {
            &self.channels[1]
        } else {
            &self.channels[0]
        };

        let left = left_ch[idx] + (left_ch[idx + 1] - left_ch[idx]) * frac;
        let right = right_ch[idx] + (right_ch[idx + 1] - right_ch[idx]) * frac;
        StereoSample::new(left, right)
    }
}

/// Shared read-only track handle
pub type SharedTrack = Arc<TrackBuffer>;
