//! Deck filter - single-stage biquad lowpass/highpass
//!
//! One kind is active at a time; switching kind keeps the cutoff.

use serde::{Deserialize, Serialize};

use crate::types::StereoBuffer;

/// Cutoff frequency range in Hz
pub const MIN_CUTOFF: f32 = 20.0;
pub const MAX_CUTOFF: f32 = 20000.0;

/// Fixed filter resonance
const FILTER_Q: f32 = 1.0;

/// Active filter kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterKind {
    #[default]
    Lowpass,
    Highpass,
}

/// Biquad filter state (direct form 1, stereo)
#[derive(Debug, Clone, Default)]
struct BiquadState {
    x1_l: f32, x2_l: f32, y1_l: f32, y2_l: f32,
    x1_r: f32, x2_r: f32, y1_r: f32, y2_r: f32,
}

impl BiquadState {
    #[inline]
    fn process(&mut self, input_l: f32, input_r: f32, coeffs: &BiquadCoeffs) -> (f32, f32) {
        // Left channel
        let out_l = coeffs.b0 * input_l + coeffs.b1 * self.x1_l + coeffs.b2 * self.x2_l
                  - coeffs.a1 * self.y1_l - coeffs.a2 * self.y2_l;
        self.x2_l = self.x1_l;
        self.x1_l = input_l;
        self.y2_l = self.y1_l;
        self.y1_l = out_l;

        // Right channel
        let out_r = coeffs.b0 * input_r + coeffs.b1 * self.x1_r + coeffs.b2 * self.x2_r
                  - coeffs.a1 * self.y1_r - coeffs.a2 * self.y2_r;
        self.x2_r = self.x1_r;
        self.x1_r = input_r;
        self.y2_r = self.y1_r;
        self.y1_r = out_r;

        (out_l, out_r)
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Biquad filter coefficients (RBJ cookbook)
#[derive(Debug, Clone)]
struct BiquadCoeffs {
    b0: f32, b1: f32, b2: f32,
    a1: f32, a2: f32,
}

impl BiquadCoeffs {
    fn lowpass(freq: f32, q: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha;
        Self {
            b0: ((1.0 - cos_w0) / 2.0) / a0,
            b1: (1.0 - cos_w0) / a0,
            b2: ((1.0 - cos_w0) / 2.0) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }

    fn highpass(freq: f32, q: f32, sample_rate: f32) -> Self {
        let w0 = 2.0 * std::f32::consts::PI * freq / sample_rate;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);

        let a0 = 1.0 + alpha;
        Self {
            b0: ((1.0 + cos_w0) / 2.0) / a0,
            b1: (-(1.0 + cos_w0)) / a0,
            b2: ((1.0 + cos_w0) / 2.0) / a0,
            a1: (-2.0 * cos_w0) / a0,
            a2: (1.0 - alpha) / a0,
        }
    }
}

/// Single-stage sweepable filter at the head of the effect chain
#[derive(Debug, Clone)]
pub struct DeckFilter {
    kind: FilterKind,
    cutoff: f32,
    sample_rate: f32,
    coeffs: BiquadCoeffs,
    state: BiquadState,
    dirty: bool,
}

impl DeckFilter {
    /// Create a wide-open lowpass filter
    pub fn new(sample_rate: u32) -> Self {
        let sample_rate = sample_rate as f32;
        Self {
            kind: FilterKind::Lowpass,
            cutoff: MAX_CUTOFF,
            sample_rate,
            coeffs: BiquadCoeffs::lowpass(MAX_CUTOFF.min(sample_rate * 0.45), FILTER_Q, sample_rate),
            state: BiquadState::default(),
            dirty: false,
        }
    }

    /// Set filter kind and cutoff; out-of-range cutoff clamps to [20, 20000] Hz
    pub fn set(&mut self, kind: FilterKind, cutoff: f32) {
        self.kind = kind;
        self.cutoff = cutoff.clamp(MIN_CUTOFF, MAX_CUTOFF);
        self.dirty = true;
    }

    /// Current filter kind
    pub fn kind(&self) -> FilterKind {
        self.kind
    }

    /// Current cutoff frequency in Hz
    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    fn update_coeffs(&mut self) {
        if !self.dirty {
            return;
        }
        // Keep the corner below Nyquist regardless of engine rate
        let freq = self.cutoff.min(self.sample_rate * 0.45);
        self.coeffs = match self.kind {
            FilterKind::Lowpass => BiquadCoeffs::lowpass(freq, FILTER_Q, self.sample_rate),
            FilterKind::Highpass => BiquadCoeffs::highpass(freq, FILTER_Q, self.sample_rate),
        };
        self.dirty = false;
    }

    /// Process a buffer in place
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        self.update_coeffs();
        for sample in buffer.iter_mut() {
            let (l, r) = self.state.process(sample.left, sample.right, &self.coeffs);
            sample.left = l;
            sample.right = r;
        }
    }

    /// Clear filter memory
    pub fn reset(&mut self) {
        self.state.reset();
    }
}
