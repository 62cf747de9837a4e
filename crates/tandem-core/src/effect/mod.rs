//! Per-deck effect chain
//!
//! Fixed topology: input → filter → {dry, echo loop, reverb} → sum. The
//! filter is single-stage (one kind active at a time); echo is a bounded
//! feedback delay; reverb convolves a fixed impulse response. All parameter
//! setters are idempotent, order-independent and take effect at the next
//! processed block.

mod echo;
mod filter;
mod reverb;

pub use echo::{Echo, DEFAULT_ECHO_SECONDS, MAX_ECHO_FEEDBACK, MAX_ECHO_SECONDS};
pub use filter::{DeckFilter, FilterKind, MAX_CUTOFF, MIN_CUTOFF};
pub use reverb::{Reverb, REVERB_IR_SECONDS};

use crate::types::{StereoBuffer, MAX_BUFFER_SIZE};

/// Dry attenuation per unit of echo mix
const ECHO_DRY_K: f32 = 0.5;

/// Dry attenuation per unit of reverb mix
const REVERB_DRY_K: f32 = 0.3;

/// The per-deck signal path
///
/// The dry gain is derived from the most recent wet-mix change
/// (`dry = 1 − mix·k`, k = 0.5 for echo and 0.3 for reverb) so overall
/// loudness stays bounded as effects blend in.
pub struct EffectChain {
    filter: DeckFilter,
    echo: Echo,
    reverb: Reverb,
    dry_gain: f32,
    /// Scratch for the reverb wet block (pre-allocated)
    reverb_wet: StereoBuffer,
}

impl EffectChain {
    /// Create a neutral chain: wide-open lowpass, echo and reverb silent
    pub fn new(sample_rate: u32) -> Self {
        Self {
            filter: DeckFilter::new(sample_rate),
            echo: Echo::new(sample_rate),
            reverb: Reverb::new(sample_rate),
            dry_gain: 1.0,
            reverb_wet: StereoBuffer::silence(MAX_BUFFER_SIZE),
        }
    }

    /// Set filter kind and cutoff (clamped to [20, 20000] Hz)
    pub fn set_filter(&mut self, kind: FilterKind, cutoff: f32) {
        self.filter.set(kind, cutoff);
    }

    /// Set echo delay time, feedback and wet mix; updates the dry gain
    pub fn set_echo(&mut self, time_secs: f32, feedback: f32, mix: f32) {
        self.echo.set(time_secs, feedback, mix);
        self.dry_gain = 1.0 - self.echo.mix() * ECHO_DRY_K;
    }

    /// Set reverb wet mix; updates the dry gain
    pub fn set_reverb(&mut self, mix: f32) {
        self.reverb.set_mix(mix);
        self.dry_gain = 1.0 - self.reverb.mix() * REVERB_DRY_K;
    }

    /// Current filter kind
    pub fn filter_kind(&self) -> FilterKind {
        self.filter.kind()
    }

    /// Current filter cutoff in Hz
    pub fn filter_cutoff(&self) -> f32 {
        self.filter.cutoff()
    }

    /// Current echo wet mix
    pub fn echo_mix(&self) -> f32 {
        self.echo.mix()
    }

    /// Current reverb wet mix
    pub fn reverb_mix(&self) -> f32 {
        self.reverb.mix()
    }

    /// Current dry gain
    pub fn dry_gain(&self) -> f32 {
        self.dry_gain
    }

    /// Process a buffer in place through filter, then the parallel taps
    pub fn process(&mut self, buffer: &mut StereoBuffer) {
        let len = buffer.len();
        self.filter.process(buffer);

        let reverb_active = self.reverb.mix() > 0.0;
        if reverb_active {
            self.reverb_wet.set_len_from_capacity(len);
            self.reverb.process(buffer, &mut self.reverb_wet);
        }

        let reverb_mix = self.reverb.mix();
        for (i, sample) in buffer.iter_mut().enumerate() {
            let filtered = *sample;
            let echo_tap = self.echo.tick(filtered);
            let mut out = filtered * self.dry_gain + echo_tap;
            if reverb_active {
                out += self.reverb_wet[i] * reverb_mix;
            }
            *sample = out;
        }
    }

    /// Drop all effect memory (delay and convolver tails, filter state)
    pub fn reset(&mut self) {
        self.filter.reset();
        self.echo.reset();
        self.reverb.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    #[test]
    fn test_neutral_chain_passes_signal() {
        let mut chain = EffectChain::new(8000);
        let mut buffer = StereoBuffer::silence(2048);
        for (i, s) in buffer.iter_mut().enumerate() {
            *s = StereoSample::mono((i as f32 * 0.01).sin() * 0.5);
        }
        let before = buffer.peak();
        chain.process(&mut buffer);
        let after = buffer.peak();
        // Wide-open lowpass and zero-mix taps: level is essentially unchanged
        assert!((before - after).abs() < 0.1, "before {before} after {after}");
    }

    #[test]
    fn test_dry_gain_follows_echo_mix() {
        let mut chain = EffectChain::new(8000);
        chain.set_echo(0.375, 0.4, 0.6);
        assert!((chain.dry_gain() - (1.0 - 0.6 * 0.5)).abs() < 1e-6);
    }

    #[test]
    fn test_dry_gain_follows_reverb_mix() {
        let mut chain = EffectChain::new(8000);
        chain.set_reverb(0.5);
        assert!((chain.dry_gain() - (1.0 - 0.5 * 0.3)).abs() < 1e-6);
    }

    #[test]
    fn test_echo_adds_delayed_energy() {
        let sr = 8000;
        let mut chain = EffectChain::new(sr);
        chain.set_echo(0.1, 0.0, 1.0);

        let mut buffer = StereoBuffer::silence(4096);
        buffer[0] = StereoSample::mono(1.0);
        chain.process(&mut buffer);

        let delay_samples = (0.1 * sr as f32) as usize;
        let around_tap: f32 = buffer
            .iter()
            .skip(delay_samples - 2)
            .take(5)
            .map(|s| s.left.abs())
            .sum();
        assert!(around_tap > 0.3, "expected echo tap energy, got {around_tap}");
    }

    #[test]
    fn test_setters_are_order_independent() {
        let mut a = EffectChain::new(8000);
        a.set_filter(FilterKind::Highpass, 900.0);
        a.set_echo(0.25, 0.3, 0.2);

        let mut b = EffectChain::new(8000);
        b.set_echo(0.25, 0.3, 0.2);
        b.set_filter(FilterKind::Highpass, 900.0);

        assert_eq!(a.filter_kind(), b.filter_kind());
        assert_eq!(a.filter_cutoff(), b.filter_cutoff());
        assert_eq!(a.echo_mix(), b.echo_mix());
        assert_eq!(a.dry_gain(), b.dry_gain());
    }
}
