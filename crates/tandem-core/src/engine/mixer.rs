//! Crossfader and master output stage

use std::f32::consts::FRAC_PI_2;

use crate::types::{DeckId, StereoBuffer, StereoSample};

/// Two-deck mixer with an equal-power crossfader
///
/// Fader position 0.0 is full deck A, 1.0 is full deck B. The gain law is
/// `cos(p·π/2)` / `sin(p·π/2)` so the summed power stays constant across
/// the fader travel.
pub struct Mixer {
    crossfader: f32,
    master_volume: f32,
}

impl Default for Mixer {
    fn default() -> Self {
        Self::new()
    }
}

impl Mixer {
    pub fn new() -> Self {
        Self {
            crossfader: 0.5,
            master_volume: 1.0,
        }
    }

    /// Set fader position, clamped to [0, 1]
    pub fn set_crossfader(&mut self, position: f32) {
        self.crossfader = position.clamp(0.0, 1.0);
    }

    pub fn crossfader(&self) -> f32 {
        self.crossfader
    }

    /// Set master output volume, clamped to [0, 1]
    pub fn set_master_volume(&mut self, volume: f32) {
        self.master_volume = volume.clamp(0.0, 1.0);
    }

    pub fn master_volume(&self) -> f32 {
        self.master_volume
    }

    /// Equal-power gains for (deck A, deck B)
    pub fn gains(&self) -> (f32, f32) {
        let angle = self.crossfader * FRAC_PI_2;
        (angle.cos(), angle.sin())
    }

    /// Gain for one deck at the current fader position
    pub fn deck_gain(&self, deck: DeckId) -> f32 {
        let (a, b) = self.gains();
        match deck {
            DeckId::A => a,
            DeckId::B => b,
        }
    }

    /// Sum the deck buffers into `out` and apply the master volume
    ///
    /// Deck gains are applied upstream (before effects); this stage only
    /// mixes and scales.
    pub fn mix_into(&self, deck_a: &StereoBuffer, deck_b: &StereoBuffer, out: &mut StereoBuffer) {
        self.mix_frames(deck_a.as_slice(), deck_b.as_slice(), out.as_mut_slice());
    }

    /// Slice variant of [`mix_into`](Self::mix_into) for writing into a
    /// sub-range of a larger output block
    pub fn mix_frames(
        &self,
        deck_a: &[StereoSample],
        deck_b: &[StereoSample],
        out: &mut [StereoSample],
    ) {
        for ((dst, a), b) in out.iter_mut().zip(deck_a).zip(deck_b) {
            *dst = (*a + *b) * self.master_volume;
        }
    }
}
