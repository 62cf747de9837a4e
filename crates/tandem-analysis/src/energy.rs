//! Overall track energy on a 0..100 scale

use tandem_core::types::TrackBuffer;

use crate::tempo::rms;

/// RMS level scaled into [0, 100]
pub fn compute_energy(track: &TrackBuffer) -> i32 {
    let level = rms(track.channel(0));
    ((level * 100.0).round() as i32).clamp(0, 100)
}
