//! Tempo estimation from onset spacing
//!
//! Frame-energy onset picking over an inter-onset-interval histogram.
//! Deliberately coarse: robust on percussive material, falls back to a
//! neutral tempo when the track gives nothing to lock onto.

use std::collections::HashMap;

use tandem_core::types::TrackBuffer;

pub const TEMPO_FRAME: usize = 2048;
pub const TEMPO_HOP: usize = 512;

/// Onset threshold relative to the previous frame's energy
const ONSET_RATIO: f32 = 1.5;

/// Absolute energy floor for an onset
const ONSET_FLOOR: f32 = 0.1;

/// Histogram bin width for inter-onset intervals, seconds
const IOI_BIN: f64 = 0.1;

pub const MIN_BPM: i32 = 60;
pub const MAX_BPM: i32 = 180;
pub const DEFAULT_BPM: i32 = 120;

/// Estimate tempo in beats per minute
///
/// Returns `DEFAULT_BPM` when fewer than two onsets are found or the modal
/// interval degenerates; otherwise the result clamps to [60, 180].
pub fn detect_bpm(track: &TrackBuffer) -> i32 {
    let samples = track.channel(0);
    let sample_rate = track.sample_rate() as f64;
    let onsets = detect_onsets(samples, sample_rate);
    if onsets.len() < 2 {
        log::warn!("tempo: {} onsets, defaulting to {} BPM", onsets.len(), DEFAULT_BPM);
        return DEFAULT_BPM;
    }

    // Modal inter-onset interval, binned to 0.1s
    let mut histogram: HashMap<i64, u32> = HashMap::new();
    for pair in onsets.windows(2) {
        let interval = pair[1] - pair[0];
        let bin = (interval / IOI_BIN).round() as i64;
        if bin > 0 {
            *histogram.entry(bin).or_insert(0) += 1;
        }
    }

    let modal_bin = histogram
        .into_iter()
        .max_by_key(|&(bin, count)| (count, std::cmp::Reverse(bin)))
        .map(|(bin, _)| bin);
    match modal_bin {
        Some(bin) => {
            let interval = bin as f64 * IOI_BIN;
            let bpm = (60.0 / interval).round() as i32;
            bpm.clamp(MIN_BPM, MAX_BPM)
        }
        None => DEFAULT_BPM,
    }
}

/// Onset times in seconds at frame granularity
fn detect_onsets(samples: &[f32], sample_rate: f64) -> Vec<f64> {
    let mut onsets = Vec::new();
    let mut prev_energy = 0.0f32;
    let mut start = 0;
    while start + TEMPO_FRAME <= samples.len() {
        let frame = &samples[start..start + TEMPO_FRAME];
        let energy = rms(frame);
        if energy > prev_energy * ONSET_RATIO && energy > ONSET_FLOOR {
            onsets.push(start as f64 / sample_rate);
        }
        prev_energy = energy;
        start += TEMPO_HOP;
    }
    onsets
}

pub(crate) fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    let sum: f32 = frame.iter().map(|s| s * s).sum();
    (sum / frame.len() as f32).sqrt()
}
