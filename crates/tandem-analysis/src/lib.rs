//! Tandem analysis: offline track profiling
//!
//! Everything here runs off the audio path. `analyze_track` reduces a
//! decoded track to the profile the mixing layer needs (tempo, key,
//! waveform envelope, energy, structure); `AnalysisService` runs it on a
//! worker pool with progress reporting; `recommend` scores analyzed
//! tracks against the one currently playing.
//!
//! Analysis is total: every track, including silence, yields a usable
//! profile with conservative defaults.

mod energy;
mod key;
pub mod music;
mod recommend;
mod service;
mod structure;
mod tempo;
mod waveform;

use serde::{Deserialize, Serialize};
use tandem_core::types::TrackBuffer;

pub use music::MusicalKey;
pub use recommend::{recommend, Recommendation};
pub use service::{AnalysisProgress, AnalysisService};
pub use structure::{SegmentKind, StructureSegment};
pub use tempo::{DEFAULT_BPM, MAX_BPM, MIN_BPM};
pub use waveform::WAVEFORM_POINTS;

/// Complete analysis profile for one track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Estimated tempo, clamped to [60, 180]
    pub bpm: i32,
    pub key: MusicalKey,
    /// Fixed-resolution amplitude envelope for display
    pub waveform: Vec<f32>,
    /// Overall loudness, 0..100
    pub energy: i32,
    /// Ordered, non-overlapping section map
    pub structure: Vec<StructureSegment>,
}

/// Analyze a track, reporting coarse progress in [0, 1]
///
/// Progress lands on fixed milestones after each stage so callers can
/// drive a bar without polling.
pub fn analyze_track_with_progress(
    track: &TrackBuffer,
    mut progress: impl FnMut(f64),
) -> AnalysisResult {
    progress(0.1);
    let bpm = tempo::detect_bpm(track);
    progress(0.3);
    let key = key::detect_key(track);
    progress(0.5);
    let waveform = waveform::compute_waveform(track);
    progress(0.7);
    let energy = energy::compute_energy(track);
    progress(0.9);
    let structure = structure::detect_structure(track.duration(), energy);
    progress(1.0);

    log::info!(
        "analyzed {:.1}s track: {} BPM, key {}, energy {}",
        track.duration(),
        bpm,
        key,
        energy
    );
    AnalysisResult {
        bpm,
        key,
        waveform,
        energy,
        structure,
    }
}

/// Analyze a track without progress reporting
pub fn analyze_track(track: &TrackBuffer) -> AnalysisResult {
    analyze_track_with_progress(track, |_| {})
}
