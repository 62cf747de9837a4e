//! Track structure segmentation
//!
//! Proportional layout with absolute caps: the intro never runs past 30
//! seconds, the drop sits in the 40-60% window, the outro claims the last
//! 15% or 30 seconds, whichever starts later. Verses fill the gaps.
//! Segment energies scale the track energy by a per-section multiplier.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentKind {
    Intro,
    Verse,
    Drop,
    Outro,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StructureSegment {
    pub kind: SegmentKind,
    /// Segment start in seconds
    pub start: f64,
    /// Segment end in seconds, exclusive
    pub end: f64,
    /// Expected energy of this section, 0..100
    pub energy: i32,
}

const INTRO_FRACTION: f64 = 0.15;
const INTRO_CAP_SECS: f64 = 30.0;
const DROP_START_FRACTION: f64 = 0.4;
const DROP_END_FRACTION: f64 = 0.6;
const OUTRO_FRACTION: f64 = 0.85;
const OUTRO_CAP_SECS: f64 = 30.0;

const INTRO_ENERGY: f64 = 0.6;
const VERSE_ENERGY: f64 = 0.8;
const DROP_ENERGY: f64 = 1.2;
const OUTRO_ENERGY: f64 = 0.5;

/// Lay out the section map for a track
///
/// Segments are ordered, non-overlapping and cover [0, duration];
/// zero-length sections are omitted, so short tracks produce fewer than
/// five segments.
pub fn detect_structure(duration: f64, track_energy: i32) -> Vec<StructureSegment> {
    if duration <= 0.0 {
        return Vec::new();
    }

    let intro_end = (duration * INTRO_FRACTION).min(INTRO_CAP_SECS);
    let drop_start = duration * DROP_START_FRACTION;
    let drop_end = duration * DROP_END_FRACTION;
    let outro_start = (duration * OUTRO_FRACTION).max(duration - OUTRO_CAP_SECS);

    let scaled = |factor: f64| ((track_energy as f64 * factor).round() as i32).clamp(0, 100);

    let layout = [
        (SegmentKind::Intro, 0.0, intro_end, INTRO_ENERGY),
        (SegmentKind::Verse, intro_end, drop_start, VERSE_ENERGY),
        (SegmentKind::Drop, drop_start, drop_end, DROP_ENERGY),
        (SegmentKind::Verse, drop_end, outro_start, VERSE_ENERGY),
        (SegmentKind::Outro, outro_start, duration, OUTRO_ENERGY),
    ];

    layout
        .into_iter()
        .filter(|&(_, start, end, _)| end > start)
        .map(|(kind, start, end, factor)| StructureSegment {
            kind,
            start,
            end,
            energy: scaled(factor),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_200s_track_has_five_ordered_segments() {
        let segments = detect_structure(200.0, 50);
        assert_eq!(segments.len(), 5);

        assert_eq!(segments[0].kind, SegmentKind::Intro);
        assert_abs_diff_eq!(segments[0].end, 30.0, epsilon = 1e-9);
        assert_eq!(segments[2].kind, SegmentKind::Drop);
        assert_abs_diff_eq!(segments[2].start, 80.0, epsilon = 1e-9);
        assert_abs_diff_eq!(segments[2].end, 120.0, epsilon = 1e-9);
        assert_eq!(segments[4].kind, SegmentKind::Outro);
        assert_abs_diff_eq!(segments[4].start, 170.0, epsilon = 1e-9);
        assert_abs_diff_eq!(segments[4].end, 200.0, epsilon = 1e-9);

        // Ordered and covering
        for pair in segments.windows(2) {
            assert_abs_diff_eq!(pair[0].end, pair[1].start, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_long_track_caps_intro_and_outro() {
        let segments = detect_structure(600.0, 50);
        assert_abs_diff_eq!(segments[0].end, 30.0, epsilon = 1e-9);
        // max(0.85 * 600, 600 - 30) = 570
        assert_abs_diff_eq!(segments[4].start, 570.0, epsilon = 1e-9);
    }

    #[test]
    fn test_energy_multipliers() {
        let segments = detect_structure(200.0, 50);
        assert_eq!(segments[0].energy, 30);
        assert_eq!(segments[1].energy, 40);
        assert_eq!(segments[2].energy, 60);
        assert_eq!(segments[4].energy, 25);
    }

    #[test]
    fn test_drop_energy_clamps() {
        let segments = detect_structure(200.0, 95);
        assert_eq!(segments[2].energy, 100);
    }

    #[test]
    fn test_zero_duration_is_empty() {
        assert!(detect_structure(0.0, 50).is_empty());
        assert!(detect_structure(-1.0, 50).is_empty());
    }
}
