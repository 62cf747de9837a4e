//! Key estimation
//!
//! Hash-style heuristic: the mean absolute amplitude picks a pitch class
//! and a mode. Stable for a given track, cheap, and honest about being a
//! placeholder for real chroma analysis.

use tandem_core::types::TrackBuffer;

use crate::music::MusicalKey;

pub fn detect_key(track: &TrackBuffer) -> MusicalKey {
    let samples = track.channel(0);
    if samples.is_empty() {
        return MusicalKey::new(0, false);
    }
    let mean: f64 = samples.iter().map(|s| s.abs() as f64).sum::<f64>() / samples.len() as f64;

    let root = ((mean * 1000.0) as u64 % 12) as u8;
    let minor = (mean * 10_000.0) as u64 % 2 == 1;
    MusicalKey::new(root, minor)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_signal_maps_deterministically() {
        // mean 0.25 exactly: ×1000 = 250, 250 % 12 = 10 → A#;
        // ×10000 = 2500, even → major
        let track = TrackBuffer::from_mono(vec![0.25; 4096], 8000);
        assert_eq!(detect_key(&track), MusicalKey::new(10, false));
    }

    #[test]
    fn test_mode_follows_finer_digit() {
        // mean 0.25 + 1/1024 exactly: ×10000 = 2509.x, odd → minor
        let track = TrackBuffer::from_mono(vec![0.2509765625; 4096], 8000);
        assert_eq!(detect_key(&track), MusicalKey::new(10, true));
    }

    #[test]
    fn test_empty_track_is_c_major() {
        let track = TrackBuffer::from_mono(vec![], 8000);
        assert_eq!(detect_key(&track), MusicalKey::new(0, false));
    }

    #[test]
    fn test_same_track_same_key() {
        let samples: Vec<f32> = (0..8192).map(|i| (i as f32 * 0.01).sin() * 0.7).collect();
        let a = detect_key(&TrackBuffer::from_mono(samples.clone(), 8000));
        let b = detect_key(&TrackBuffer::from_mono(samples, 8000));
        assert_eq!(a, b);
    }
}
