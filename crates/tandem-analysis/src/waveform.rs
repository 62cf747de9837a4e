//! Display waveform: fixed-resolution envelope of mean absolute amplitude

use tandem_core::types::TrackBuffer;

pub const WAVEFORM_POINTS: usize = 1000;

/// Reduce a track to `WAVEFORM_POINTS` block means of |amplitude|
///
/// Always returns exactly `WAVEFORM_POINTS` values; tracks shorter than
/// that many samples repeat into the grid, empty tracks yield zeros.
pub fn compute_waveform(track: &TrackBuffer) -> Vec<f32> {
    let samples = track.channel(0);
    let mut points = vec![0.0f32; WAVEFORM_POINTS];
    if samples.is_empty() {
        return points;
    }

    let block = (samples.len() / WAVEFORM_POINTS).max(1);
    for (i, point) in points.iter_mut().enumerate() {
        let start = (i * block).min(samples.len() - 1);
        let end = ((i + 1) * block).min(samples.len());
        let chunk = &samples[start..end.max(start + 1)];
        *point = chunk.iter().map(|s| s.abs()).sum::<f32>() / chunk.len() as f32;
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_waveform_has_fixed_length() {
        let track = TrackBuffer::from_mono(vec![0.5; 100_000], 8000);
        assert_eq!(compute_waveform(&track).len(), WAVEFORM_POINTS);
        let short = TrackBuffer::from_mono(vec![0.5; 10], 8000);
        assert_eq!(compute_waveform(&short).len(), WAVEFORM_POINTS);
    }

    #[test]
    fn test_constant_signal_flat_envelope() {
        let track = TrackBuffer::from_mono(vec![-0.3; 50_000], 8000);
        let wave = compute_waveform(&track);
        for point in wave {
            assert_abs_diff_eq!(point, 0.3, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_loud_section_shows_up() {
        let mut samples = vec![0.05f32; 100_000];
        for s in &mut samples[50_000..60_000] {
            *s = 0.9;
        }
        let track = TrackBuffer::from_mono(samples, 8000);
        let wave = compute_waveform(&track);
        assert!(wave[550] > wave[100] * 5.0);
    }

    #[test]
    fn test_empty_track_is_zeros() {
        let track = TrackBuffer::from_mono(vec![], 8000);
        assert!(compute_waveform(&track).iter().all(|&p| p == 0.0));
    }
}
