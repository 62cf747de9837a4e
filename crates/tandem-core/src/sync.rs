//! Beat math: tempo matching, quantization and beat grids

/// Playback rate that matches `source_bpm` material to `target_bpm`
///
/// A non-positive source tempo yields 1.0 so a bad analysis can never
/// produce a degenerate rate.
pub fn sync_rate(source_bpm: f64, target_bpm: f64) -> f64 {
    if source_bpm <= 0.0 || target_bpm <= 0.0 {
        return 1.0;
    }
    target_bpm / source_bpm
}

/// Snap a position in seconds to the nearest beat subdivision
///
/// `subdivision` is fractions of a beat (4 snaps to sixteenth notes at the
/// given tempo). Invalid tempo or subdivision returns the input unchanged.
pub fn quantize(position: f64, bpm: f64, subdivision: u32) -> f64 {
    if bpm <= 0.0 || subdivision == 0 {
        return position;
    }
    let step = 60.0 / bpm / subdivision as f64;
    (position / step).round() * step
}

/// Beat positions for a track at a fixed tempo
///
/// Beats are strictly ascending from `first_beat` and never reach the
/// track duration.
#[derive(Debug, Clone, PartialEq)]
pub struct BeatGrid {
    pub bpm: f64,
    pub first_beat: f64,
    pub duration: f64,
}

impl BeatGrid {
    pub fn new(bpm: f64, first_beat: f64, duration: f64) -> Self {
        Self {
            bpm,
            first_beat,
            duration,
        }
    }

    /// Seconds per beat
    pub fn beat_interval(&self) -> f64 {
        60.0 / self.bpm
    }

    /// The beat closest to a position
    pub fn nearest_beat(&self, position: f64) -> f64 {
        let interval = self.beat_interval();
        let n = ((position - self.first_beat) / interval).round().max(0.0);
        self.first_beat + n * interval
    }

    /// All beat positions within the track
    pub fn beats(&self) -> impl Iterator<Item = f64> + '_ {
        let interval = self.beat_interval();
        (0..)
            .map(move |i| self.first_beat + i as f64 * interval)
            .take_while(move |&t| t < self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sync_rate_basic() {
        assert_abs_diff_eq!(sync_rate(120.0, 126.0), 1.05, epsilon = 1e-12);
        assert_abs_diff_eq!(sync_rate(128.0, 128.0), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sync_rate_guards_degenerate_tempo() {
        assert_eq!(sync_rate(0.0, 128.0), 1.0);
        assert_eq!(sync_rate(-10.0, 128.0), 1.0);
        assert_eq!(sync_rate(120.0, 0.0), 1.0);
    }

    #[test]
    fn test_quantize_snaps_to_subdivision() {
        // 120 BPM, sixteenth notes: step = 0.125s
        assert_abs_diff_eq!(quantize(1.03, 120.0, 4), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(quantize(1.07, 120.0, 4), 1.125, epsilon = 1e-12);
    }

    #[test]
    fn test_quantize_is_idempotent() {
        let once = quantize(33.337, 174.0, 4);
        let twice = quantize(once, 174.0, 4);
        assert_abs_diff_eq!(once, twice, epsilon = 1e-9);
    }

    #[test]
    fn test_quantize_invalid_inputs_pass_through() {
        assert_eq!(quantize(1.5, 0.0, 4), 1.5);
        assert_eq!(quantize(1.5, 120.0, 0), 1.5);
    }

    #[test]
    fn test_beat_grid_count_matches_duration() {
        let grid = BeatGrid::new(120.0, 0.0, 60.0);
        // 60s at 0.5s per beat, beat at 0 included, 60.0 excluded
        assert_eq!(grid.beats().count(), 120);
    }

    #[test]
    fn test_beat_grid_is_strictly_ascending() {
        let grid = BeatGrid::new(174.0, 0.25, 30.0);
        let beats: Vec<f64> = grid.beats().collect();
        assert!(beats.windows(2).all(|w| w[1] > w[0]));
        assert!(beats.iter().all(|&b| b < 30.0));
    }

    #[test]
    fn test_nearest_beat_clamps_before_grid() {
        let grid = BeatGrid::new(120.0, 1.0, 60.0);
        assert_abs_diff_eq!(grid.nearest_beat(0.1), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(grid.nearest_beat(2.3), 2.5, epsilon = 1e-12);
    }
}
