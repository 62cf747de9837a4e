//! Per-deck spectrum analyser
//!
//! The render path feeds a mono ring of the most recent samples; spectra
//! are computed on demand when a caller asks, never on the audio path.
//! Output is byte-scaled magnitude with exponential smoothing across
//! consecutive reads, matching what a spectrum display expects.

use std::f32::consts::PI;
use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use crate::types::{Sample, StereoBuffer};

/// Analysis window length in samples
pub const ANALYSER_FFT_SIZE: usize = 2048;

/// Number of frequency bins reported
pub const ANALYSER_BINS: usize = ANALYSER_FFT_SIZE / 2;

const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;
const SMOOTHING: f32 = 0.8;

pub struct AnalyserTap {
    ring: Vec<Sample>,
    write_pos: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    scratch: Vec<Complex<f32>>,
    smoothed: Vec<f32>,
}

impl AnalyserTap {
    pub fn new() -> Self {
        let fft = FftPlanner::new().plan_fft_forward(ANALYSER_FFT_SIZE);
        let window = (0..ANALYSER_FFT_SIZE)
            .map(|i| {
                0.5 * (1.0 - (2.0 * PI * i as f32 / (ANALYSER_FFT_SIZE - 1) as f32).cos())
            })
            .collect();
        Self {
            ring: vec![0.0; ANALYSER_FFT_SIZE],
            write_pos: 0,
            fft,
            window,
            scratch: vec![Complex::default(); ANALYSER_FFT_SIZE],
            smoothed: vec![MIN_DB; ANALYSER_BINS],
        }
    }

    /// Push a rendered block into the ring (mono mixdown)
    pub fn feed(&mut self, buffer: &StereoBuffer) {
        for sample in buffer.iter() {
            self.ring[self.write_pos] = (sample.left + sample.right) * 0.5;
            self.write_pos = (self.write_pos + 1) % ANALYSER_FFT_SIZE;
        }
    }

    /// Compute the current byte-scaled spectrum
    ///
    /// Bins map decibel magnitude over [-100, -30] dB onto [0, 255], with
    /// 0.8 smoothing against the previous read.
    pub fn frequency_data(&mut self, out: &mut [u8]) {
        for (i, slot) in self.scratch.iter_mut().enumerate() {
            let idx = (self.write_pos + i) % ANALYSER_FFT_SIZE;
            *slot = Complex::new(self.ring[idx] * self.window[i], 0.0);
        }
        self.fft.process(&mut self.scratch);

        let norm = 1.0 / ANALYSER_FFT_SIZE as f32;
        let bins = out.len().min(ANALYSER_BINS);
        for (i, byte) in out.iter_mut().take(bins).enumerate() {
            let magnitude = self.scratch[i].norm() * norm;
            let db = if magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                MIN_DB
            };
            let current = self.smoothed[i];
            let smoothed = SMOOTHING * current + (1.0 - SMOOTHING) * db.clamp(MIN_DB, MAX_DB);
            self.smoothed[i] = smoothed;
            let scaled = (smoothed - MIN_DB) / (MAX_DB - MIN_DB) * 255.0;
            *byte = scaled.clamp(0.0, 255.0) as u8;
        }
    }

    pub fn reset(&mut self) {
        self.ring.fill(0.0);
        self.smoothed.fill(MIN_DB);
        self.write_pos = 0;
    }
}

impl Default for AnalyserTap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::StereoSample;

    fn feed_sine(tap: &mut AnalyserTap, freq: f32, sample_rate: f32) {
        let mut buffer = StereoBuffer::silence(ANALYSER_FFT_SIZE);
        for (i, s) in buffer.iter_mut().enumerate() {
            let v = (2.0 * PI * freq * i as f32 / sample_rate).sin() * 0.8;
            *s = StereoSample::mono(v);
        }
        tap.feed(&buffer);
    }

    #[test]
    fn test_silence_reports_floor() {
        let mut tap = AnalyserTap::new();
        tap.reset();
        let mut out = [0u8; ANALYSER_BINS];
        tap.frequency_data(&mut out);
        assert!(out.iter().all(|&b| b < 16), "silence should sit near 0");
    }

    #[test]
    fn test_sine_peaks_in_expected_bin() {
        let sample_rate = 48000.0;
        let bin_width = sample_rate / ANALYSER_FFT_SIZE as f32;
        let target_bin = 40usize;
        let freq = target_bin as f32 * bin_width;

        let mut tap = AnalyserTap::new();
        // Repeated reads converge through the smoothing
        let mut out = [0u8; ANALYSER_BINS];
        for _ in 0..20 {
            feed_sine(&mut tap, freq, sample_rate);
            tap.frequency_data(&mut out);
        }

        let loudest = out
            .iter()
            .enumerate()
            .max_by_key(|(_, &v)| v)
            .map(|(i, _)| i)
            .unwrap_or(0);
        assert!(
            loudest.abs_diff(target_bin) <= 1,
            "peak at bin {loudest}, expected near {target_bin}"
        );
    }

    #[test]
    fn test_smoothing_decays_after_silence() {
        let mut tap = AnalyserTap::new();
        let mut out = [0u8; ANALYSER_BINS];
        for _ in 0..10 {
            feed_sine(&mut tap, 1000.0, 48000.0);
            tap.frequency_data(&mut out);
        }
        let loud = out.iter().copied().max().unwrap_or(0);

        let silence = StereoBuffer::silence(ANALYSER_FFT_SIZE);
        tap.feed(&silence);
        tap.frequency_data(&mut out);
        let after_one = out.iter().copied().max().unwrap_or(0);

        assert!(after_one < loud, "smoothing should decay, {after_one} vs {loud}");
    }
}
