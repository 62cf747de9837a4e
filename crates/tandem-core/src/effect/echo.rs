//! Echo - feedback delay loop
//!
//! A stereo delay line with the feedback path routed back into the line
//! (delay → feedback gain → delay). The delayed tap is mixed into the chain
//! output independent of the dry path. Feedback is clamped below unity so
//! loop energy stays bounded.

use crate::types::{Sample, StereoSample};

/// Maximum delay time in seconds
pub const MAX_ECHO_SECONDS: f32 = 2.0;

/// Feedback gain ceiling; keeps the loop stable
pub const MAX_ECHO_FEEDBACK: f32 = 0.95;

/// Default delay time (dotted eighth at 120 BPM, the classic DJ echo)
pub const DEFAULT_ECHO_SECONDS: f32 = 0.375;

/// Stereo feedback delay line
struct DelayLine {
    buffer_l: Vec<Sample>,
    buffer_r: Vec<Sample>,
    write_pos: usize,
    delay_samples: usize,
}

impl DelayLine {
    fn new(capacity: usize, delay_samples: usize) -> Self {
        Self {
            buffer_l: vec![0.0; capacity],
            buffer_r: vec![0.0; capacity],
            write_pos: 0,
            delay_samples: delay_samples.min(capacity - 1),
        }
    }

    fn set_delay_samples(&mut self, samples: usize) {
        self.delay_samples = samples.clamp(1, self.buffer_l.len() - 1);
    }

    /// Read the delayed tap at the current position
    #[inline]
    fn read(&self) -> (Sample, Sample) {
        let len = self.buffer_l.len();
        let read_pos = if self.write_pos >= self.delay_samples {
            self.write_pos - self.delay_samples
        } else {
            len - (self.delay_samples - self.write_pos)
        };
        (self.buffer_l[read_pos], self.buffer_r[read_pos])
    }

    /// Write into the line and advance
    #[inline]
    fn write(&mut self, left: Sample, right: Sample) {
        self.buffer_l[self.write_pos] = left;
        self.buffer_r[self.write_pos] = right;
        self.write_pos = (self.write_pos + 1) % self.buffer_l.len();
    }

    fn reset(&mut self) {
        self.buffer_l.fill(0.0);
        self.buffer_r.fill(0.0);
        self.write_pos = 0;
    }
}

/// Feedback echo tap for the effect chain
pub struct Echo {
    delay_line: DelayLine,
    sample_rate: f32,
    time_secs: f32,
    feedback: f32,
    mix: f32,
}

impl Echo {
    /// Create an inactive echo (mix 0, no feedback)
    pub fn new(sample_rate: u32) -> Self {
        let capacity = (sample_rate as f32 * MAX_ECHO_SECONDS) as usize + 1;
        let default_delay = (sample_rate as f32 * DEFAULT_ECHO_SECONDS) as usize;
        Self {
            delay_line: DelayLine::new(capacity, default_delay),
            sample_rate: sample_rate as f32,
            time_secs: DEFAULT_ECHO_SECONDS,
            feedback: 0.0,
            mix: 0.0,
        }
    }

    /// Set delay time, feedback gain and wet mix; all inputs clamp
    pub fn set(&mut self, time_secs: f32, feedback: f32, mix: f32) {
        self.time_secs = time_secs.clamp(1.0 / self.sample_rate, MAX_ECHO_SECONDS);
        self.feedback = feedback.clamp(0.0, MAX_ECHO_FEEDBACK);
        self.mix = mix.clamp(0.0, 1.0);
        let samples = (self.time_secs * self.sample_rate) as usize;
        self.delay_line.set_delay_samples(samples);
    }

    /// Current wet mix
    pub fn mix(&self) -> f32 {
        self.mix
    }

    /// Current delay time in seconds
    pub fn time_secs(&self) -> f32 {
        self.time_secs
    }

    /// Current feedback gain
    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    /// Advance one sample through the loop and return the wet contribution
    /// (delayed tap scaled by mix)
    #[inline]
    pub fn tick(&mut self, input: StereoSample) -> StereoSample {
        let (delayed_l, delayed_r) = self.delay_line.read();

        // Feed input plus the scaled tap back into the line
        self.delay_line.write(
            input.left + delayed_l * self.feedback,
            input.right + delayed_r * self.feedback,
        );

        StereoSample::new(delayed_l * self.mix, delayed_r * self.mix)
    }

    /// Clear the delay buffers
    pub fn reset(&mut self) {
        self.delay_line.reset();
    }
}
