//! Mix recording
//!
//! The engine pushes every processed output frame into a lock-free SPSC
//! ring; a worker thread drains the ring into an in-memory WAV writer.
//! The audio path never blocks: if the worker falls behind, frames are
//! dropped and counted as overruns.

use std::io::Cursor;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::EngineError;
use crate::types::StereoSample;

/// Ring capacity in frames (about four seconds at 48 kHz)
pub const RECORD_RING_CAPACITY: usize = 1 << 18;

/// Consumer half of the recording ring, handed out by the engine
pub struct RecordingTap {
    consumer: rtrb::Consumer<StereoSample>,
    sample_rate: u32,
}

impl RecordingTap {
    pub(crate) fn new(consumer: rtrb::Consumer<StereoSample>, sample_rate: u32) -> Self {
        Self {
            consumer,
            sample_rate,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Drain everything currently queued into `out`, returning the count
    pub fn drain(&mut self, out: &mut Vec<StereoSample>) -> usize {
        let mut drained = 0;
        while let Ok(sample) = self.consumer.pop() {
            out.push(sample);
            drained += 1;
        }
        drained
    }
}

/// Progress events from the recorder worker
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RecorderEvent {
    /// Cumulative seconds captured
    Captured(f64),
    Finished,
}

/// Background recorder that turns a tap into WAV bytes
pub struct MixRecorder {
    handle: Option<JoinHandle<Result<Vec<u8>, EngineError>>>,
    stop_flag: Arc<AtomicBool>,
    events: Receiver<RecorderEvent>,
}

impl MixRecorder {
    /// Spawn the drain thread over a recording tap
    pub fn spawn(mut tap: RecordingTap) -> Self {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let (event_tx, events) = std::sync::mpsc::channel();
        let flag = Arc::clone(&stop_flag);

        let handle = std::thread::spawn(move || drain_loop(&mut tap, &flag, &event_tx));

        Self {
            handle: Some(handle),
            stop_flag,
            events,
        }
    }

    /// Progress events, non-blocking
    pub fn try_events(&self) -> impl Iterator<Item = RecorderEvent> + '_ {
        self.events.try_iter()
    }

    /// Stop capturing and return the finished WAV file bytes
    pub fn stop(mut self) -> Result<Vec<u8>, EngineError> {
        self.stop_flag.store(true, Ordering::Relaxed);
        match self.handle.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| EngineError::InvalidArgument("recorder thread panicked"))?,
            None => Err(EngineError::InvalidArgument("recorder already stopped")),
        }
    }
}

impl Drop for MixRecorder {
    fn drop(&mut self) {
        self.stop_flag.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn drain_loop(
    tap: &mut RecordingTap,
    stop_flag: &AtomicBool,
    events: &Sender<RecorderEvent>,
) -> Result<Vec<u8>, EngineError> {
    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: tap.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut bytes = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut bytes), spec)
            .map_err(|e| EngineError::Encode(e.to_string()))?;

        let sample_rate = tap.sample_rate() as f64;
        let mut scratch: Vec<StereoSample> = Vec::with_capacity(4096);
        let mut captured: u64 = 0;
        let mut last_reported = 0.0f64;

        loop {
            scratch.clear();
            let drained = tap.drain(&mut scratch);
            for sample in &scratch {
                writer
                    .write_sample(to_i16(sample.left))
                    .and_then(|_| writer.write_sample(to_i16(sample.right)))
                    .map_err(|e| EngineError::Encode(e.to_string()))?;
            }
            captured += drained as u64;

            let seconds = captured as f64 / sample_rate;
            if seconds - last_reported >= 1.0 {
                last_reported = seconds;
                let _ = events.send(RecorderEvent::Captured(seconds));
            }

            if drained == 0 {
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }
                std::thread::sleep(Duration::from_millis(5));
            }
        }

        writer
            .finalize()
            .map_err(|e| EngineError::Encode(e.to_string()))?;
    }

    let _ = events.send(RecorderEvent::Finished);
    Ok(bytes)
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recorded_wav_is_well_formed() {
        let (mut producer, consumer) = rtrb::RingBuffer::new(1024);
        let tap = RecordingTap::new(consumer, 8000);
        let recorder = MixRecorder::spawn(tap);

        for i in 0..512 {
            let v = (i as f32 * 0.1).sin() * 0.5;
            let _ = producer.push(StereoSample::mono(v));
        }
        std::thread::sleep(Duration::from_millis(50));

        let bytes = recorder.stop().unwrap();
        let mut reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().channels, 2);
        assert_eq!(reader.spec().sample_rate, 8000);
        assert_eq!(reader.len(), 512 * 2);
        let decoded: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(decoded[0], 0);
        assert_eq!(decoded[2], to_i16((0.1f32).sin() * 0.5));
    }

    #[test]
    fn test_drop_does_not_hang() {
        let (_producer, consumer) = rtrb::RingBuffer::<StereoSample>::new(64);
        let tap = RecordingTap::new(consumer, 8000);
        let recorder = MixRecorder::spawn(tap);
        drop(recorder);
    }

    #[test]
    fn test_clipping_saturates() {
        assert_eq!(to_i16(2.0), i16::MAX);
        assert_eq!(to_i16(-2.0), -i16::MAX);
        assert_eq!(to_i16(0.0), 0);
    }
}
