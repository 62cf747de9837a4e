//! Analysis worker service
//!
//! Owns a small rayon pool and runs track analysis off the control path.
//! Callers get a receiver of progress messages; cancellation is
//! cooperative between pipeline stages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Receiver};
use std::sync::Arc;

use tandem_core::types::SharedTrack;

use crate::AnalysisResult;

/// Progress messages from a background analysis
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisProgress {
    /// Pipeline progress in [0, 1]
    Working(f64),
    Complete(AnalysisResult),
    Cancelled,
}

/// Thread pool service for background analysis
///
/// Reusable: create once, submit tracks as they arrive. Multiple tracks
/// analyze in parallel up to the pool size.
pub struct AnalysisService {
    pool: rayon::ThreadPool,
    cancel_flag: Arc<AtomicBool>,
}

impl AnalysisService {
    pub fn new() -> Self {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(2)
            .thread_name(|i| format!("tandem-analysis-{i}"))
            .build()
            .expect("Failed to create analysis thread pool");
        Self {
            pool,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Analyze a track in the background
    ///
    /// Returns a receiver of progress messages ending in `Complete` or
    /// `Cancelled`. Cancellation takes effect at the next stage boundary.
    pub fn start(&self, track: SharedTrack) -> Receiver<AnalysisProgress> {
        self.cancel_flag.store(false, Ordering::SeqCst);
        let (tx, rx) = channel();
        let cancel = Arc::clone(&self.cancel_flag);

        self.pool.spawn(move || {
            let cancelled = AtomicBool::new(false);
            let result = crate::analyze_track_with_progress(&track, |p| {
                if cancel.load(Ordering::SeqCst) {
                    cancelled.store(true, Ordering::Relaxed);
                    return;
                }
                let _ = tx.send(AnalysisProgress::Working(p));
            });
            if cancelled.load(Ordering::Relaxed) || cancel.load(Ordering::SeqCst) {
                log::debug!("analysis cancelled");
                let _ = tx.send(AnalysisProgress::Cancelled);
            } else {
                let _ = tx.send(AnalysisProgress::Complete(result));
            }
        });
        rx
    }

    /// Request cancellation of in-flight analyses
    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }
}

impl Default for AnalysisService {
    fn default() -> Self {
        Self::new()
    }
}
