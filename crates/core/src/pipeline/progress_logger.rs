use std::time::Instant;

/// Cross-cutting observer for pipeline progress.
///
/// Keeps the use cases free of any particular output mechanism; the CLI
/// plugs in a logging implementation, tests plug in the null one.
pub trait ProgressLogger: Send {
    /// Report frame-level progress. `total` is 0 when unknown.
    fn progress(&mut self, current: usize, total: usize);

    /// Log a human-readable status message.
    fn info(&mut self, message: &str);

    /// Emit an end-of-run summary. Default: no-op.
    fn summary(&mut self) {}
}

/// Silent logger that discards all events.
pub struct NullProgressLogger;

impl ProgressLogger for NullProgressLogger {
    fn progress(&mut self, _current: usize, _total: usize) {}
    fn info(&mut self, _message: &str) {}
}

/// Logger backed by the `log` crate, throttled to every
/// `throttle_frames` frames to avoid flooding output on long videos.
pub struct LogProgressLogger {
    throttle_frames: usize,
    start: Instant,
    frames_seen: usize,
}

impl LogProgressLogger {
    pub fn new(throttle_frames: usize) -> Self {
        Self {
            throttle_frames: throttle_frames.max(1),
            start: Instant::now(),
            frames_seen: 0,
        }
    }
}

impl Default for LogProgressLogger {
    fn default() -> Self {
        Self::new(30)
    }
}

impl ProgressLogger for LogProgressLogger {
    fn progress(&mut self, current: usize, total: usize) {
        self.frames_seen = current;
        if current % self.throttle_frames != 0 {
            return;
        }
        if total > 0 {
            log::info!("processed frame {current}/{total}");
        } else {
            log::info!("processed frame {current}");
        }
    }

    fn info(&mut self, message: &str) {
        log::info!("{message}");
    }

    fn summary(&mut self) {
        let elapsed = self.start.elapsed().as_secs_f64();
        if elapsed > 0.0 && self.frames_seen > 0 {
            log::info!(
                "{} frames in {elapsed:.1}s ({:.1} fps)",
                self.frames_seen,
                self.frames_seen as f64 / elapsed
            );
        }
    }
}
