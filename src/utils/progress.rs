use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Receives progress updates from batch operations.
pub trait ProgressSink {
    fn report(&self, percent: u8, status: &str);
}

impl<F> ProgressSink for F
where
    F: Fn(u8, &str),
{
    fn report(&self, percent: u8, status: &str) {
        self(percent, status)
    }
}

/// Sink that forwards every update to the `log` facade.
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn report(&self, percent: u8, status: &str) {
        log::info!("[{:>3}%] {}", percent, status);
    }
}

/// Sink that drops every update.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _percent: u8, _status: &str) {}
}

/// Wraps a sink so that reported percentages never go backwards and never
/// exceed 100.
pub struct ProgressTracker<'a> {
    sink: &'a dyn ProgressSink,
    last: u8,
}

impl<'a> ProgressTracker<'a> {
    pub fn new(sink: &'a dyn ProgressSink) -> Self {
        Self { sink, last: 0 }
    }

    pub fn update(&mut self, percent: u8, status: &str) {
        let percent = percent.min(100).max(self.last);
        self.last = percent;
        self.sink.report(percent, status);
    }

    /// Reports `done` out of `total` units. An empty batch counts as done.
    pub fn step(&mut self, done: usize, total: usize, status: &str) {
        let percent = if total == 0 {
            100
        } else {
            (done.min(total) * 100 / total) as u8
        };
        self.update(percent, status);
    }

    pub fn finish(&mut self, status: &str) {
        self.update(100, status);
    }

    pub fn last_percent(&self) -> u8 {
        self.last
    }
}

/// Cooperative cancellation flag shared between a caller and a worker.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
