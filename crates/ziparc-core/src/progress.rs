//! Progress reporting module
//!
//! Every operation takes a [`ProgressSink`] and drives it through a
//! [`ProgressReporter`]. The first event of a run is always `0.0`, the last
//! event of a successful run is always `1.0`, and fractions in between never
//! decrease.

use crossbeam_channel::Sender;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// A progress sample delivered to a sink
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Archive path being read or written
    pub label: String,
    /// Completed fraction in `[0, 1]`
    pub fraction: f64,
}

/// Observer receiving progress events for one operation
///
/// Delivery is fire-and-forget: implementations must not block.
pub trait ProgressSink: Send + Sync {
    /// Called for every emitted sample
    fn on_progress(&self, event: &ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: &ProgressEvent) {
        self(event)
    }
}

/// Sink that discards every event
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_progress(&self, _event: &ProgressEvent) {}
}

/// Sink that logs events at debug level
pub struct LogProgress;

impl ProgressSink for LogProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        debug!(
            label = %event.label,
            "progress: {:.0}%",
            event.fraction * 100.0
        );
    }
}

/// Sink forwarding events into a channel
///
/// A disconnected or full receiver never stalls the operation; the event is
/// dropped instead.
pub struct ChannelProgress {
    sender: Sender<ProgressEvent>,
}

impl ChannelProgress {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelProgress {
    fn on_progress(&self, event: &ProgressEvent) {
        let _ = self.sender.try_send(event.clone());
    }
}

/// Computes `done / total`, treating an empty total as no progress
pub fn fraction(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (done as f64 / total as f64).clamp(0.0, 1.0)
}

/// Per-operation reporter enforcing the 0 -> monotonic -> 1 lifecycle
pub struct ProgressReporter<'a> {
    sink: &'a dyn ProgressSink,
    label: String,
    last: f64,
}

impl<'a> ProgressReporter<'a> {
    pub fn new(sink: &'a dyn ProgressSink, label: impl Into<String>) -> Self {
        Self {
            sink,
            label: label.into(),
            last: 0.0,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Force a 0% sample and reset the monotonic floor
    pub fn start(&mut self) {
        self.last = 0.0;
        self.emit(0.0);
    }

    /// Report `done` out of `total`; samples below the last one are dropped
    pub fn report(&mut self, done: u64, total: u64) {
        let value = fraction(done, total);
        if value > self.last {
            self.last = value;
            self.emit(value);
        }
    }

    /// Force a 100% sample
    pub fn finish(&mut self) {
        self.last = 1.0;
        self.emit(1.0);
    }

    /// Force a 0% sample signalling an abandoned operation
    pub fn abandon(&mut self) {
        self.last = 0.0;
        self.emit(0.0);
    }

    fn emit(&self, fraction: f64) {
        self.sink.on_progress(&ProgressEvent {
            label: self.label.clone(),
            fraction,
        });
    }
}

/// Cooperative cancellation flag, checked between entries
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
