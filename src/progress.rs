//! Cancellable computation handle: a cancellation token plus an optional progress sink.
//!
//! The caller owns the handle and passes it into long-running reasoner
//! operations. Workers poll the token between units of work; progress is
//! pushed to the sink, never pulled.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Reasoning phase a progress report belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Loading,
    Saturation,
    Reduction,
    Linking,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Loading => write!(f, "loading"),
            Phase::Saturation => write!(f, "saturation"),
            Phase::Reduction => write!(f, "reduction"),
            Phase::Linking => write!(f, "linking"),
        }
    }
}

/// Receives progress reports. Called from worker threads.
pub trait ProgressSink: Send + Sync {
    /// `done` units of roughly `total` finished in `phase`.
    fn report(&self, phase: Phase, done: usize, total: usize);
}

/// Sink that forwards reports to `tracing` at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, phase: Phase, done: usize, total: usize) {
        tracing::debug!(%phase, done, total, "progress");
    }
}

/// Cooperative cancellation flag, cheap to clone and share across threads.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Handle passed into every long-running operation.
#[derive(Clone, Default)]
pub struct ProgressHandle {
    cancel: CancelToken,
    sink: Option<Arc<dyn ProgressSink>>,
}

impl ProgressHandle {
    /// A handle that is never cancelled and reports nowhere.
    pub fn none() -> Self {
        Self::default()
    }

    /// Attach a cancellation token.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Attach a progress sink.
    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn report(&self, phase: Phase, done: usize, total: usize) {
        if let Some(sink) = &self.sink {
            sink.report(phase, done, total);
        }
    }
}

impl std::fmt::Debug for ProgressHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressHandle")
            .field("cancelled", &self.cancel.is_cancelled())
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
