//! Progress sink trait and implementations.

use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, Level};

/// Receives progress messages, fire-and-forget.
///
/// Implementations must not fail or block for long; they run inline on the
/// pipeline's flow of control.
pub trait ProgressSink: Send + Sync {
    /// Reports one message.
    fn report(&self, message: &str);
}

impl<P: ProgressSink + ?Sized> ProgressSink for Arc<P> {
    fn report(&self, message: &str) {
        (**self).report(message);
    }
}

/// Discards all messages. The default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpProgress;

impl ProgressSink for NoOpProgress {
    fn report(&self, _message: &str) {}
}

/// Forwards messages to `tracing`.
#[derive(Debug, Clone)]
pub struct LoggingProgress {
    level: Level,
}

impl Default for LoggingProgress {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl LoggingProgress {
    /// Creates a sink logging at `level`. Levels more verbose than INFO log
    /// at DEBUG; the rest log at INFO.
    #[must_use]
    pub fn new(level: Level) -> Self {
        Self { level }
    }

    /// Creates a debug-level sink.
    #[must_use]
    pub fn debug() -> Self {
        Self::new(Level::DEBUG)
    }
}

impl ProgressSink for LoggingProgress {
    fn report(&self, message: &str) {
        if self.level <= Level::INFO {
            info!(progress = %message, "{message}");
        } else {
            debug!(progress = %message, "{message}");
        }
    }
}

/// Keeps every message, for tests and UIs that render a log afterwards.
#[derive(Debug, Default)]
pub struct CollectingProgress {
    messages: RwLock<Vec<String>>,
}

impl CollectingProgress {
    /// Creates an empty collector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all messages in emission order.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.read().clone()
    }

    /// Returns the number of messages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    /// Returns true if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    /// Returns messages starting with `prefix`.
    #[must_use]
    pub fn messages_starting_with(&self, prefix: &str) -> Vec<String> {
        self.messages
            .read()
            .iter()
            .filter(|m| m.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl ProgressSink for CollectingProgress {
    fn report(&self, message: &str) {
        self.messages.write().push(message.to_string());
    }
}

/// Adapts a closure (e.g. a websocket sender) into a [`ProgressSink`].
pub struct FnProgress {
    callback: Box<dyn Fn(&str) + Send + Sync>,
}

impl FnProgress {
    /// Wraps `callback`.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }
}

impl fmt::Debug for FnProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnProgress").finish_non_exhaustive()
    }
}

impl ProgressSink for FnProgress {
    fn report(&self, message: &str) {
        (self.callback)(message);
    }
}
