//! Progress reporting.
//!
//! Executors emit a short human-readable message before and after each
//! stage. Messages carry no control meaning; a sink that drops them changes
//! nothing about the run.

mod progress;

pub use progress::{CollectingProgress, FnProgress, LoggingProgress, NoOpProgress, ProgressSink};
