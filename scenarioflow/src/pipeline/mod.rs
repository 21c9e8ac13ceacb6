//! Checkpointed, resumable pipeline executors.
//!
//! [`AnalysisPipeline`] runs the seven tutorial analysis stages with an
//! approval gate and a bounded quality loop. [`BlogPipeline`] runs the
//! blog writer's review loops. Both skip any stage whose output is already
//! in state, save through the injected store after every stage, and never
//! retry a failed stage themselves.

mod analysis;
mod blog;
mod config;

#[cfg(test)]
mod integration_tests;

pub use analysis::{AnalysisPipeline, PipelineOutcome, REJECTION_REASON};
pub use blog::{BlogOutcome, BlogPipeline};
pub use config::{BlogConfig, PipelineConfig};
