//! # Scenarioflow
//!
//! Checkpointed, resumable LLM scenario pipelines.
//!
//! Scenarioflow provides two pieces that scenario tools share:
//!
//! - **Defensive extraction**: turn free-form, possibly malformed model output
//!   into JSON through an ordered chain of parsing strategies
//! - **Pipeline executors**: run stages in a fixed order, skip stages whose
//!   output is already in state, checkpoint after every stage, pause at an
//!   approval gate and regenerate work whose quality score is too low
//!
//! The model itself is an external [`Session`](session::Session); state
//! persistence, progress reporting and approval are injected collaborators.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use scenarioflow::prelude::*;
//!
//! let pipeline = AnalysisPipeline::new(SessionTutorialStages::new(my_session))
//!     .with_store(Arc::new(JsonFileStateStore::in_session_dir(&dir)))
//!     .with_progress(Arc::new(LoggingProgress::default()));
//!
//! let (state, outcome) = pipeline.resume(&tutorial).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod approval;
pub mod errors;
pub mod events;
pub mod extraction;
pub mod library;
pub mod observability;
pub mod pipeline;
pub mod session;
pub mod stages;
pub mod state;
pub mod store;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::approval::{
        ApprovalDecision, ApprovalHandler, ApprovalRequest, ApprovalService, AutoApprove,
        FnApproval,
    };
    pub use crate::errors::{ExtractionError, JsonKind, Result, ScenarioError};
    pub use crate::events::{
        CollectingProgress, FnProgress, LoggingProgress, NoOpProgress, ProgressSink,
    };
    pub use crate::extraction::{
        extract_array, extract_as, extract_json, extract_json_str, extract_object, extract_text,
        Extracted,
    };
    pub use crate::library::{analyze_tutorial, AnalysisOptions, AnalysisReport};
    pub use crate::observability::{init_tracing, LogFormat};
    pub use crate::pipeline::{
        AnalysisPipeline, BlogConfig, BlogOutcome, BlogPipeline, PipelineConfig, PipelineOutcome,
    };
    pub use crate::session::{
        RetryConfig, RetryingSession, Session, SessionRequest, SessionResponse, StageProfile,
    };
    pub use crate::stages::{BlogStages, SessionBlogStages, SessionTutorialStages, TutorialStages};
    pub use crate::state::{AnalysisStage, AnalysisState, BlogState, Decision, StyleSample};
    pub use crate::store::{JsonFileStateStore, MemoryStateStore, StateStore};
}
