//! Pipeline state records.
//!
//! A stage's output being present is the only "already ran" marker; there
//! is no separate stage pointer. Both records serialize to a flat JSON
//! object so checkpoints stay readable and resumable.

mod analysis;
mod blog;

pub use analysis::{AnalysisStage, AnalysisState, Decision, RunStatus, StageResult};
pub use blog::{
    BlogPhase, BlogState, DraftVersion, FeedbackItem, FeedbackInterpretation, HistoryEntry,
    ReviewRecord, Severity, SourceReview, StyleReview, StyleSample,
};
