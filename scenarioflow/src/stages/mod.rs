//! Stage functions.
//!
//! A stage takes its typed inputs (raw content or earlier stage outputs),
//! builds a prompt, calls the [`Session`](crate::session::Session) and runs
//! the response through [`crate::extraction`]. Stages hold no state between
//! calls; everything they need is passed in.

mod blog;
mod tutorial;

pub use blog::{extract_feedback_comments, format_samples, BlogProfiles, SessionBlogStages};
pub use tutorial::{SessionTutorialStages, TutorialProfiles};

use crate::errors::Result;
use crate::state::{FeedbackInterpretation, SourceReview, StageResult, StyleReview, StyleSample};
use async_trait::async_trait;
use std::sync::Arc;

/// The six model-backed stages of the tutorial analysis pipeline.
#[async_trait]
pub trait TutorialStages: Send + Sync {
    /// Analyzes structure, concepts and complexity of the raw content.
    async fn analyze(&self, content: &str) -> Result<StageResult>;

    /// Simulates a first-time learner working through the content.
    async fn simulate_learner(&self, content: &str, analysis: &StageResult) -> Result<StageResult>;

    /// Diagnoses pedagogical issues from the learner's experience.
    async fn diagnose(
        &self,
        learner_experience: &StageResult,
        analysis: &StageResult,
    ) -> Result<StageResult>;

    /// Proposes improvements for the diagnosed issues.
    async fn generate_improvements(
        &self,
        diagnosis: &StageResult,
        focus_areas: Option<&[String]>,
    ) -> Result<StageResult>;

    /// Evaluates the proposed improvements.
    async fn evaluate(&self, improvements: &StageResult, diagnosis: &StageResult)
        -> Result<StageResult>;

    /// Produces final recommendations with a `quality_score`.
    async fn synthesize(
        &self,
        critique: &StageResult,
        improvements: &StageResult,
        diagnosis: &StageResult,
    ) -> Result<StageResult>;
}

#[async_trait]
impl<T: TutorialStages + ?Sized> TutorialStages for Arc<T> {
    async fn analyze(&self, content: &str) -> Result<StageResult> {
        (**self).analyze(content).await
    }

    async fn simulate_learner(&self, content: &str, analysis: &StageResult) -> Result<StageResult> {
        (**self).simulate_learner(content, analysis).await
    }

    async fn diagnose(
        &self,
        learner_experience: &StageResult,
        analysis: &StageResult,
    ) -> Result<StageResult> {
        (**self).diagnose(learner_experience, analysis).await
    }

    async fn generate_improvements(
        &self,
        diagnosis: &StageResult,
        focus_areas: Option<&[String]>,
    ) -> Result<StageResult> {
        (**self).generate_improvements(diagnosis, focus_areas).await
    }

    async fn evaluate(
        &self,
        improvements: &StageResult,
        diagnosis: &StageResult,
    ) -> Result<StageResult> {
        (**self).evaluate(improvements, diagnosis).await
    }

    async fn synthesize(
        &self,
        critique: &StageResult,
        improvements: &StageResult,
        diagnosis: &StageResult,
    ) -> Result<StageResult> {
        (**self).synthesize(critique, improvements, diagnosis).await
    }
}

/// The model-backed stages of the blog writing pipeline.
#[async_trait]
pub trait BlogStages: Send + Sync {
    /// Builds a style profile from writing samples.
    async fn analyze_style(&self, samples: &[StyleSample]) -> Result<String>;

    /// Writes a draft, or a revision when `guidance` is given.
    async fn generate_draft(
        &self,
        source: &str,
        style_profile: &str,
        guidance: Option<&str>,
    ) -> Result<String>;

    /// Checks the draft against the source material.
    async fn review_source(&self, source: &str, draft: &str) -> Result<SourceReview>;

    /// Checks the draft against the author's style.
    async fn review_style(
        &self,
        style_profile: &str,
        samples: &[StyleSample],
        draft: &str,
    ) -> Result<StyleReview>;

    /// Interprets `[bracketed]` comments left in a draft.
    async fn interpret_feedback(
        &self,
        draft_with_feedback: &str,
        source: &str,
        style_profile: &str,
    ) -> Result<FeedbackInterpretation>;
}

#[async_trait]
impl<T: BlogStages + ?Sized> BlogStages for Arc<T> {
    async fn analyze_style(&self, samples: &[StyleSample]) -> Result<String> {
        (**self).analyze_style(samples).await
    }

    async fn generate_draft(
        &self,
        source: &str,
        style_profile: &str,
        guidance: Option<&str>,
    ) -> Result<String> {
        (**self).generate_draft(source, style_profile, guidance).await
    }

    async fn review_source(&self, source: &str, draft: &str) -> Result<SourceReview> {
        (**self).review_source(source, draft).await
    }

    async fn review_style(
        &self,
        style_profile: &str,
        samples: &[StyleSample],
        draft: &str,
    ) -> Result<StyleReview> {
        (**self).review_style(style_profile, samples, draft).await
    }

    async fn interpret_feedback(
        &self,
        draft_with_feedback: &str,
        source: &str,
        style_profile: &str,
    ) -> Result<FeedbackInterpretation> {
        (**self)
            .interpret_feedback(draft_with_feedback, source, style_profile)
            .await
    }
}

/// Renders a stage result for embedding in a prompt.
pub(crate) fn render(result: &StageResult) -> String {
    serde_json::to_string_pretty(result).unwrap_or_else(|_| format!("{result:?}"))
}
