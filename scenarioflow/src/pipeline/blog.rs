//! The blog writing executor.

use super::BlogConfig;
use crate::errors::{Result, ScenarioError};
use crate::events::{NoOpProgress, ProgressSink};
use crate::observability::SpanTimer;
use crate::stages::BlogStages;
use crate::state::{BlogPhase, BlogState, StyleSample};
use crate::store::{MemoryStateStore, StateStore};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Result of a [`BlogPipeline`] run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogOutcome {
    /// The draft after all reviews.
    pub final_draft: String,
    /// The style profile used.
    pub style_profile: String,
    /// Source reviews in the last round.
    pub source_reviews_completed: u32,
    /// Style reviews in the last round.
    pub style_reviews_completed: u32,
    /// Whether the last source review accepted the draft.
    pub source_verified: bool,
    /// Whether the last style review accepted the draft.
    pub style_verified: bool,
}

/// Writes a blog post from source notes and style samples, then revises it
/// through a source accuracy loop and a style consistency loop.
///
/// The style profile is computed once and cached in state. Passing user
/// feedback (a draft carrying `[bracketed]` comments) produces a revision
/// and resets both review loops.
pub struct BlogPipeline {
    stages: Arc<dyn BlogStages>,
    config: BlogConfig,
    progress: Arc<dyn ProgressSink>,
    store: Arc<dyn StateStore<BlogState>>,
}

impl BlogPipeline {
    /// Creates a pipeline with default bounds and an in-memory store.
    pub fn new(stages: impl BlogStages + 'static) -> Self {
        Self {
            stages: Arc::new(stages),
            config: BlogConfig::default(),
            progress: Arc::new(NoOpProgress),
            store: Arc::new(MemoryStateStore::new()),
        }
    }

    /// Sets the review bounds.
    #[must_use]
    pub fn with_config(mut self, config: BlogConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the progress sink.
    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Sets the checkpoint store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn StateStore<BlogState>>) -> Self {
        self.store = store;
        self
    }

    /// Loads the last checkpoint (or starts fresh) and runs.
    ///
    /// # Errors
    ///
    /// Store failures and anything [`BlogPipeline::run`] returns.
    pub async fn resume(
        &self,
        source: &str,
        samples: &[StyleSample],
        user_feedback: Option<&str>,
    ) -> Result<(BlogState, BlogOutcome)> {
        let mut state = self.store.load()?.unwrap_or_default();
        let outcome = self.run(source, samples, user_feedback, &mut state).await?;
        Ok((state, outcome))
    }

    /// Runs the pipeline over `state`.
    ///
    /// # Errors
    ///
    /// The first stage or store failure, unchanged.
    pub async fn run(
        &self,
        source: &str,
        samples: &[StyleSample],
        user_feedback: Option<&str>,
        state: &mut BlogState,
    ) -> Result<BlogOutcome> {
        let timer = SpanTimer::start("blog_pipeline");

        let style_profile = match state.style_profile.clone() {
            Some(profile) => profile,
            None => {
                self.enter(state, BlogPhase::StyleAnalysis)?;
                self.progress.report("Analyzing writing style...");
                let profile = self.stages.analyze_style(samples).await?;
                state.style_profile = Some(profile.clone());
                let mut details = Map::new();
                details.insert("samples_analyzed".to_string(), json!(samples.len()));
                state.record("style_analysis", details);
                self.checkpoint(state)?;
                self.progress.report("✓ Style analysis complete");
                profile
            }
        };

        if let Some(feedback) = user_feedback {
            self.enter(state, BlogPhase::FeedbackIncorporation)?;
            self.progress.report("Interpreting user feedback...");
            let interpretation = self
                .stages
                .interpret_feedback(feedback, source, &style_profile)
                .await?;
            let guidance = interpretation.revision_guidance();
            state.add_user_feedback(interpretation);
            self.checkpoint(state)?;

            self.progress.report("Generating revised draft...");
            let draft = self
                .stages
                .generate_draft(source, &style_profile, Some(&guidance))
                .await?;
            state.increment_iteration();
            state.update_draft(draft, None);
            state.reset_review_rounds();
            self.checkpoint(state)?;
            self.progress.report("✓ Revised draft generated");
        } else if state.current_draft.is_none() {
            self.enter(state, BlogPhase::DraftGeneration)?;
            self.progress.report("Generating initial draft...");
            let draft = self.stages.generate_draft(source, &style_profile, None).await?;
            state.increment_iteration();
            state.update_draft(draft, None);
            self.checkpoint(state)?;
            self.progress.report("✓ Draft generated");
        }

        let source_verified = self.source_review_loop(source, &style_profile, state).await?;
        let style_verified = self
            .style_review_loop(source, &style_profile, samples, state)
            .await?;

        self.enter(state, BlogPhase::Completed)?;
        let final_draft = current_draft(state)?.to_string();
        info!(
            iteration = state.iteration,
            source_reviews = state.source_reviews_completed,
            style_reviews = state.style_reviews_completed,
            duration_ms = timer.elapsed_ms(),
            "Blog pipeline finished"
        );

        Ok(BlogOutcome {
            final_draft,
            style_profile,
            source_reviews_completed: state.source_reviews_completed,
            style_reviews_completed: state.style_reviews_completed,
            source_verified,
            style_verified,
        })
    }

    async fn source_review_loop(
        &self,
        source: &str,
        style_profile: &str,
        state: &mut BlogState,
    ) -> Result<bool> {
        self.enter(state, BlogPhase::SourceReview)?;
        let max = self.config.max_source_reviews;
        let mut verified = state
            .source_reviews
            .last()
            .is_some_and(|r| r.review.is_acceptable());

        while state.source_reviews_completed < max {
            self.progress.report(&format!(
                "Reviewing source accuracy (attempt {}/{max})...",
                state.source_reviews_completed + 1
            ));
            let review = self
                .stages
                .review_source(source, current_draft(state)?)
                .await?;
            let acceptable = review.is_acceptable();
            let guidance = review.revision_guidance();
            state.add_source_review(review);
            self.checkpoint(state)?;

            if acceptable {
                verified = true;
                self.progress.report("✓ Source accuracy verified");
                break;
            }
            verified = false;

            let attempt = state.source_reviews_completed;
            self.progress.report(&format!(
                "Revising draft (source accuracy, attempt {attempt}/{max})"
            ));
            let draft = self
                .stages
                .generate_draft(source, style_profile, Some(&guidance))
                .await?;
            state.update_draft(draft, Some(format!("source_rev_{attempt}")));
            self.checkpoint(state)?;
        }

        Ok(verified)
    }

    async fn style_review_loop(
        &self,
        source: &str,
        style_profile: &str,
        samples: &[StyleSample],
        state: &mut BlogState,
    ) -> Result<bool> {
        self.enter(state, BlogPhase::StyleReview)?;
        let max = self.config.max_style_reviews;
        let mut verified = state
            .style_reviews
            .last()
            .is_some_and(|r| r.review.is_acceptable());

        while state.style_reviews_completed < max {
            self.progress.report(&format!(
                "Reviewing style consistency (attempt {}/{max})...",
                state.style_reviews_completed + 1
            ));
            let review = self
                .stages
                .review_style(style_profile, samples, current_draft(state)?)
                .await?;
            let acceptable = review.is_acceptable();
            let guidance = review.revision_guidance();
            state.add_style_review(review);
            self.checkpoint(state)?;

            if acceptable {
                verified = true;
                self.progress.report("✓ Style consistency verified");
                break;
            }
            verified = false;

            let attempt = state.style_reviews_completed;
            self.progress.report(&format!(
                "Revising draft (style consistency, attempt {attempt}/{max})"
            ));
            let draft = self
                .stages
                .generate_draft(source, style_profile, Some(&guidance))
                .await?;
            state.update_draft(draft, Some(format!("style_rev_{attempt}")));
            self.checkpoint(state)?;
        }

        Ok(verified)
    }

    fn enter(&self, state: &mut BlogState, phase: BlogPhase) -> Result<()> {
        state.enter(phase);
        self.checkpoint(state)
    }

    fn checkpoint(&self, state: &mut BlogState) -> Result<()> {
        state.touch();
        self.store.save(state)
    }
}

impl fmt::Debug for BlogPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlogPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn current_draft(state: &BlogState) -> Result<&str> {
    state
        .current_draft
        .as_deref()
        .ok_or_else(|| ScenarioError::missing_input("review", "current_draft"))
}
