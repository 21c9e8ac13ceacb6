//! Session-backed blog writing stages.

use super::BlogStages;
use crate::errors::Result;
use crate::extraction::{extract_as, extract_text};
use crate::session::{Session, SessionRequest, StageProfile};
use crate::state::{FeedbackInterpretation, SourceReview, StyleReview, StyleSample};
use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;
use tracing::debug;

#[allow(clippy::expect_used)]
fn comment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\[([^\]]+)\]").expect("valid comment regex"))
}

/// Returns the text of every `[bracketed]` comment, in order.
pub fn extract_feedback_comments(draft: &str) -> Vec<String> {
    comment_pattern()
        .captures_iter(draft)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Joins writing samples into one prompt section.
pub fn format_samples(samples: &[StyleSample]) -> String {
    samples
        .iter()
        .map(|s| format!("## {}\n\n{}", s.file, s.content))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

/// Session configuration for each blog stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogProfiles {
    /// Style analysis.
    pub style_analyzer: StageProfile,
    /// Draft writing and revision.
    pub draft_writer: StageProfile,
    /// Source accuracy review.
    pub source_reviewer: StageProfile,
    /// Style consistency review.
    pub style_reviewer: StageProfile,
    /// Feedback interpretation.
    pub feedback_incorporator: StageProfile,
}

impl Default for BlogProfiles {
    fn default() -> Self {
        Self {
            style_analyzer: StageProfile::style_analyzer(),
            draft_writer: StageProfile::draft_writer(),
            source_reviewer: StageProfile::source_reviewer(),
            style_reviewer: StageProfile::style_reviewer(),
            feedback_incorporator: StageProfile::feedback_incorporator(),
        }
    }
}

/// [`BlogStages`] backed by a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionBlogStages<S> {
    session: S,
    profiles: BlogProfiles,
}

impl<S: Session> SessionBlogStages<S> {
    /// Creates stages using the preset profiles.
    pub fn new(session: S) -> Self {
        Self {
            session,
            profiles: BlogProfiles::default(),
        }
    }

    /// Replaces the stage profiles.
    #[must_use]
    pub fn with_profiles(mut self, profiles: BlogProfiles) -> Self {
        self.profiles = profiles;
        self
    }

    async fn call(
        &self,
        profile: &StageProfile,
        prompt: String,
    ) -> Result<crate::session::SessionResponse> {
        let request = SessionRequest::new(profile.clone(), prompt);
        self.session.execute(&request).await
    }
}

#[async_trait]
impl<S: Session> BlogStages for SessionBlogStages<S> {
    async fn analyze_style(&self, samples: &[StyleSample]) -> Result<String> {
        let prompt = format!(
            "Analyze the writing style from these samples and create a detailed style profile.\n\n\
             WRITING SAMPLES:\n\n{}\n\n\
             Provide a comprehensive style profile covering:\n\
             - Voice and tone\n\
             - Structure patterns\n\
             - Vocabulary and sentence patterns\n\
             - Use of metaphors/examples\n\
             - Transitions and flow\n\
             - Any unique characteristics\n\n\
             Format as detailed text that another writer can use to mimic this style.",
            format_samples(samples)
        );
        let response = self.call(&self.profiles.style_analyzer, prompt).await?;
        Ok(extract_text(&response)?)
    }

    async fn generate_draft(
        &self,
        source: &str,
        style_profile: &str,
        guidance: Option<&str>,
    ) -> Result<String> {
        let prompt = match guidance {
            Some(guidance) => format!(
                "Revise the blog post draft to address these issues:\n\n\
                 REVISION GUIDANCE:\n{guidance}\n\n\
                 ORIGINAL SOURCE MATERIAL:\n{source}\n\n\
                 STYLE PROFILE TO MATCH:\n{style_profile}\n\n\
                 Generate an improved draft that addresses all issues while \
                 maintaining style and accuracy."
            ),
            None => format!(
                "Write a blog post based on this source material, matching the \
                 specified writing style.\n\n\
                 SOURCE MATERIAL (ideas/brain dump):\n{source}\n\n\
                 STYLE PROFILE TO MATCH:\n{style_profile}\n\n\
                 Generate a complete, polished blog post that captures all ideas from \
                 the source, matches the style profile and sounds like the author \
                 wrote it.\n\n\
                 Provide the complete blog post text."
            ),
        };
        debug!(revision = guidance.is_some(), "Generating draft");
        let response = self.call(&self.profiles.draft_writer, prompt).await?;
        Ok(extract_text(&response)?)
    }

    async fn review_source(&self, source: &str, draft: &str) -> Result<SourceReview> {
        let prompt = format!(
            "Review the draft blog post for accuracy against the source material.\n\n\
             SOURCE MATERIAL:\n{source}\n\n\
             DRAFT BLOG POST:\n{draft}\n\n\
             Check for missing concepts, incorrect representations, and added ideas \
             not in source.\n\n\
             Respond with JSON: passed (bool), issues, missing_concepts, \
             incorrect_representations (lists of strings) and severity \
             (none/minor/major/critical)."
        );
        let response = self.call(&self.profiles.source_reviewer, prompt).await?;
        Ok(extract_as(&response)?)
    }

    async fn review_style(
        &self,
        style_profile: &str,
        samples: &[StyleSample],
        draft: &str,
    ) -> Result<StyleReview> {
        let prompt = format!(
            "Review the draft blog post for style consistency.\n\n\
             STYLE PROFILE:\n{style_profile}\n\n\
             WRITING SAMPLES (for comparison):\n{}\n\n\
             DRAFT BLOG POST:\n{draft}\n\n\
             Check for voice, tone, structure, vocabulary, and pattern consistency.\n\n\
             Respond with JSON: passed (bool), issues, voice_issues, structure_issues, \
             tone_issues (lists of strings) and severity (none/minor/major/critical).",
            format_samples(samples)
        );
        let response = self.call(&self.profiles.style_reviewer, prompt).await?;
        Ok(extract_as(&response)?)
    }

    async fn interpret_feedback(
        &self,
        draft_with_feedback: &str,
        source: &str,
        style_profile: &str,
    ) -> Result<FeedbackInterpretation> {
        let comments = extract_feedback_comments(draft_with_feedback);
        if comments.is_empty() {
            debug!("Draft carries no bracketed comments");
            return Ok(FeedbackInterpretation::none());
        }

        let prompt = format!(
            "Interpret user feedback comments and create revision guidance.\n\n\
             DRAFT WITH FEEDBACK (comments in [brackets]):\n{draft_with_feedback}\n\n\
             ORIGINAL SOURCE MATERIAL:\n{source}\n\n\
             STYLE PROFILE:\n{style_profile}\n\n\
             Extract all {} [feedback comments] and interpret them.\n\n\
             Respond with JSON: feedback_items (objects with location, comment, \
             interpretation, action), overall_guidance and priority.",
            comments.len()
        );
        let response = self.call(&self.profiles.feedback_incorporator, prompt).await?;
        Ok(extract_as(&response)?)
    }
}
