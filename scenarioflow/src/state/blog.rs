//! State of the blog writing pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Where the blog pipeline currently is. Informational only; resumption
/// is driven by which outputs are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlogPhase {
    /// Nothing has run yet.
    #[default]
    Initialized,
    /// Analyzing the author's writing samples.
    StyleAnalysis,
    /// Writing the first draft.
    DraftGeneration,
    /// Revising the draft from user comments.
    FeedbackIncorporation,
    /// Checking the draft against the source material.
    SourceReview,
    /// Checking the draft against the author's style.
    StyleReview,
    /// All reviews finished.
    Completed,
}

/// One writing sample used for style analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleSample {
    /// Sample identifier (usually a file name).
    pub file: String,
    /// Sample text.
    pub content: String,
}

impl StyleSample {
    /// Creates a sample.
    #[must_use]
    pub fn new(file: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            content: content.into(),
        }
    }
}

/// How serious a reviewer's findings are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// No issues.
    #[default]
    None,
    /// Cosmetic issues; acceptable.
    Minor,
    /// Needs a revision.
    Major,
    /// Needs a revision urgently.
    Critical,
}

impl Severity {
    /// Returns true if a review with this severity is acceptable as-is.
    #[must_use]
    pub fn is_acceptable(self) -> bool {
        matches!(self, Self::None | Self::Minor)
    }
}

/// Result of checking a draft against its source material.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReview {
    /// Whether the reviewer accepted the draft.
    #[serde(default)]
    pub passed: bool,
    /// Specific problems found.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Concepts in the source missing from the draft.
    #[serde(default)]
    pub missing_concepts: Vec<String>,
    /// Places where the draft misrepresents the source.
    #[serde(default)]
    pub incorrect_representations: Vec<String>,
    /// Overall severity.
    #[serde(default)]
    pub severity: Severity,
}

impl SourceReview {
    /// Returns true if no revision is needed.
    #[must_use]
    pub fn is_acceptable(&self) -> bool {
        self.passed || self.severity.is_acceptable()
    }

    /// Builds the revision guidance handed to the draft writer.
    #[must_use]
    pub fn revision_guidance(&self) -> String {
        let mut guidance = format!(
            "The source accuracy review found issues:\n\nSeverity: {}\n\nIssues:\n",
            severity_label(self.severity)
        );
        push_bullets(&mut guidance, None, &self.issues);
        push_bullets(&mut guidance, Some("Missing concepts from source:"), &self.missing_concepts);
        push_bullets(
            &mut guidance,
            Some("Incorrect representations:"),
            &self.incorrect_representations,
        );
        guidance
    }
}

/// Result of checking a draft against the author's style.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyleReview {
    /// Whether the reviewer accepted the draft.
    #[serde(default)]
    pub passed: bool,
    /// Specific style mismatches.
    #[serde(default)]
    pub issues: Vec<String>,
    /// Voice inconsistencies.
    #[serde(default)]
    pub voice_issues: Vec<String>,
    /// Structural pattern mismatches.
    #[serde(default)]
    pub structure_issues: Vec<String>,
    /// Tone inconsistencies.
    #[serde(default)]
    pub tone_issues: Vec<String>,
    /// Overall severity.
    #[serde(default)]
    pub severity: Severity,
}

impl StyleReview {
    /// Returns true if no revision is needed.
    #[must_use]
    pub fn is_acceptable(&self) -> bool {
        self.passed || self.severity.is_acceptable()
    }

    /// Builds the revision guidance handed to the draft writer.
    #[must_use]
    pub fn revision_guidance(&self) -> String {
        let mut guidance = format!(
            "The style consistency review found issues:\n\nSeverity: {}\n\nIssues:\n",
            severity_label(self.severity)
        );
        push_bullets(&mut guidance, None, &self.issues);
        push_bullets(&mut guidance, Some("Voice issues:"), &self.voice_issues);
        push_bullets(&mut guidance, Some("Tone issues:"), &self.tone_issues);
        push_bullets(&mut guidance, Some("Structure issues:"), &self.structure_issues);
        guidance
    }
}

/// One interpreted `[bracketed]` comment.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackItem {
    /// Where in the draft the comment sits.
    #[serde(default)]
    pub location: String,
    /// The comment text.
    #[serde(default)]
    pub comment: String,
    /// What the user wants.
    #[serde(default)]
    pub interpretation: String,
    /// The revision to make.
    #[serde(default)]
    pub action: String,
}

/// All interpreted feedback for one revision round.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackInterpretation {
    /// Individual items.
    #[serde(default)]
    pub feedback_items: Vec<FeedbackItem>,
    /// Summary of all feedback.
    #[serde(default)]
    pub overall_guidance: String,
    /// Which feedback matters most.
    #[serde(default)]
    pub priority: String,
}

impl FeedbackInterpretation {
    /// The interpretation used when a draft carries no comments.
    #[must_use]
    pub fn none() -> Self {
        Self {
            feedback_items: Vec::new(),
            overall_guidance: "No feedback provided".to_string(),
            priority: "none".to_string(),
        }
    }

    /// Builds the revision guidance handed to the draft writer.
    #[must_use]
    pub fn revision_guidance(&self) -> String {
        let mut guidance = format!(
            "User provided {} feedback items:\n\n{}\n\nSpecific items to address:\n",
            self.feedback_items.len(),
            self.overall_guidance
        );
        for item in &self.feedback_items {
            guidance.push_str(&format!("\n- {}: {}", item.interpretation, item.action));
        }
        guidance
    }
}

/// A review kept in history together with when it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRecord<R> {
    /// Draft iteration the review applies to.
    pub iteration: u32,
    /// When the review finished.
    pub timestamp: DateTime<Utc>,
    /// The review itself.
    pub review: R,
}

/// A saved draft version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftVersion {
    /// Draft iteration.
    pub iteration: u32,
    /// Revision label within the iteration (e.g. `source_rev_1`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_version: Option<String>,
    /// The draft text.
    pub text: String,
}

impl DraftVersion {
    /// File-style label, e.g. `draft_iter_2_style_rev_1`.
    #[must_use]
    pub fn label(&self) -> String {
        match self.sub_version {
            Some(ref sub) => format!("draft_iter_{}_{sub}", self.iteration),
            None => format!("draft_iter_{}", self.iteration),
        }
    }
}

/// One entry of the operation log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Operation type (e.g. `stage_change`, `draft_saved`).
    #[serde(rename = "type")]
    pub kind: String,
    /// Draft iteration at the time.
    pub iteration: u32,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
    /// Operation details.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

/// Complete blog writer state for persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlogState {
    /// Current phase.
    #[serde(default)]
    pub stage: BlogPhase,
    /// Draft iteration counter.
    #[serde(default)]
    pub iteration: u32,
    /// Author style profile, once analyzed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_profile: Option<String>,
    /// Latest draft, once written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_draft: Option<String>,
    /// Every saved draft.
    #[serde(default)]
    pub drafts: Vec<DraftVersion>,
    /// Every source review.
    #[serde(default)]
    pub source_reviews: Vec<ReviewRecord<SourceReview>>,
    /// Every style review.
    #[serde(default)]
    pub style_reviews: Vec<ReviewRecord<StyleReview>>,
    /// Every interpreted feedback round.
    #[serde(default)]
    pub user_feedback: Vec<ReviewRecord<FeedbackInterpretation>>,
    /// Source reviews completed in the current review round.
    #[serde(default)]
    pub source_reviews_completed: u32,
    /// Style reviews completed in the current review round.
    #[serde(default)]
    pub style_reviews_completed: u32,
    /// Every operation, in order.
    #[serde(default)]
    pub iteration_history: Vec<HistoryEntry>,
    /// When the session started.
    pub created_at: DateTime<Utc>,
    /// Last checkpoint time.
    pub updated_at: DateTime<Utc>,
}

impl Default for BlogState {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            stage: BlogPhase::Initialized,
            iteration: 0,
            style_profile: None,
            current_draft: None,
            drafts: Vec::new(),
            source_reviews: Vec::new(),
            style_reviews: Vec::new(),
            user_feedback: Vec::new(),
            source_reviews_completed: 0,
            style_reviews_completed: 0,
            iteration_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl BlogState {
    /// Creates a fresh state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation to the history.
    pub fn record(&mut self, kind: impl Into<String>, details: Map<String, Value>) {
        self.iteration_history.push(HistoryEntry {
            kind: kind.into(),
            iteration: self.iteration,
            timestamp: Utc::now(),
            details,
        });
    }

    /// Moves to a new phase and logs it.
    pub fn enter(&mut self, phase: BlogPhase) {
        self.stage = phase;
        let mut details = Map::new();
        details.insert("stage".to_string(), serde_json::json!(phase));
        self.record("stage_change", details);
    }

    /// Starts a new draft iteration.
    pub fn increment_iteration(&mut self) {
        self.iteration += 1;
        let mut details = Map::new();
        details.insert("iteration".to_string(), serde_json::json!(self.iteration));
        self.record("iteration_start", details);
    }

    /// Replaces the current draft and keeps a version of it.
    pub fn update_draft(&mut self, draft: String, sub_version: Option<String>) {
        let version = DraftVersion {
            iteration: self.iteration,
            sub_version,
            text: draft.clone(),
        };
        let mut details = Map::new();
        details.insert("label".to_string(), serde_json::json!(version.label()));
        details.insert("sub_version".to_string(), serde_json::json!(version.sub_version));
        details.insert("length".to_string(), serde_json::json!(draft.len()));

        self.current_draft = Some(draft);
        self.drafts.push(version);
        self.record("draft_saved", details);
    }

    /// Stores a source review and bumps the round counter.
    pub fn add_source_review(&mut self, review: SourceReview) {
        let mut details = Map::new();
        details.insert("passed".to_string(), serde_json::json!(review.passed));
        self.source_reviews.push(ReviewRecord {
            iteration: self.iteration,
            timestamp: Utc::now(),
            review,
        });
        self.source_reviews_completed += 1;
        self.record("source_review", details);
    }

    /// Stores a style review and bumps the round counter.
    pub fn add_style_review(&mut self, review: StyleReview) {
        let mut details = Map::new();
        details.insert("passed".to_string(), serde_json::json!(review.passed));
        self.style_reviews.push(ReviewRecord {
            iteration: self.iteration,
            timestamp: Utc::now(),
            review,
        });
        self.style_reviews_completed += 1;
        self.record("style_review", details);
    }

    /// Stores an interpreted feedback round.
    pub fn add_user_feedback(&mut self, interpretation: FeedbackInterpretation) {
        let mut details = Map::new();
        details.insert(
            "count".to_string(),
            serde_json::json!(interpretation.feedback_items.len()),
        );
        self.user_feedback.push(ReviewRecord {
            iteration: self.iteration,
            timestamp: Utc::now(),
            review: interpretation,
        });
        self.record("user_feedback", details);
    }

    /// Resets both review counters so the next run reviews again.
    pub fn reset_review_rounds(&mut self) {
        self.source_reviews_completed = 0;
        self.style_reviews_completed = 0;
    }

    /// Refreshes the checkpoint timestamp.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn severity_label(severity: Severity) -> &'static str {
    match severity {
        Severity::None => "none",
        Severity::Minor => "minor",
        Severity::Major => "major",
        Severity::Critical => "critical",
    }
}

fn push_bullets(out: &mut String, heading: Option<&str>, items: &[String]) {
    if items.is_empty() {
        return;
    }
    if let Some(heading) = heading {
        out.push_str("\n\n");
        out.push_str(heading);
    }
    for item in items {
        out.push_str("\n- ");
        out.push_str(item);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_severity_acceptance() {
        assert!(Severity::None.is_acceptable());
        assert!(Severity::Minor.is_acceptable());
        assert!(!Severity::Major.is_acceptable());
        assert!(!Severity::Critical.is_acceptable());
    }

    #[test]
    fn test_source_review_deserializes_partial() {
        let review: SourceReview =
            serde_json::from_value(json!({"passed": false, "severity": "major"})).unwrap();
        assert!(!review.is_acceptable());
        assert!(review.issues.is_empty());
    }

    #[test]
    fn test_source_review_guidance() {
        let review = SourceReview {
            passed: false,
            issues: vec!["Claims X".to_string()],
            missing_concepts: vec!["Y".to_string()],
            incorrect_representations: Vec::new(),
            severity: Severity::Major,
        };
        let guidance = review.revision_guidance();

        assert!(guidance.contains("Severity: major"));
        assert!(guidance.contains("- Claims X"));
        assert!(guidance.contains("Missing concepts from source:\n- Y"));
        assert!(!guidance.contains("Incorrect representations"));
    }

    #[test]
    fn test_style_review_passed_overrides_severity() {
        let review = StyleReview {
            passed: true,
            severity: Severity::Critical,
            ..StyleReview::default()
        };
        assert!(review.is_acceptable());
    }

    #[test]
    fn test_update_draft_versions_and_logs() {
        let mut state = BlogState::new();
        state.increment_iteration();
        state.update_draft("first".to_string(), None);
        state.update_draft("second".to_string(), Some("source_rev_1".to_string()));

        assert_eq!(state.current_draft.as_deref(), Some("second"));
        assert_eq!(state.drafts.len(), 2);
        assert_eq!(state.drafts[1].label(), "draft_iter_1_source_rev_1");
        let kinds: Vec<&str> = state.iteration_history.iter().map(|e| e.kind.as_str()).collect();
        assert_eq!(kinds, vec!["iteration_start", "draft_saved", "draft_saved"]);
    }

    #[test]
    fn test_review_counters() {
        let mut state = BlogState::new();
        state.add_source_review(SourceReview::default());
        state.add_style_review(StyleReview::default());
        state.add_style_review(StyleReview::default());

        assert_eq!(state.source_reviews_completed, 1);
        assert_eq!(state.style_reviews_completed, 2);

        state.reset_review_rounds();
        assert_eq!(state.source_reviews_completed, 0);
        assert_eq!(state.style_reviews.len(), 2);
    }

    #[test]
    fn test_blog_state_round_trip() {
        let mut state = BlogState::new();
        state.enter(BlogPhase::StyleAnalysis);
        state.style_profile = Some("Terse, technical".to_string());
        state.add_user_feedback(FeedbackInterpretation::none());

        let json = serde_json::to_string(&state).unwrap();
        let restored: BlogState = serde_json::from_str(&json).unwrap();

        assert_eq!(restored, state);
    }

    #[test]
    fn test_feedback_guidance() {
        let interpretation = FeedbackInterpretation {
            feedback_items: vec![FeedbackItem {
                location: "intro".to_string(),
                comment: "too long".to_string(),
                interpretation: "Shorten the intro".to_string(),
                action: "Cut to two sentences".to_string(),
            }],
            overall_guidance: "Tighten".to_string(),
            priority: "intro".to_string(),
        };

        let guidance = interpretation.revision_guidance();
        assert!(guidance.starts_with("User provided 1 feedback items"));
        assert!(guidance.contains("- Shorten the intro: Cut to two sentences"));
    }
}
