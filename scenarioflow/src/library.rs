//! Library entry point for embedding tutorial analysis in an application.
//!
//! Callers build an [`AnalysisPipeline`] with their own session, store,
//! progress sink and approval handler, then call [`analyze_tutorial`]. All
//! I/O happens through those collaborators.

use crate::errors::Result;
use crate::pipeline::{AnalysisPipeline, PipelineOutcome};
use crate::state::{AnalysisState, StageResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;

/// Options for [`analyze_tutorial`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Areas the improvement stage should focus on.
    #[serde(default)]
    pub focus_areas: Option<Vec<String>>,
    /// A previously saved state to resume from.
    #[serde(default)]
    pub state: Option<AnalysisState>,
    /// Name shown in the report header.
    #[serde(default)]
    pub tutorial_identifier: Option<String>,
}

impl AnalysisOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the focus areas.
    #[must_use]
    pub fn with_focus_areas(mut self, focus_areas: Vec<String>) -> Self {
        self.focus_areas = Some(focus_areas);
        self
    }

    /// Resumes from `state`.
    #[must_use]
    pub fn with_state(mut self, state: AnalysisState) -> Self {
        self.state = Some(state);
        self
    }

    /// Sets the report header name.
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.tutorial_identifier = Some(identifier.into());
        self
    }
}

/// What [`analyze_tutorial`] returns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    /// `"complete"` or `"rejected"`.
    pub status: String,
    /// Rejection reason, if rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Human-readable report. Empty on rejection.
    pub report_markdown: String,
    /// Final synthesis score. Absent on rejection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality_score: Option<f64>,
    /// The full final state.
    pub structured_data: AnalysisState,
}

impl AnalysisReport {
    /// Returns true if the approval gate rejected the run.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.reason.is_some()
    }
}

/// Analyzes a tutorial and renders the result.
///
/// # Errors
///
/// Any stage, approval or store failure. The store holds the last
/// checkpoint, so passing it back via [`AnalysisOptions::with_state`]
/// continues where the run stopped.
pub async fn analyze_tutorial(
    pipeline: &AnalysisPipeline,
    content: &str,
    options: AnalysisOptions,
) -> Result<AnalysisReport> {
    let mut state = options.state.unwrap_or_default();
    if let Some(focus_areas) = options.focus_areas {
        state.focus_areas = Some(focus_areas);
    }

    let outcome = pipeline.run(content, &mut state).await?;
    let identifier = options.tutorial_identifier.as_deref().unwrap_or("tutorial");

    Ok(match outcome {
        PipelineOutcome::Rejected { reason } => AnalysisReport {
            status: "rejected".to_string(),
            reason: Some(reason),
            report_markdown: String::new(),
            quality_score: None,
            structured_data: state,
        },
        completed => AnalysisReport {
            status: completed.status().to_string(),
            reason: None,
            report_markdown: render_report(&state, identifier),
            quality_score: completed.quality_score(),
            structured_data: state,
        },
    })
}

/// Renders a completed state as a markdown report.
#[must_use]
pub fn render_report(state: &AnalysisState, identifier: &str) -> String {
    let mut out = String::new();
    let score = state
        .synthesis
        .as_ref()
        .and_then(|s| s.get("quality_score"))
        .map_or_else(|| "N/A".to_string(), display);

    let _ = write!(
        out,
        "# Tutorial Analysis Report\n\n**Tutorial:** `{identifier}`\n\n**Quality Score:** {score}\n\n---\n\n"
    );

    if let Some(diagnosis) = &state.diagnosis {
        render_diagnosis(&mut out, diagnosis);
    }
    if let Some(experience) = &state.learner_experience {
        render_learner(&mut out, experience);
    }
    if let Some(improvements) = &state.improvements {
        render_improvements(&mut out, improvements);
    }
    if let Some(synthesis) = &state.synthesis {
        out.push_str("## Implementation Priority\n\n");
        if let Some(Value::Array(recommendations)) = synthesis.get("recommendations") {
            for (i, rec) in recommendations.iter().enumerate() {
                let _ = writeln!(out, "{}. {}", i + 1, display(rec));
            }
        }
        out.push('\n');
    }

    out.push_str("---\n\n*Generated by scenarioflow tutorial analysis*\n");
    out
}

fn render_diagnosis(out: &mut String, diagnosis: &StageResult) {
    out.push_str("## Diagnosis Summary\n\n");
    if let Some(Value::Object(summary)) = diagnosis.get("summary") {
        let _ = write!(
            out,
            "**Primary Issue:** {}\n\n**Issues Found:** {} critical, {} major, {} minor\n\n",
            field(summary, "primary_pedagogical_failure", "N/A"),
            field(summary, "critical_issues", "0"),
            field(summary, "major_issues", "0"),
            field(summary, "minor_issues", "0"),
        );
    }

    if let Some(Value::Array(issues)) = diagnosis.get("issues") {
        out.push_str("### Identified Issues\n\n");
        for issue in issues.iter().filter_map(Value::as_object) {
            let severity = field(issue, "severity", "unknown").to_uppercase();
            let _ = writeln!(
                out,
                "- **[{severity}]** {}",
                field(issue, "issue", "Unknown issue")
            );
        }
        out.push('\n');
    }
}

fn render_learner(out: &mut String, experience: &StageResult) {
    out.push_str("## From Learner Perspective\n\n");
    // Older learner outputs carry a single confusion point at the top level.
    let first = experience
        .get("confusion_points")
        .and_then(Value::as_array)
        .and_then(|points| points.first())
        .and_then(Value::as_object)
        .unwrap_or(experience);

    if let Some(issue) = first.get("issue") {
        let _ = write!(out, "**Confusion Point:** {}\n\n", display(issue));
    }
    if let Some(location) = first.get("location") {
        let _ = write!(out, "**Location:** {}\n\n", display(location));
    }
    out.push('\n');
}

fn render_improvements(out: &mut String, improvements: &StageResult) {
    out.push_str("## Recommended Improvements\n\n");
    let single;
    let suggestions: &[Value] = if improvements.contains_key("title")
        && improvements.contains_key("description")
    {
        single = [Value::Object(improvements.clone())];
        &single
    } else {
        improvements
            .get("suggestions")
            .or_else(|| improvements.get("improvements"))
            .and_then(Value::as_array)
            .map_or(&[][..], Vec::as_slice)
    };

    for (i, suggestion) in suggestions.iter().enumerate() {
        let n = i + 1;
        match suggestion.as_object() {
            Some(s) => {
                let _ = write!(
                    out,
                    "### {n}. {}\n\n{}\n\n",
                    field(s, "title", "Untitled"),
                    field(s, "description", "No description")
                );
                if let Some(location) = s.get("location") {
                    let _ = write!(out, "**Location:** {}\n\n", display(location));
                }
            }
            None => {
                let _ = write!(out, "### {n}. {}\n\n", display(suggestion));
            }
        }
    }
}

fn field(map: &StageResult, key: &str, default: &str) -> String {
    map.get(key).map_or_else(|| default.to_string(), display)
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::{ApprovalDecision, FnApproval};
    use crate::testing::{object, sample_tutorial, StubTutorialStages};
    use futures::FutureExt;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_complete_report() {
        let stages = Arc::new(StubTutorialStages::new());
        let pipeline = AnalysisPipeline::new(stages.clone());

        let report = analyze_tutorial(
            &pipeline,
            sample_tutorial(),
            AnalysisOptions::new()
                .with_focus_areas(vec!["clarity".to_string()])
                .with_identifier("rust-intro.md"),
        )
        .await
        .unwrap();

        assert_eq!(report.status, "complete");
        assert_eq!(report.quality_score, Some(0.9));
        assert!(!report.is_rejected());
        assert_eq!(
            report.structured_data.focus_areas,
            Some(vec!["clarity".to_string()])
        );

        let md = &report.report_markdown;
        assert!(md.contains("**Tutorial:** `rust-intro.md`"));
        assert!(md.contains("**Primary Issue:** Forward references"));
        assert!(md.contains("**Issues Found:** 0 critical, 1 major, 0 minor"));
        assert!(md.contains("- **[MAJOR]** Concept used before introduction"));
        assert!(md.contains("**Confusion Point:** Borrowing appears before it is explained"));
        assert!(md.contains("### 1. Introduce borrowing earlier (attempt 1)"));
        assert!(md.contains("1. Introduce borrowing before Step 3"));
        assert!(md.ends_with("*Generated by scenarioflow tutorial analysis*\n"));
    }

    #[tokio::test]
    async fn test_rejected_report() {
        let approval = Arc::new(FnApproval::new(|_| {
            async { Ok(ApprovalDecision::reject()) }.boxed()
        }));
        let pipeline = AnalysisPipeline::new(StubTutorialStages::new()).with_approval(approval);

        let report = analyze_tutorial(&pipeline, sample_tutorial(), AnalysisOptions::new())
            .await
            .unwrap();

        assert_eq!(report.status, "rejected");
        assert_eq!(report.reason.as_deref(), Some("User rejected improvements"));
        assert!(report.report_markdown.is_empty());
        assert!(report.quality_score.is_none());
    }

    #[tokio::test]
    async fn test_resumed_state_is_used() {
        let stages = Arc::new(StubTutorialStages::new());
        let pipeline = AnalysisPipeline::new(stages.clone());
        let mut state = AnalysisState::new();
        state.analysis = Some(object(json!({"complexity": "advanced"})));

        let report = analyze_tutorial(
            &pipeline,
            sample_tutorial(),
            AnalysisOptions::new().with_state(state),
        )
        .await
        .unwrap();

        assert_eq!(
            stages.call_count(crate::state::AnalysisStage::Analysis),
            0
        );
        assert_eq!(
            report.structured_data.analysis.unwrap()["complexity"],
            json!("advanced")
        );
    }

    #[test]
    fn test_single_improvement_object() {
        let mut state = AnalysisState::new();
        state.improvements = Some(object(json!({
            "title": "Add a glossary",
            "description": "Define jargon up front"
        })));

        let md = render_report(&state, "t");

        assert!(md.contains("**Quality Score:** N/A"));
        assert!(md.contains("### 1. Add a glossary\n\nDefine jargon up front"));
        assert!(!md.contains("## Diagnosis Summary"));
    }
}
