//! State of the tutorial analysis pipeline.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// The structured output of one stage. Always a JSON object.
pub type StageResult = Map<String, Value>;

/// The stages of the analysis pipeline, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisStage {
    /// Structure analysis of the raw content.
    Analysis,
    /// Simulated learner experience.
    LearnerExperience,
    /// Pedagogical issue diagnosis.
    Diagnosis,
    /// Candidate improvements.
    Improvements,
    /// The human approval gate.
    HumanApproval,
    /// Evaluation of the improvements.
    Critique,
    /// Final recommendations and quality score.
    Synthesis,
}

impl AnalysisStage {
    /// All stages in order.
    pub const ALL: [Self; 7] = [
        Self::Analysis,
        Self::LearnerExperience,
        Self::Diagnosis,
        Self::Improvements,
        Self::HumanApproval,
        Self::Critique,
        Self::Synthesis,
    ];

    /// The state key holding this stage's output.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::LearnerExperience => "learner_experience",
            Self::Diagnosis => "diagnosis",
            Self::Improvements => "improvements",
            Self::HumanApproval => "human_approval",
            Self::Critique => "critique",
            Self::Synthesis => "synthesis",
        }
    }

    /// 1-based position in the pipeline.
    #[must_use]
    pub fn ordinal(self) -> usize {
        match self {
            Self::Analysis => 1,
            Self::LearnerExperience => 2,
            Self::Diagnosis => 3,
            Self::Improvements => 4,
            Self::HumanApproval => 5,
            Self::Critique => 6,
            Self::Synthesis => 7,
        }
    }

    /// Progress message emitted before the stage runs.
    #[must_use]
    pub fn start_message(self) -> String {
        let activity = match self {
            Self::Analysis => "Analyzing tutorial structure...",
            Self::LearnerExperience => "Simulating learner experience...",
            Self::Diagnosis => "Diagnosing pedagogical issues...",
            Self::Improvements => "Generating improvement suggestions...",
            Self::HumanApproval => "Requesting approval of improvements...",
            Self::Critique => "Evaluating improvement quality...",
            Self::Synthesis => "Synthesizing final recommendations...",
        };
        format!("Stage {}/{}: {activity}", self.ordinal(), Self::ALL.len())
    }

    /// Progress message emitted after the stage completes.
    #[must_use]
    pub fn done_message(self) -> &'static str {
        match self {
            Self::Analysis => "✓ Analysis complete",
            Self::LearnerExperience => "✓ Simulation complete",
            Self::Diagnosis => "✓ Diagnosis complete",
            Self::Improvements => "✓ Improvements generated",
            Self::HumanApproval => "✓ Approval recorded",
            Self::Critique => "✓ Evaluation complete",
            Self::Synthesis => "✓ Synthesis complete",
        }
    }
}

impl fmt::Display for AnalysisStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Outcome of the approval gate.
///
/// Written as `"yes"` or `"no"`. Any stored string loads, through
/// [`Decision::from_answer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    /// Proceed with the improvements.
    #[default]
    Yes,
    /// Reject the improvements and stop.
    No,
}

impl Decision {
    /// Interprets a free-form answer. Only "no" (any case, surrounding
    /// whitespace ignored) rejects.
    #[must_use]
    pub fn from_answer(answer: &str) -> Self {
        if answer.trim().eq_ignore_ascii_case("no") {
            Self::No
        } else {
            Self::Yes
        }
    }

    /// Returns true for [`Decision::Yes`].
    #[must_use]
    pub fn is_approved(self) -> bool {
        self == Self::Yes
    }
}

impl<'de> Deserialize<'de> for Decision {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let answer = String::deserialize(deserializer)?;
        Ok(Self::from_answer(&answer))
    }
}

/// Terminal status recorded in state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    /// The approval gate rejected the improvements.
    Rejected,
}

/// Complete state of one tutorial analysis run.
///
/// Serializes to the same flat mapping the checkpoint files use: one key per
/// completed stage plus the reserved keys `iterations`, `human_approval`,
/// `status` and `focus_areas`. Unknown keys survive a load/save cycle
/// through [`AnalysisState::extra`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisState {
    /// Output of [`AnalysisStage::Analysis`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<StageResult>,
    /// Output of [`AnalysisStage::LearnerExperience`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learner_experience: Option<StageResult>,
    /// Output of [`AnalysisStage::Diagnosis`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<StageResult>,
    /// Output of [`AnalysisStage::Improvements`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improvements: Option<StageResult>,
    /// Decision recorded by the approval gate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub human_approval: Option<Decision>,
    /// Output of [`AnalysisStage::Critique`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critique: Option<StageResult>,
    /// Output of [`AnalysisStage::Synthesis`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<StageResult>,
    /// Number of quality-driven restarts so far.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<u32>,
    /// Set only when the run was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RunStatus>,
    /// Why the run was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Caller-supplied hint for the improvement stage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_areas: Option<Vec<String>>,
    /// Keys this crate does not interpret.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AnalysisState {
    /// Creates an empty state for a fresh run.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a state from a JSON value (resume).
    ///
    /// # Errors
    ///
    /// Returns a serde error if a reserved key has the wrong type.
    pub fn from_value(value: Value) -> serde_json::Result<Self> {
        serde_json::from_value(value)
    }

    /// Serializes the state to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns a serde error if serialization fails.
    pub fn to_value(&self) -> serde_json::Result<Value> {
        serde_json::to_value(self)
    }

    /// Sets the focus areas hint.
    #[must_use]
    pub fn with_focus_areas(mut self, focus_areas: Vec<String>) -> Self {
        self.focus_areas = Some(focus_areas);
        self
    }

    /// Returns true if the stage's output is present.
    #[must_use]
    pub fn is_complete(&self, stage: AnalysisStage) -> bool {
        match stage {
            AnalysisStage::Analysis => self.analysis.is_some(),
            AnalysisStage::LearnerExperience => self.learner_experience.is_some(),
            AnalysisStage::Diagnosis => self.diagnosis.is_some(),
            AnalysisStage::Improvements => self.improvements.is_some(),
            AnalysisStage::HumanApproval => self.human_approval.is_some(),
            AnalysisStage::Critique => self.critique.is_some(),
            AnalysisStage::Synthesis => self.synthesis.is_some(),
        }
    }

    /// Returns the stages whose output is present, in order.
    #[must_use]
    pub fn completed_stages(&self) -> Vec<AnalysisStage> {
        AnalysisStage::ALL
            .into_iter()
            .filter(|stage| self.is_complete(*stage))
            .collect()
    }

    /// Returns the first stage that still has to run.
    #[must_use]
    pub fn next_stage(&self) -> Option<AnalysisStage> {
        AnalysisStage::ALL
            .into_iter()
            .find(|stage| !self.is_complete(*stage))
    }

    /// Clears `stage` and every stage after it so they run again.
    ///
    /// Earlier stages and the reserved keys are left untouched.
    pub fn reset_from(&mut self, stage: AnalysisStage) {
        for later in AnalysisStage::ALL.into_iter().filter(|s| *s >= stage) {
            match later {
                AnalysisStage::Analysis => self.analysis = None,
                AnalysisStage::LearnerExperience => self.learner_experience = None,
                AnalysisStage::Diagnosis => self.diagnosis = None,
                AnalysisStage::Improvements => self.improvements = None,
                AnalysisStage::HumanApproval => self.human_approval = None,
                AnalysisStage::Critique => self.critique = None,
                AnalysisStage::Synthesis => self.synthesis = None,
            }
        }
    }

    /// Number of quality-driven restarts so far.
    #[must_use]
    pub fn iteration_count(&self) -> u32 {
        self.iterations.unwrap_or(0)
    }

    /// Returns true if the approval gate rejected this run.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        self.status == Some(RunStatus::Rejected)
    }

    /// Marks the run as rejected.
    pub fn mark_rejected(&mut self, reason: impl Into<String>) {
        self.status = Some(RunStatus::Rejected);
        self.reason = Some(reason.into());
    }

    /// The synthesis quality score, coerced into `[0.0, 1.0]`.
    ///
    /// A missing synthesis or score, a non-numeric value, a non-finite
    /// number or a number outside the range yields `0.0`. Numeric strings
    /// are parsed.
    #[must_use]
    pub fn quality_score(&self) -> f64 {
        let raw = self
            .synthesis
            .as_ref()
            .and_then(|synthesis| synthesis.get("quality_score"));

        let score = match raw {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        };

        match score {
            Some(score) if score.is_finite() && (0.0..=1.0).contains(&score) => score,
            Some(score) => {
                tracing::warn!(quality_score = score, "Quality score out of range, using 0.0");
                0.0
            }
            None => {
                if raw.is_some() {
                    tracing::warn!(?raw, "Quality score is not numeric, using 0.0");
                }
                0.0
            }
        }
    }
}
