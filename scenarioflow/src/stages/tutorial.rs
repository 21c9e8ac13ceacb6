//! Session-backed tutorial analysis stages.

use super::{render, TutorialStages};
use crate::errors::Result;
use crate::extraction::extract_object;
use crate::observability::SpanTimer;
use crate::session::{Session, SessionRequest, StageProfile};
use crate::state::StageResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Session configuration for each tutorial stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TutorialProfiles {
    /// Structure analysis.
    pub analyzer: StageProfile,
    /// Learner simulation.
    pub learner_simulator: StageProfile,
    /// Issue diagnosis.
    pub diagnostician: StageProfile,
    /// Improvement generation.
    pub improver: StageProfile,
    /// Improvement evaluation.
    pub critic: StageProfile,
    /// Final synthesis.
    pub synthesizer: StageProfile,
}

impl Default for TutorialProfiles {
    fn default() -> Self {
        Self {
            analyzer: StageProfile::analyzer(),
            learner_simulator: StageProfile::learner_simulator(),
            diagnostician: StageProfile::diagnostician(),
            improver: StageProfile::improver(),
            critic: StageProfile::critic(),
            synthesizer: StageProfile::synthesizer(),
        }
    }
}

/// [`TutorialStages`] backed by a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionTutorialStages<S> {
    session: S,
    profiles: TutorialProfiles,
}

impl<S: Session> SessionTutorialStages<S> {
    /// Creates stages using the preset profiles.
    pub fn new(session: S) -> Self {
        Self {
            session,
            profiles: TutorialProfiles::default(),
        }
    }

    /// Replaces the stage profiles.
    #[must_use]
    pub fn with_profiles(mut self, profiles: TutorialProfiles) -> Self {
        self.profiles = profiles;
        self
    }

    /// The stage profiles in use.
    pub fn profiles(&self) -> &TutorialProfiles {
        &self.profiles
    }

    async fn ask(&self, profile: &StageProfile, prompt: String) -> Result<StageResult> {
        let timer = SpanTimer::start(profile.name.as_str());
        let request = SessionRequest::new(profile.clone(), prompt);
        let response = self.session.execute(&request).await?;
        let result = extract_object(&response)?;
        debug!(
            stage = timer.name(),
            duration_ms = timer.elapsed_ms(),
            keys = result.len(),
            "Stage response extracted"
        );
        Ok(result)
    }
}

#[async_trait]
impl<S: Session> TutorialStages for SessionTutorialStages<S> {
    async fn analyze(&self, content: &str) -> Result<StageResult> {
        let prompt = format!(
            "Analyze this tutorial:\n\n{content}\n\n\
             Return JSON with:\n\
             - structure: Overall organization\n\
             - sections: List of sections with titles\n\
             - concepts: Key concepts introduced\n\
             - complexity: Level (beginner/intermediate/advanced)\n\
             - examples: Code examples present (boolean)\n"
        );
        self.ask(&self.profiles.analyzer, prompt).await
    }

    async fn simulate_learner(&self, content: &str, analysis: &StageResult) -> Result<StageResult> {
        let prompt = format!(
            "Simulate learning from this tutorial:\n\n\
             TUTORIAL:\n{content}\n\n\
             ANALYSIS:\n{}\n\n\
             As a learner encountering this for the first time, report:\n\
             - confusion_points: Where did you get stuck or confused?\n\
             - clarity_issues: What was hard to understand?\n\
             - missing_context: What background knowledge was assumed?\n\
             - suggestions: What would have helped?\n\n\
             Return as JSON.\n",
            render(analysis)
        );
        self.ask(&self.profiles.learner_simulator, prompt).await
    }

    async fn diagnose(
        &self,
        learner_experience: &StageResult,
        analysis: &StageResult,
    ) -> Result<StageResult> {
        let prompt = format!(
            "Diagnose pedagogical issues:\n\n\
             LEARNER EXPERIENCE:\n{}\n\n\
             TUTORIAL ANALYSIS:\n{}\n\n\
             Identify:\n\
             - issues: Specific pedagogical problems, each with a severity \
             (critical/major/minor)\n\
             - root_causes: Why these issues exist\n\
             - priority: Recommended fix order\n\
             - summary: primary_pedagogical_failure plus critical_issues, \
             major_issues and minor_issues counts\n\n\
             Return as JSON with arrays of issue objects.\n",
            render(learner_experience),
            render(analysis)
        );
        self.ask(&self.profiles.diagnostician, prompt).await
    }

    async fn generate_improvements(
        &self,
        diagnosis: &StageResult,
        focus_areas: Option<&[String]>,
    ) -> Result<StageResult> {
        let focus = match focus_areas {
            Some(areas) if !areas.is_empty() => format!("\nFocus areas: {}", areas.join(", ")),
            _ => String::new(),
        };
        let prompt = format!(
            "Generate improvements for this tutorial:\n\n\
             DIAGNOSIS:\n{}\n{focus}\n\n\
             Return JSON with:\n\
             - suggestions: an ARRAY of 5-8 objects, each with title, description \
             and location\n\
             - rationale: Why these improvements help learners\n\
             - examples: Implementation examples\n",
            render(diagnosis)
        );
        self.ask(&self.profiles.improver, prompt).await
    }

    async fn evaluate(
        &self,
        improvements: &StageResult,
        diagnosis: &StageResult,
    ) -> Result<StageResult> {
        let prompt = format!(
            "Evaluate these improvement suggestions:\n\n\
             IMPROVEMENTS:\n{}\n\n\
             ORIGINAL DIAGNOSIS:\n{}\n\n\
             Return JSON with:\n\
             - scores: specificity, actionability and impact, each 0.0 to 1.0\n\
             - strengths: What makes these improvements strong\n\
             - weaknesses: What could be improved\n\
             - overall_quality: 0.0 to 1.0\n",
            render(improvements),
            render(diagnosis)
        );
        self.ask(&self.profiles.critic, prompt).await
    }

    async fn synthesize(
        &self,
        critique: &StageResult,
        improvements: &StageResult,
        diagnosis: &StageResult,
    ) -> Result<StageResult> {
        let prompt = format!(
            "Synthesize final recommendations:\n\n\
             CRITIQUE:\n{}\n\n\
             IMPROVEMENTS:\n{}\n\n\
             ORIGINAL DIAGNOSIS:\n{}\n\n\
             Return JSON with:\n\
             - recommendations: prioritized list of actions\n\
             - implementation_order: list of recommendation indices\n\
             - quality_score: 0.0 to 1.0\n",
            render(critique),
            render(improvements),
            render(diagnosis)
        );
        self.ask(&self.profiles.synthesizer, prompt).await
    }
}
