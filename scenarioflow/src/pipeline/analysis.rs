//! The tutorial analysis executor.

use super::PipelineConfig;
use crate::approval::{ApprovalHandler, ApprovalRequest, AutoApprove};
use crate::errors::{Result, ScenarioError};
use crate::events::{NoOpProgress, ProgressSink};
use crate::observability::SpanTimer;
use crate::stages::TutorialStages;
use crate::state::{AnalysisStage, AnalysisState, Decision, StageResult};
use crate::store::{MemoryStateStore, StateStore};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Reason recorded in state when the approval gate rejects.
pub const REJECTION_REASON: &str = "User rejected improvements";

/// How a run of [`AnalysisPipeline`] ended.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    /// The synthesis score reached the threshold.
    QualityMet {
        /// Final quality score.
        quality_score: f64,
        /// Restarts it took.
        iterations: u32,
    },
    /// The restart budget ran out below the threshold.
    IterationsExhausted {
        /// Final quality score.
        quality_score: f64,
        /// Restarts performed.
        iterations: u32,
    },
    /// The approval gate said no. Later stages did not run.
    Rejected {
        /// Recorded reason.
        reason: String,
    },
}

impl PipelineOutcome {
    /// Returns true for [`PipelineOutcome::Rejected`].
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    /// Final quality score, absent on rejection.
    #[must_use]
    pub fn quality_score(&self) -> Option<f64> {
        match self {
            Self::QualityMet { quality_score, .. }
            | Self::IterationsExhausted { quality_score, .. } => Some(*quality_score),
            Self::Rejected { .. } => None,
        }
    }

    /// `"complete"` or `"rejected"`.
    #[must_use]
    pub fn status(&self) -> &'static str {
        if self.is_rejected() {
            "rejected"
        } else {
            "complete"
        }
    }
}

/// Runs the tutorial analysis stages over an [`AnalysisState`].
///
/// Stage order: analysis, learner experience, diagnosis, improvements,
/// approval gate, critique, synthesis. A stage runs only if its output is
/// absent from state, so a run over a resumed state picks up at the first
/// missing stage. After synthesis, a score below
/// [`PipelineConfig::quality_threshold`] clears improvements onward and
/// runs them again, at most [`PipelineConfig::max_iterations`] times.
pub struct AnalysisPipeline {
    stages: Arc<dyn TutorialStages>,
    config: PipelineConfig,
    approval: Arc<dyn ApprovalHandler>,
    progress: Arc<dyn ProgressSink>,
    store: Arc<dyn StateStore<AnalysisState>>,
}

impl AnalysisPipeline {
    /// Creates a pipeline with default config, auto-approval, no progress
    /// output and an in-memory store.
    pub fn new(stages: impl TutorialStages + 'static) -> Self {
        Self {
            stages: Arc::new(stages),
            config: PipelineConfig::default(),
            approval: Arc::new(AutoApprove),
            progress: Arc::new(NoOpProgress),
            store: Arc::new(MemoryStateStore::new()),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the approval collaborator.
    #[must_use]
    pub fn with_approval(mut self, approval: Arc<dyn ApprovalHandler>) -> Self {
        self.approval = approval;
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
    pub fn with_store(mut self, store: Arc<dyn StateStore<AnalysisState>>) -> Self {
        self.store = store;
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Loads the last checkpoint (or starts empty) and runs to completion.
    ///
    /// # Errors
    ///
    /// Store failures and anything [`AnalysisPipeline::run`] returns.
    pub async fn resume(&self, content: &str) -> Result<(AnalysisState, PipelineOutcome)> {
        let mut state = self.store.load()?.unwrap_or_default();
        let completed = state.completed_stages();
        if !completed.is_empty() {
            info!(
                completed = completed.len(),
                iterations = state.iteration_count(),
                "Resuming analysis from checkpoint"
            );
        }
        let outcome = self.run(content, &mut state).await?;
        Ok((state, outcome))
    }

    /// Runs every missing stage, then the quality loop, mutating `state`.
    ///
    /// # Errors
    ///
    /// The first stage, approval or store failure, unchanged. State is
    /// checkpointed up to the last completed stage.
    pub async fn run(&self, content: &str, state: &mut AnalysisState) -> Result<PipelineOutcome> {
        let timer = SpanTimer::start("analysis_pipeline");

        loop {
            if let Some(outcome) = self.run_pass(content, state).await? {
                info!(duration_ms = timer.elapsed_ms(), "Analysis rejected at approval gate");
                return Ok(outcome);
            }

            let quality_score = state.quality_score();
            let iterations = state.iteration_count();
            self.progress.report(&format!("Quality Score: {quality_score}"));

            if !self.config.should_iterate(quality_score, iterations) {
                let outcome = if quality_score >= self.config.quality_threshold {
                    PipelineOutcome::QualityMet {
                        quality_score,
                        iterations,
                    }
                } else {
                    PipelineOutcome::IterationsExhausted {
                        quality_score,
                        iterations,
                    }
                };
                info!(
                    quality_score,
                    iterations,
                    status = outcome.status(),
                    duration_ms = timer.elapsed_ms(),
                    "Analysis finished"
                );
                return Ok(outcome);
            }

            let next = iterations + 1;
            self.progress.report(&format!(
                "Score below threshold. Iterating... (attempt {next}/{})",
                self.config.max_iterations
            ));
            warn!(
                quality_score,
                threshold = self.config.quality_threshold,
                iteration = next,
                "Quality below threshold, regenerating improvements"
            );

            state.iterations = Some(next);
            state.reset_from(AnalysisStage::Improvements);
            self.checkpoint(state)?;
        }
    }

    /// One pass over the stages. Returns an outcome only on rejection.
    async fn run_pass(
        &self,
        content: &str,
        state: &mut AnalysisState,
    ) -> Result<Option<PipelineOutcome>> {
        if state.analysis.is_none() {
            let timer = self.begin(AnalysisStage::Analysis);
            state.analysis = Some(self.stages.analyze(content).await?);
            self.complete(AnalysisStage::Analysis, &timer, state)?;
        }

        if state.learner_experience.is_none() {
            let stage = AnalysisStage::LearnerExperience;
            let analysis = require(stage, "analysis", state.analysis.as_ref())?;
            let timer = self.begin(stage);
            state.learner_experience = Some(self.stages.simulate_learner(content, analysis).await?);
            self.complete(stage, &timer, state)?;
        }

        if state.diagnosis.is_none() {
            let stage = AnalysisStage::Diagnosis;
            let learner = require(stage, "learner_experience", state.learner_experience.as_ref())?;
            let analysis = require(stage, "analysis", state.analysis.as_ref())?;
            let timer = self.begin(stage);
            state.diagnosis = Some(self.stages.diagnose(learner, analysis).await?);
            self.complete(stage, &timer, state)?;
        }

        if state.improvements.is_none() {
            let stage = AnalysisStage::Improvements;
            let diagnosis = require(stage, "diagnosis", state.diagnosis.as_ref())?;
            let timer = self.begin(stage);
            state.improvements = Some(
                self.stages
                    .generate_improvements(diagnosis, state.focus_areas.as_deref())
                    .await?,
            );
            self.complete(stage, &timer, state)?;
        }

        match state.human_approval {
            None => {
                if let Some(outcome) = self.approval_gate(state).await? {
                    return Ok(Some(outcome));
                }
            }
            Some(Decision::No) => {
                debug!("Stored approval is a rejection, not asking again");
                return Ok(Some(self.reject(state)?));
            }
            Some(Decision::Yes) => {}
        }

        if state.critique.is_none() {
            let stage = AnalysisStage::Critique;
            let improvements = require(stage, "improvements", state.improvements.as_ref())?;
            let diagnosis = require(stage, "diagnosis", state.diagnosis.as_ref())?;
            let timer = self.begin(stage);
            state.critique = Some(self.stages.evaluate(improvements, diagnosis).await?);
            self.complete(stage, &timer, state)?;
        }

        if state.synthesis.is_none() {
            let stage = AnalysisStage::Synthesis;
            let critique = require(stage, "critique", state.critique.as_ref())?;
            let improvements = require(stage, "improvements", state.improvements.as_ref())?;
            let diagnosis = require(stage, "diagnosis", state.diagnosis.as_ref())?;
            let timer = self.begin(stage);
            state.synthesis = Some(
                self.stages
                    .synthesize(critique, improvements, diagnosis)
                    .await?,
            );
            self.complete(stage, &timer, state)?;
        }

        Ok(None)
    }

    async fn approval_gate(&self, state: &mut AnalysisState) -> Result<Option<PipelineOutcome>> {
        let stage = AnalysisStage::HumanApproval;
        let request = ApprovalRequest {
            improvements: require(stage, "improvements", state.improvements.as_ref())?.clone(),
            diagnosis: require(stage, "diagnosis", state.diagnosis.as_ref())?.clone(),
        };

        let timer = self.begin(stage);
        let answer = self.approval.request_approval(request).await?;
        state.human_approval = Some(answer.decision);

        if let Some(modifications) = answer.modifications.filter(|m| !m.is_empty()) {
            if let Some(improvements) = state.improvements.as_mut() {
                improvements.insert("modifications".to_string(), Value::String(modifications));
            }
        }

        if answer.decision == Decision::No {
            return Ok(Some(self.reject(state)?));
        }

        self.complete(stage, &timer, state)?;
        Ok(None)
    }

    fn reject(&self, state: &mut AnalysisState) -> Result<PipelineOutcome> {
        if !state.is_rejected() {
            state.mark_rejected(REJECTION_REASON);
        }
        self.checkpoint(state)?;

        let reason = state
            .reason
            .clone()
            .unwrap_or_else(|| REJECTION_REASON.to_string());
        self.progress.report(&format!("✗ Improvements rejected: {reason}"));
        Ok(PipelineOutcome::Rejected { reason })
    }

    fn begin(&self, stage: AnalysisStage) -> SpanTimer {
        self.progress.report(&stage.start_message());
        debug!(stage = %stage, "Stage started");
        SpanTimer::start(stage.key())
    }

    fn complete(&self, stage: AnalysisStage, timer: &SpanTimer, state: &AnalysisState) -> Result<()> {
        self.checkpoint(state)?;
        info!(
            stage = %stage,
            iteration = state.iteration_count(),
            duration_ms = timer.elapsed_ms(),
            "Stage completed"
        );
        self.progress.report(stage.done_message());
        Ok(())
    }

    fn checkpoint(&self, state: &AnalysisState) -> Result<()> {
        self.store.save(state)
    }
}

impl fmt::Debug for AnalysisPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisPipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn require<'a>(
    stage: AnalysisStage,
    key: &str,
    value: Option<&'a StageResult>,
) -> Result<&'a StageResult> {
    value.ok_or_else(|| ScenarioError::missing_input(stage.key(), key))
}
