//! Mock sessions and stages.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use super::fixtures::object;
use crate::errors::{Result, ScenarioError};
use crate::session::{Session, SessionRequest, SessionResponse};
use crate::stages::{BlogStages, TutorialStages};
use crate::state::{
    AnalysisStage, FeedbackInterpretation, SourceReview, StageResult, StyleReview, StyleSample,
};

/// A session that replays scripted responses in order and records every
/// request. Clones share the script and the recording.
///
/// Once the script runs out, calls fail with a session error.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSession {
    script: Arc<Mutex<VecDeque<std::result::Result<SessionResponse, String>>>>,
    requests: Arc<Mutex<Vec<SessionRequest>>>,
}

impl ScriptedSession {
    /// Creates a session replaying `responses`.
    #[must_use]
    pub fn new(responses: Vec<SessionResponse>) -> Self {
        Self {
            script: Arc::new(Mutex::new(responses.into_iter().map(Ok).collect())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Appends a response.
    pub fn push_response(&self, response: impl Into<SessionResponse>) {
        self.script.lock().push_back(Ok(response.into()));
    }

    /// Appends a failure.
    pub fn push_failure(&self, message: impl Into<String>) {
        self.script.lock().push_back(Err(message.into()));
    }

    /// Returns every request received so far.
    #[must_use]
    pub fn requests(&self) -> Vec<SessionRequest> {
        self.requests.lock().clone()
    }

    /// Returns the number of calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.requests.lock().len()
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn execute(&self, request: &SessionRequest) -> Result<SessionResponse> {
        self.requests.lock().push(request.clone());
        let next = self.script.lock().pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(ScenarioError::Session(anyhow::anyhow!(message))),
            None => Err(ScenarioError::Session(anyhow::anyhow!(
                "scripted session exhausted after {} calls",
                self.call_count()
            ))),
        }
    }
}

/// Tutorial stages returning canned results and counting calls.
///
/// Synthesis reports the configured quality scores in order, repeating the
/// last one once the list is exhausted.
#[derive(Debug)]
pub struct StubTutorialStages {
    calls: Mutex<HashMap<AnalysisStage, usize>>,
    scores: Mutex<VecDeque<f64>>,
    last_score: Mutex<f64>,
    fail_on: Mutex<Option<AnalysisStage>>,
    focus_areas: Mutex<Vec<Option<Vec<String>>>>,
}

impl Default for StubTutorialStages {
    fn default() -> Self {
        Self {
            calls: Mutex::new(HashMap::new()),
            scores: Mutex::new(VecDeque::new()),
            last_score: Mutex::new(0.9),
            fail_on: Mutex::new(None),
            focus_areas: Mutex::new(Vec::new()),
        }
    }
}

impl StubTutorialStages {
    /// Creates stubs whose synthesis always scores 0.9.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Synthesis always reports `score`.
    #[must_use]
    pub fn with_quality_score(self, score: f64) -> Self {
        *self.last_score.lock() = score;
        self
    }

    /// Synthesis reports `scores` in order, then repeats the last one.
    #[must_use]
    pub fn with_quality_scores(self, scores: Vec<f64>) -> Self {
        if let Some(last) = scores.last() {
            *self.last_score.lock() = *last;
        }
        *self.scores.lock() = scores.into();
        self
    }

    /// Makes `stage` fail with a session error.
    pub fn fail_on(&self, stage: AnalysisStage) {
        *self.fail_on.lock() = Some(stage);
    }

    /// Stops failing.
    pub fn recover(&self) {
        *self.fail_on.lock() = None;
    }

    /// Number of times `stage` was invoked.
    #[must_use]
    pub fn call_count(&self, stage: AnalysisStage) -> usize {
        self.calls.lock().get(&stage).copied().unwrap_or(0)
    }

    /// Total invocations across all stages.
    #[must_use]
    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }

    /// Focus areas passed to each improvement call.
    #[must_use]
    pub fn focus_areas_seen(&self) -> Vec<Option<Vec<String>>> {
        self.focus_areas.lock().clone()
    }

    fn enter(&self, stage: AnalysisStage) -> Result<()> {
        *self.calls.lock().entry(stage).or_insert(0) += 1;
        if *self.fail_on.lock() == Some(stage) {
            return Err(ScenarioError::Session(anyhow::anyhow!("{stage} failed")));
        }
        Ok(())
    }

    fn next_score(&self) -> f64 {
        match self.scores.lock().pop_front() {
            Some(score) => score,
            None => *self.last_score.lock(),
        }
    }
}

#[async_trait]
impl TutorialStages for StubTutorialStages {
    async fn analyze(&self, _content: &str) -> Result<StageResult> {
        self.enter(AnalysisStage::Analysis)?;
        Ok(object(json!({
            "structure": "linear",
            "sections": ["Setup", "First program"],
            "concepts": ["ownership"],
            "complexity": "beginner",
            "examples": true
        })))
    }

    async fn simulate_learner(&self, _content: &str, _analysis: &StageResult) -> Result<StageResult> {
        self.enter(AnalysisStage::LearnerExperience)?;
        Ok(object(json!({
            "confusion_points": [{"issue": "Borrowing appears before it is explained", "location": "Step 3"}],
            "missing_context": ["What a stack frame is"]
        })))
    }

    async fn diagnose(
        &self,
        _learner_experience: &StageResult,
        _analysis: &StageResult,
    ) -> Result<StageResult> {
        self.enter(AnalysisStage::Diagnosis)?;
        Ok(object(json!({
            "issues": [{"issue": "Concept used before introduction", "severity": "major"}],
            "summary": {
                "primary_pedagogical_failure": "Forward references",
                "critical_issues": 0,
                "major_issues": 1,
                "minor_issues": 0
            }
        })))
    }

    async fn generate_improvements(
        &self,
        _diagnosis: &StageResult,
        focus_areas: Option<&[String]>,
    ) -> Result<StageResult> {
        self.enter(AnalysisStage::Improvements)?;
        self.focus_areas.lock().push(focus_areas.map(<[String]>::to_vec));
        let attempt = self.call_count(AnalysisStage::Improvements);
        Ok(object(json!({
            "suggestions": [{
                "title": format!("Introduce borrowing earlier (attempt {attempt})"),
                "description": "Move the borrowing section before Step 3",
                "location": "Step 2"
            }],
            "rationale": "Removes a forward reference"
        })))
    }

    async fn evaluate(
        &self,
        _improvements: &StageResult,
        _diagnosis: &StageResult,
    ) -> Result<StageResult> {
        self.enter(AnalysisStage::Critique)?;
        Ok(object(json!({
            "scores": {"specificity": 0.8, "actionability": 0.9, "impact": 0.7},
            "overall_quality": 0.8
        })))
    }

    async fn synthesize(
        &self,
        _critique: &StageResult,
        _improvements: &StageResult,
        _diagnosis: &StageResult,
    ) -> Result<StageResult> {
        self.enter(AnalysisStage::Synthesis)?;
        Ok(object(json!({
            "recommendations": ["Introduce borrowing before Step 3"],
            "implementation_order": [1],
            "quality_score": self.next_score()
        })))
    }
}

/// Blog stages with scripted review results.
///
/// Reviews pop from their queues and pass once a queue is empty. Drafts are
/// numbered so tests can tell revisions apart.
#[derive(Debug, Default)]
pub struct StubBlogStages {
    source_reviews: Mutex<VecDeque<SourceReview>>,
    style_reviews: Mutex<VecDeque<StyleReview>>,
    interpretation: Mutex<Option<FeedbackInterpretation>>,
    guidance: Mutex<Vec<Option<String>>>,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl StubBlogStages {
    /// Creates stubs whose reviews always pass.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues source review results.
    #[must_use]
    pub fn with_source_reviews(self, reviews: Vec<SourceReview>) -> Self {
        *self.source_reviews.lock() = reviews.into();
        self
    }

    /// Queues style review results.
    #[must_use]
    pub fn with_style_reviews(self, reviews: Vec<StyleReview>) -> Self {
        *self.style_reviews.lock() = reviews.into();
        self
    }

    /// Sets the feedback interpretation to return.
    #[must_use]
    pub fn with_interpretation(self, interpretation: FeedbackInterpretation) -> Self {
        *self.interpretation.lock() = Some(interpretation);
        self
    }

    /// Number of calls to the named stage method.
    #[must_use]
    pub fn call_count(&self, stage: &str) -> usize {
        self.calls.lock().get(stage).copied().unwrap_or(0)
    }

    /// Guidance passed to each draft generation, in order.
    #[must_use]
    pub fn guidance_seen(&self) -> Vec<Option<String>> {
        self.guidance.lock().clone()
    }

    fn record(&self, stage: &'static str) -> usize {
        let mut calls = self.calls.lock();
        let count = calls.entry(stage).or_insert(0);
        *count += 1;
        *count
    }
}

#[async_trait]
impl BlogStages for StubBlogStages {
    async fn analyze_style(&self, samples: &[StyleSample]) -> Result<String> {
        self.record("analyze_style");
        Ok(format!("Conversational voice learned from {} samples", samples.len()))
    }

    async fn generate_draft(
        &self,
        _source: &str,
        _style_profile: &str,
        guidance: Option<&str>,
    ) -> Result<String> {
        let n = self.record("generate_draft");
        self.guidance.lock().push(guidance.map(str::to_string));
        Ok(format!("# Draft {n}\n\nBody"))
    }

    async fn review_source(&self, _source: &str, _draft: &str) -> Result<SourceReview> {
        self.record("review_source");
        Ok(self.source_reviews.lock().pop_front().unwrap_or(SourceReview {
            passed: true,
            ..SourceReview::default()
        }))
    }

    async fn review_style(
        &self,
        _style_profile: &str,
        _samples: &[StyleSample],
        _draft: &str,
    ) -> Result<StyleReview> {
        self.record("review_style");
        Ok(self.style_reviews.lock().pop_front().unwrap_or(StyleReview {
            passed: true,
            ..StyleReview::default()
        }))
    }

    async fn interpret_feedback(
        &self,
        _draft_with_feedback: &str,
        _source: &str,
        _style_profile: &str,
    ) -> Result<FeedbackInterpretation> {
        self.record("interpret_feedback");
        Ok(self
            .interpretation
            .lock()
            .clone()
            .unwrap_or_else(FeedbackInterpretation::none))
    }
}
