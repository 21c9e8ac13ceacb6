//! End-to-end tests for both pipelines over stubbed stages.

#[cfg(test)]
mod tests {
    use crate::approval::{ApprovalDecision, ApprovalRequest, ApprovalService, FnApproval};
    use crate::errors::{Result, ScenarioError};
    use crate::events::CollectingProgress;
    use crate::pipeline::{
        AnalysisPipeline, BlogConfig, BlogPipeline, PipelineConfig, PipelineOutcome,
        REJECTION_REASON,
    };
    use crate::session::{Session, SessionRequest, SessionResponse};
    use crate::stages::SessionTutorialStages;
    use crate::state::{
        AnalysisStage, AnalysisState, BlogState, Decision, FeedbackInterpretation, RunStatus,
        Severity, SourceReview, StyleReview,
    };
    use crate::store::{JsonFileStateStore, MemoryStateStore, StateStore};
    use crate::testing::{
        assert_rejected, assert_stage_keys, assert_stages_absent, sample_style_samples,
        sample_tutorial, state_through, StubBlogStages, StubTutorialStages,
    };
    use async_trait::async_trait;
    use futures::FutureExt;
    use mockall::mock;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::TempDir;

    use AnalysisStage::{
        Analysis, Critique, Diagnosis, HumanApproval, Improvements, LearnerExperience, Synthesis,
    };

    const AFTER_APPROVAL: [AnalysisStage; 2] = [Critique, Synthesis];

    fn analysis_pipeline(
        stages: &Arc<StubTutorialStages>,
    ) -> (
        AnalysisPipeline,
        Arc<MemoryStateStore<AnalysisState>>,
        Arc<CollectingProgress>,
    ) {
        let store = Arc::new(MemoryStateStore::new());
        let progress = Arc::new(CollectingProgress::new());
        let pipeline = AnalysisPipeline::new(stages.clone())
            .with_store(store.clone())
            .with_progress(progress.clone());
        (pipeline, store, progress)
    }

    fn rejecting() -> Arc<FnApproval> {
        Arc::new(FnApproval::new(|_| {
            async { Ok(ApprovalDecision::reject()) }.boxed()
        }))
    }

    #[tokio::test]
    async fn test_fresh_run_completes_every_stage() {
        let stages = Arc::new(StubTutorialStages::new());
        let (pipeline, store, progress) = analysis_pipeline(&stages);
        let mut state = AnalysisState::new();

        let outcome = pipeline.run(sample_tutorial(), &mut state).await.unwrap();

        assert_eq!(
            outcome,
            PipelineOutcome::QualityMet {
                quality_score: 0.9,
                iterations: 0
            }
        );
        assert_stage_keys(&state, &AnalysisStage::ALL);
        assert_eq!(state.human_approval, Some(Decision::Yes));
        assert!(state.iterations.is_none());
        assert_eq!(stages.total_calls(), 6);
        assert_eq!(store.snapshot(), Some(state));
        assert_eq!(
            progress.messages_starting_with("Quality Score"),
            vec!["Quality Score: 0.9".to_string()]
        );
    }

    #[tokio::test]
    async fn test_completed_stages_are_not_rerun() {
        let stages = Arc::new(StubTutorialStages::new());
        let (pipeline, _store, _progress) = analysis_pipeline(&stages);
        let mut state = state_through(Analysis);
        let original = state.analysis.clone();

        pipeline.run(sample_tutorial(), &mut state).await.unwrap();

        assert_eq!(stages.call_count(Analysis), 0);
        assert_eq!(state.analysis, original);
        assert_stage_keys(&state, &[LearnerExperience, Diagnosis, Improvements, Critique, Synthesis]);
    }

    #[tokio::test]
    async fn test_complete_state_makes_no_calls() {
        let stages = Arc::new(StubTutorialStages::new());
        let (pipeline, _store, _progress) = analysis_pipeline(&stages);
        let mut state = state_through(Synthesis);

        let outcome = pipeline.run(sample_tutorial(), &mut state).await.unwrap();

        assert_eq!(stages.total_calls(), 0);
        assert_eq!(outcome.quality_score(), Some(0.9));
    }

    #[tokio::test]
    async fn test_rejection_stops_before_critique() {
        let stages = Arc::new(StubTutorialStages::new());
        let (pipeline, store, progress) = analysis_pipeline(&stages);
        let pipeline = pipeline.with_approval(rejecting());
        let mut state = AnalysisState::new();

        let outcome = pipeline.run(sample_tutorial(), &mut state).await.unwrap();

        assert_eq!(
            outcome,
            PipelineOutcome::Rejected {
                reason: REJECTION_REASON.to_string()
            }
        );
        assert_rejected(&state);
        assert_eq!(state.status, Some(RunStatus::Rejected));
        assert_eq!(state.human_approval, Some(Decision::No));
        assert_eq!(stages.call_count(Critique), 0);
        assert_eq!(stages.call_count(Synthesis), 0);
        assert_eq!(store.snapshot(), Some(state));
        assert!(progress
            .messages()
            .contains(&format!("✗ Improvements rejected: {REJECTION_REASON}")));
    }

    #[tokio::test]
    async fn test_stored_rejection_is_not_asked_again() {
        let asked = Arc::new(AtomicUsize::new(0));
        let counter = asked.clone();
        let approval = Arc::new(FnApproval::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(ApprovalDecision::approve()) }.boxed()
        }));

        let stages = Arc::new(StubTutorialStages::new());
        let (pipeline, _store, _progress) = analysis_pipeline(&stages);
        let pipeline = pipeline.with_approval(approval);
        let mut state = state_through(Improvements);
        state.human_approval = Some(Decision::No);

        let outcome = pipeline.run(sample_tutorial(), &mut state).await.unwrap();

        assert!(outcome.is_rejected());
        assert_eq!(asked.load(Ordering::SeqCst), 0);
        assert_rejected(&state);
    }

    #[tokio::test]
    async fn test_approval_through_service() {
        let service = Arc::new(ApprovalService::new());
        let stages = Arc::new(StubTutorialStages::new());
        let (pipeline, _store, _progress) = analysis_pipeline(&stages);
        let pipeline = pipeline.with_approval(service.clone());

        let responder = {
            let service = service.clone();
            tokio::spawn(async move {
                loop {
                    if let Some(id) = service.pending_requests().first().copied() {
                        let request = service.request(id).unwrap();
                        assert!(request.improvements.contains_key("suggestions"));
                        service.respond(id, ApprovalDecision::reject());
                        return;
                    }
                    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                }
            })
        };

        let mut state = AnalysisState::new();
        let outcome = pipeline.run(sample_tutorial(), &mut state).await.unwrap();
        responder.await.unwrap();

        assert!(outcome.is_rejected());
        assert_stages_absent(&state, &AFTER_APPROVAL);
    }

    #[tokio::test]
    async fn test_modifications_are_recorded() {
        let approval = Arc::new(FnApproval::new(|request: ApprovalRequest| {
            assert!(request.diagnosis.contains_key("summary"));
            async { Ok(ApprovalDecision::approve().with_modifications("Add a diagram")) }.boxed()
        }));
        let stages = Arc::new(StubTutorialStages::new());
        let (pipeline, _store, _progress) = analysis_pipeline(&stages);
        let pipeline = pipeline.with_approval(approval);
        let mut state = AnalysisState::new();

        pipeline.run(sample_tutorial(), &mut state).await.unwrap();

        let improvements = state.improvements.as_ref().unwrap();
        assert_eq!(improvements["modifications"], json!("Add a diagram"));
        assert!(state.synthesis.is_some());
    }

    #[tokio::test]
    async fn test_low_quality_iterates_to_the_limit() {
        let stages = Arc::new(StubTutorialStages::new().with_quality_score(0.5));
        let (pipeline, _store, progress) = analysis_pipeline(&stages);
        let mut state = AnalysisState::new();

        let outcome = pipeline.run(sample_tutorial(), &mut state).await.unwrap();

        assert_eq!(
            outcome,
            PipelineOutcome::IterationsExhausted {
                quality_score: 0.5,
                iterations: 3
            }
        );
        assert_eq!(state.iterations, Some(3));
        assert!(state.synthesis.is_some());
        assert_eq!(stages.call_count(Improvements), 4);
        assert_eq!(stages.call_count(Synthesis), 4);
        assert_eq!(stages.call_count(Analysis), 1);
        assert_eq!(stages.call_count(Diagnosis), 1);
        assert_eq!(
            progress.messages_starting_with("Score below threshold"),
            vec![
                "Score below threshold. Iterating... (attempt 1/3)".to_string(),
                "Score below threshold. Iterating... (attempt 2/3)".to_string(),
                "Score below threshold. Iterating... (attempt 3/3)".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_high_quality_skips_iteration() {
        let stages = Arc::new(StubTutorialStages::new().with_quality_score(0.95));
        let (pipeline, _store, _progress) = analysis_pipeline(&stages);
        let mut state = AnalysisState::new();

        pipeline.run(sample_tutorial(), &mut state).await.unwrap();

        assert!(state.iterations.is_none());
        assert_eq!(stages.call_count(Analysis), 1);
        assert_eq!(stages.call_count(Diagnosis), 1);
        assert_eq!(stages.call_count(Improvements), 1);
    }

    #[tokio::test]
    async fn test_quality_recovers_mid_loop() {
        let stages = Arc::new(StubTutorialStages::new().with_quality_scores(vec![0.4, 0.85]));
        let (pipeline, _store, _progress) = analysis_pipeline(&stages);
        let mut state = AnalysisState::new();

        let outcome = pipeline.run(sample_tutorial(), &mut state).await.unwrap();

        assert_eq!(
            outcome,
            PipelineOutcome::QualityMet {
                quality_score: 0.85,
                iterations: 1
            }
        );
        assert_eq!(stages.call_count(Improvements), 2);
    }

    #[tokio::test]
    async fn test_iteration_reasks_approval() {
        let asked = Arc::new(AtomicUsize::new(0));
        let counter = asked.clone();
        let approval = Arc::new(FnApproval::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(ApprovalDecision::approve()) }.boxed()
        }));
        let stages = Arc::new(StubTutorialStages::new().with_quality_scores(vec![0.2, 0.9]));
        let (pipeline, _store, _progress) = analysis_pipeline(&stages);
        let pipeline = pipeline.with_approval(approval);
        let mut state = AnalysisState::new();

        pipeline.run(sample_tutorial(), &mut state).await.unwrap();

        assert_eq!(asked.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_custom_threshold_and_budget() {
        let stages = Arc::new(StubTutorialStages::new().with_quality_score(0.7));
        let (pipeline, _store, _progress) = analysis_pipeline(&stages);
        let pipeline = pipeline.with_config(
            PipelineConfig::new()
                .with_quality_threshold(0.6)
                .with_max_iterations(1),
        );
        let mut state = AnalysisState::new();

        let outcome = pipeline.run(sample_tutorial(), &mut state).await.unwrap();

        assert_eq!(outcome.quality_score(), Some(0.7));
        assert_eq!(stages.call_count(Improvements), 1);
    }

    #[tokio::test]
    async fn test_focus_areas_reach_improvements() {
        let stages = Arc::new(StubTutorialStages::new());
        let (pipeline, _store, _progress) = analysis_pipeline(&stages);
        let mut state = AnalysisState::new().with_focus_areas(vec!["examples".to_string()]);

        pipeline.run(sample_tutorial(), &mut state).await.unwrap();

        assert_eq!(
            stages.focus_areas_seen(),
            vec![Some(vec!["examples".to_string()])]
        );
    }

    #[tokio::test]
    async fn test_stage_failure_keeps_checkpoint_and_resumes() {
        let stages = Arc::new(StubTutorialStages::new());
        let (pipeline, store, _progress) = analysis_pipeline(&stages);
        stages.fail_on(Diagnosis);

        let err = pipeline.resume(sample_tutorial()).await.unwrap_err();
        assert!(matches!(err, ScenarioError::Session(_)));

        let checkpoint = store.snapshot().unwrap();
        assert_stage_keys(&checkpoint, &[Analysis, LearnerExperience]);
        assert_stages_absent(&checkpoint, &[Diagnosis, Improvements, HumanApproval]);

        stages.recover();
        let (state, outcome) = pipeline.resume(sample_tutorial()).await.unwrap();

        assert!(!outcome.is_rejected());
        assert_stage_keys(&state, &AnalysisStage::ALL);
        assert_eq!(stages.call_count(Analysis), 1);
        assert_eq!(stages.call_count(LearnerExperience), 1);
        assert_eq!(stages.call_count(Diagnosis), 2);
    }

    #[tokio::test]
    async fn test_checkpoint_after_every_stage() {
        let stages = Arc::new(StubTutorialStages::new());
        let (pipeline, store, _progress) = analysis_pipeline(&stages);
        let mut state = AnalysisState::new();

        pipeline.run(sample_tutorial(), &mut state).await.unwrap();

        assert_eq!(store.save_count(), AnalysisStage::ALL.len());
    }

    #[tokio::test]
    async fn test_resume_from_json_file() {
        let dir = TempDir::new().unwrap();
        let store: Arc<JsonFileStateStore<AnalysisState>> =
            Arc::new(JsonFileStateStore::in_session_dir(dir.path()));
        store.save(&state_through(Diagnosis)).unwrap();

        let stages = Arc::new(StubTutorialStages::new());
        let pipeline = AnalysisPipeline::new(stages.clone()).with_store(store.clone());
        let (state, _outcome) = pipeline.resume(sample_tutorial()).await.unwrap();

        assert_eq!(stages.call_count(Analysis), 0);
        assert_eq!(stages.call_count(Diagnosis), 0);
        assert_eq!(stages.call_count(Improvements), 1);
        assert_eq!(store.load().unwrap(), Some(state));
    }

    mock! {
        pub Model {}

        #[async_trait]
        impl Session for Model {
            async fn execute(&self, request: &SessionRequest) -> Result<SessionResponse>;
        }
    }

    #[tokio::test]
    async fn test_session_stages_drive_pipeline() {
        let mut model = MockModel::new();
        model
            .expect_execute()
            .times(6)
            .returning(|request: &SessionRequest| {
                let body = match request.profile.name.as_str() {
                    "synthesizer" => json!({"recommendations": ["Reorder"], "quality_score": 0.92}),
                    "analyzer" => json!({"complexity": "beginner"}),
                    other => json!({ "stage": other }),
                };
                Ok(SessionResponse::Text(format!(
                    "Here is my answer:\n```json\n{body}\n```"
                )))
            });

        let pipeline = AnalysisPipeline::new(SessionTutorialStages::new(model));
        let mut state = AnalysisState::new();
        let outcome = pipeline.run(sample_tutorial(), &mut state).await.unwrap();

        assert_eq!(outcome.quality_score(), Some(0.92));
        assert_eq!(state.analysis.unwrap()["complexity"], json!("beginner"));
    }

    #[tokio::test]
    async fn test_unparseable_response_surfaces_extraction_error() {
        let mut model = MockModel::new();
        model
            .expect_execute()
            .times(1)
            .returning(|_| Ok(SessionResponse::Text("I could not analyze this.".to_string())));

        let pipeline = AnalysisPipeline::new(SessionTutorialStages::new(model));
        let mut state = AnalysisState::new();
        let err = pipeline.run(sample_tutorial(), &mut state).await.unwrap_err();

        assert!(err.is_extraction());
        assert!(state.analysis.is_none());
    }

    fn blog_pipeline(
        stages: &Arc<StubBlogStages>,
    ) -> (BlogPipeline, Arc<MemoryStateStore<BlogState>>, Arc<CollectingProgress>) {
        let store = Arc::new(MemoryStateStore::new());
        let progress = Arc::new(CollectingProgress::new());
        let pipeline = BlogPipeline::new(stages.clone())
            .with_store(store.clone())
            .with_progress(progress.clone());
        (pipeline, store, progress)
    }

    fn failing_source_review() -> SourceReview {
        SourceReview {
            passed: false,
            issues: vec!["Claims a 10x speedup the notes never mention".to_string()],
            severity: Severity::Major,
            ..SourceReview::default()
        }
    }

    fn failing_style_review() -> StyleReview {
        StyleReview {
            passed: false,
            tone_issues: vec!["Too formal".to_string()],
            severity: Severity::Critical,
            ..StyleReview::default()
        }
    }

    const SOURCE: &str = "Notes: caching cut p99 latency by half.";

    #[tokio::test]
    async fn test_blog_initial_run() {
        let stages = Arc::new(StubBlogStages::new());
        let (pipeline, store, progress) = blog_pipeline(&stages);
        let mut state = BlogState::new();

        let outcome = pipeline
            .run(SOURCE, &sample_style_samples(), None, &mut state)
            .await
            .unwrap();

        assert_eq!(outcome.final_draft, "# Draft 1\n\nBody");
        assert!(outcome.source_verified);
        assert!(outcome.style_verified);
        assert_eq!(outcome.source_reviews_completed, 1);
        assert_eq!(outcome.style_reviews_completed, 1);
        assert_eq!(state.iteration, 1);
        assert_eq!(state.drafts.len(), 1);
        assert_eq!(stages.guidance_seen(), vec![None]);
        assert_eq!(store.snapshot().unwrap().current_draft, state.current_draft);
        assert!(progress.messages().contains(&"✓ Source accuracy verified".to_string()));
    }

    #[tokio::test]
    async fn test_blog_source_review_revises_draft() {
        let stages = Arc::new(
            StubBlogStages::new().with_source_reviews(vec![failing_source_review()]),
        );
        let (pipeline, _store, _progress) = blog_pipeline(&stages);
        let mut state = BlogState::new();

        let outcome = pipeline
            .run(SOURCE, &sample_style_samples(), None, &mut state)
            .await
            .unwrap();

        assert!(outcome.source_verified);
        assert_eq!(outcome.source_reviews_completed, 2);
        assert_eq!(outcome.final_draft, "# Draft 2\n\nBody");
        let labels: Vec<_> = state.drafts.iter().map(|d| d.label()).collect();
        assert_eq!(labels, vec!["draft_iter_1", "draft_iter_1_source_rev_1"]);
        let guidance = stages.guidance_seen();
        assert!(guidance[1].as_deref().unwrap().contains("10x speedup"));
    }

    #[tokio::test]
    async fn test_blog_review_loops_are_bounded() {
        let stages = Arc::new(
            StubBlogStages::new()
                .with_source_reviews(vec![failing_source_review(); 5])
                .with_style_reviews(vec![failing_style_review(); 5]),
        );
        let (pipeline, _store, _progress) = blog_pipeline(&stages);
        let pipeline = pipeline.with_config(BlogConfig::default().with_max_style_reviews(2));
        let mut state = BlogState::new();

        let outcome = pipeline
            .run(SOURCE, &sample_style_samples(), None, &mut state)
            .await
            .unwrap();

        assert!(!outcome.source_verified);
        assert!(!outcome.style_verified);
        assert_eq!(stages.call_count("review_source"), 3);
        assert_eq!(stages.call_count("review_style"), 2);
        assert_eq!(state.source_reviews.len(), 3);
        assert_eq!(state.style_reviews.len(), 2);
        assert_eq!(
            state.drafts.last().unwrap().sub_version.as_deref(),
            Some("style_rev_2")
        );
    }

    #[tokio::test]
    async fn test_blog_minor_severity_is_accepted() {
        let minor = SourceReview {
            passed: false,
            issues: vec!["Slight rewording".to_string()],
            severity: Severity::Minor,
            ..SourceReview::default()
        };
        let stages = Arc::new(StubBlogStages::new().with_source_reviews(vec![minor]));
        let (pipeline, _store, _progress) = blog_pipeline(&stages);
        let mut state = BlogState::new();

        let outcome = pipeline
            .run(SOURCE, &sample_style_samples(), None, &mut state)
            .await
            .unwrap();

        assert!(outcome.source_verified);
        assert_eq!(stages.call_count("generate_draft"), 1);
    }

    #[tokio::test]
    async fn test_blog_feedback_revises_and_resets_reviews() {
        let interpretation = FeedbackInterpretation {
            overall_guidance: "Cut the intro".to_string(),
            priority: "high".to_string(),
            ..FeedbackInterpretation::none()
        };
        let stages = Arc::new(StubBlogStages::new().with_interpretation(interpretation));
        let (pipeline, _store, _progress) = blog_pipeline(&stages);
        let mut state = BlogState::new();
        let samples = sample_style_samples();

        pipeline.run(SOURCE, &samples, None, &mut state).await.unwrap();
        let outcome = pipeline
            .run(SOURCE, &samples, Some("# Draft 1\n\n[too long] Body"), &mut state)
            .await
            .unwrap();

        assert_eq!(state.iteration, 2);
        assert_eq!(state.user_feedback.len(), 1);
        assert_eq!(outcome.source_reviews_completed, 1);
        assert_eq!(stages.call_count("analyze_style"), 1);
        assert_eq!(stages.call_count("review_source"), 2);
        assert!(stages.guidance_seen()[1]
            .as_deref()
            .unwrap()
            .contains("Cut the intro"));
    }

    #[tokio::test]
    async fn test_blog_resume_skips_finished_work() {
        let stages = Arc::new(StubBlogStages::new());
        let (pipeline, store, _progress) = blog_pipeline(&stages);
        let samples = sample_style_samples();

        pipeline.resume(SOURCE, &samples, None).await.unwrap();
        let (state, outcome) = pipeline.resume(SOURCE, &samples, None).await.unwrap();

        assert_eq!(stages.call_count("analyze_style"), 1);
        assert_eq!(stages.call_count("generate_draft"), 1);
        assert_eq!(stages.call_count("review_source"), 2);
        assert_eq!(state.source_reviews_completed, 2);
        assert!(outcome.source_verified);
        assert_eq!(store.snapshot(), Some(state));
    }
}
