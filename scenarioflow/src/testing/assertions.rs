//! Assertions over pipeline state.

use crate::state::{AnalysisStage, AnalysisState};

/// Asserts that every stage in `stages` has output in `state`.
pub fn assert_stage_keys(state: &AnalysisState, stages: &[AnalysisStage]) {
    for stage in stages {
        assert!(
            state.is_complete(*stage),
            "Expected '{}' in state, completed stages: {:?}",
            stage,
            state.completed_stages()
        );
    }
}

/// Asserts that no stage in `stages` has output in `state`.
pub fn assert_stages_absent(state: &AnalysisState, stages: &[AnalysisStage]) {
    for stage in stages {
        assert!(
            !state.is_complete(*stage),
            "Expected '{}' to be absent, completed stages: {:?}",
            stage,
            state.completed_stages()
        );
    }
}

/// Asserts that the approval gate rejected the run and nothing after it ran.
pub fn assert_rejected(state: &AnalysisState) {
    assert!(
        state.is_rejected(),
        "Expected status 'rejected', got {:?}",
        state.status
    );
    assert_stages_absent(state, &[AnalysisStage::Critique, AnalysisStage::Synthesis]);
}
