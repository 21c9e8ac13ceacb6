//! Sample inputs and prebuilt states.

use serde_json::{json, Value};

use crate::state::{AnalysisStage, AnalysisState, Decision, StageResult, StyleSample};

/// Unwraps a JSON object literal into a [`StageResult`].
///
/// # Panics
///
/// If `value` is not an object.
#[must_use]
pub fn object(value: Value) -> StageResult {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture is not a JSON object: {other}"),
    }
}

/// A short tutorial with an obvious forward reference.
#[must_use]
pub fn sample_tutorial() -> &'static str {
    "# Getting Started with Rust\n\n\
     ## Step 1: Install\n\nRun `rustup`.\n\n\
     ## Step 2: Hello world\n\n```rust\nfn main() { println!(\"hi\"); }\n```\n\n\
     ## Step 3: Functions\n\nPass `&name` so the function borrows it.\n"
}

/// Two short writing samples.
#[must_use]
pub fn sample_style_samples() -> Vec<StyleSample> {
    vec![
        StyleSample::new("first.md", "I like short sentences. They land."),
        StyleSample::new("second.md", "Here's the thing: most advice is noise."),
    ]
}

/// A state in which `last` and every stage before it have completed.
///
/// The approval gate, if included, is recorded as approved.
#[must_use]
pub fn state_through(last: AnalysisStage) -> AnalysisState {
    let mut state = AnalysisState::new();
    for stage in AnalysisStage::ALL.into_iter().filter(|s| *s <= last) {
        let output = |v: Value| Some(object(v));
        match stage {
            AnalysisStage::Analysis => state.analysis = output(json!({"complexity": "beginner"})),
            AnalysisStage::LearnerExperience => {
                state.learner_experience = output(json!({"confusion_points": []}));
            }
            AnalysisStage::Diagnosis => state.diagnosis = output(json!({"issues": []})),
            AnalysisStage::Improvements => {
                state.improvements = output(json!({"suggestions": []}));
            }
            AnalysisStage::HumanApproval => state.human_approval = Some(Decision::Yes),
            AnalysisStage::Critique => state.critique = output(json!({"overall_quality": 0.8})),
            AnalysisStage::Synthesis => {
                state.synthesis = output(json!({"recommendations": [], "quality_score": 0.9}));
            }
        }
    }
    state
}
