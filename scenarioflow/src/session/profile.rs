//! Per-stage session configuration.

use serde::{Deserialize, Serialize};

const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Configuration for the session a stage talks to.
///
/// Each stage picks its own temperature and system prompt; the session
/// implementation decides what to do with them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageProfile {
    /// Stage name, used for logging.
    pub name: String,
    /// Model identifier.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// System prompt for the stage.
    #[serde(default)]
    pub system_prompt: String,
}

impl StageProfile {
    /// Creates a profile with the default model.
    #[must_use]
    pub fn new(name: impl Into<String>, temperature: f32) -> Self {
        Self {
            name: name.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature,
            system_prompt: String::new(),
        }
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Tutorial structure analysis.
    #[must_use]
    pub fn analyzer() -> Self {
        Self::new("analyzer", 0.3).with_system_prompt(
            "You are an expert tutorial content analyzer. Extract the overall structure, \
             learning concepts, prerequisites, complexity level and code examples. \
             Return JSON with keys: structure, sections, concepts, complexity, examples",
        )
    }

    /// Learner simulation.
    #[must_use]
    pub fn learner_simulator() -> Self {
        Self::new("learner_simulator", 0.5).with_system_prompt(
            "You simulate a learner working through a tutorial for the first time. \
             Report where you get confused, stuck or lose motivation. Return JSON.",
        )
    }

    /// Issue diagnosis.
    #[must_use]
    pub fn diagnostician() -> Self {
        Self::new("diagnostician", 0.3).with_system_prompt(
            "You diagnose pedagogical issues in tutorials from a learner's experience. \
             Return JSON with keys: issues, summary",
        )
    }

    /// Improvement generation.
    #[must_use]
    pub fn improver() -> Self {
        Self::new("improver", 0.7).with_system_prompt(
            "You propose concrete, creative improvements for tutorial issues. \
             Return JSON with keys: suggestions",
        )
    }

    /// Improvement evaluation.
    #[must_use]
    pub fn critic() -> Self {
        Self::new("critic", 0.2).with_system_prompt(
            "You critically evaluate proposed tutorial improvements for effectiveness \
             and risk. Return JSON with keys: evaluations, overall_assessment",
        )
    }

    /// Final synthesis.
    #[must_use]
    pub fn synthesizer() -> Self {
        Self::new("synthesizer", 0.3).with_system_prompt(
            "You synthesize final, prioritized recommendations. \
             Return JSON with keys: recommendations, implementation_order, quality_score",
        )
    }

    /// Writing style analysis.
    #[must_use]
    pub fn style_analyzer() -> Self {
        Self::new("style_analyzer", 0.3).with_system_prompt(
            "You analyze an author's writing style: voice, tone, structure, vocabulary \
             and recurring patterns. Describe the style as a profile.",
        )
    }

    /// Draft writing.
    #[must_use]
    pub fn draft_writer() -> Self {
        Self::new("draft_writer", 0.7).with_system_prompt(
            "You write blog posts in the author's voice from their source material.",
        )
    }

    /// Source accuracy review.
    #[must_use]
    pub fn source_reviewer() -> Self {
        Self::new("source_reviewer", 0.2).with_system_prompt(
            "You are a strict accuracy reviewer. Check that a draft faithfully \
             represents its source material. Respond with JSON.",
        )
    }

    /// Style consistency review.
    #[must_use]
    pub fn style_reviewer() -> Self {
        Self::new("style_reviewer", 0.2).with_system_prompt(
            "You are a strict style reviewer. If a draft does not sound like the \
             author, it does not pass. Respond with JSON.",
        )
    }

    /// Feedback interpretation.
    #[must_use]
    pub fn feedback_incorporator() -> Self {
        Self::new("feedback_incorporator", 0.5).with_system_prompt(
            "You interpret [bracketed] reviewer comments in a draft and turn them into \
             specific revision actions. Respond with JSON.",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_have_distinct_names() {
        let names: Vec<String> = [
            StageProfile::analyzer(),
            StageProfile::learner_simulator(),
            StageProfile::diagnostician(),
            StageProfile::improver(),
            StageProfile::critic(),
            StageProfile::synthesizer(),
        ]
        .into_iter()
        .map(|p| p.name)
        .collect();

        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(deduped.len(), names.len());
    }

    #[test]
    fn test_builder() {
        let profile = StageProfile::new("custom", 0.1)
            .with_model("local-model")
            .with_temperature(0.9)
            .with_system_prompt("be brief");

        assert_eq!(profile.model, "local-model");
        assert!((profile.temperature - 0.9).abs() < f32::EPSILON);
        assert_eq!(profile.system_prompt, "be brief");
    }

    #[test]
    fn test_profile_deserializes_without_system_prompt() {
        let profile: StageProfile = serde_json::from_value(serde_json::json!({
            "name": "critic",
            "model": "m",
            "temperature": 0.2
        }))
        .unwrap();

        assert!(profile.system_prompt.is_empty());
    }
}
