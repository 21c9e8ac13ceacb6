//! Pipeline configuration.

use serde::{Deserialize, Serialize};

/// Quality loop settings for [`AnalysisPipeline`](super::AnalysisPipeline).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Synthesis scores below this trigger another pass.
    pub quality_threshold: f64,
    /// Maximum number of quality-driven restarts.
    pub max_iterations: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 0.8,
            max_iterations: 3,
        }
    }
}

impl PipelineConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the quality threshold.
    #[must_use]
    pub fn with_quality_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    /// Sets the maximum number of restarts.
    #[must_use]
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Returns true if another pass is warranted.
    #[must_use]
    pub fn should_iterate(&self, quality_score: f64, iterations: u32) -> bool {
        quality_score < self.quality_threshold && iterations < self.max_iterations
    }
}

/// Review loop bounds for [`BlogPipeline`](super::BlogPipeline).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlogConfig {
    /// Source accuracy reviews per round.
    pub max_source_reviews: u32,
    /// Style consistency reviews per round.
    pub max_style_reviews: u32,
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            max_source_reviews: 3,
            max_style_reviews: 3,
        }
    }
}

impl BlogConfig {
    /// Sets the source review bound.
    #[must_use]
    pub fn with_max_source_reviews(mut self, max: u32) -> Self {
        self.max_source_reviews = max;
        self
    }

    /// Sets the style review bound.
    #[must_use]
    pub fn with_max_style_reviews(mut self, max: u32) -> Self {
        self.max_style_reviews = max;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert!((config.quality_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.max_iterations, 3);
        assert_eq!(BlogConfig::default().max_style_reviews, 3);
    }

    #[test]
    fn test_should_iterate() {
        let config = PipelineConfig::default();
        assert!(config.should_iterate(0.5, 0));
        assert!(config.should_iterate(0.79, 2));
        assert!(!config.should_iterate(0.5, 3));
        assert!(!config.should_iterate(0.8, 0));
        assert!(!config.should_iterate(0.95, 0));
    }

    #[test]
    fn test_partial_config_from_json() {
        let config: PipelineConfig =
            serde_json::from_value(serde_json::json!({"max_iterations": 1})).unwrap();
        assert_eq!(config, PipelineConfig::new().with_max_iterations(1));
    }
}
