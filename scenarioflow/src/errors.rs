//! Error types for scenarioflow.
//!
//! Every fallible operation in the crate returns [`ScenarioError`]. Extraction
//! problems get their own [`ExtractionError`] so callers can tell "the model
//! said nothing usable" apart from "the model returned the wrong shape".

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Number of characters of the offending text kept in extraction errors.
pub const PREVIEW_CHARS: usize = 300;

/// Convenience alias used throughout the crate.
pub type Result<T, E = ScenarioError> = std::result::Result<T, E>;

/// The main error type for scenarioflow operations.
#[derive(Debug, Error)]
pub enum ScenarioError {
    /// Structured data could not be recovered from a model response.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// The session/model collaborator failed. The source is kept untouched.
    #[error(transparent)]
    Session(#[from] anyhow::Error),

    /// The approval collaborator failed or the request was cancelled.
    #[error("Approval failed: {0}")]
    Approval(String),

    /// A stage ran without the output of a stage it depends on.
    #[error("Stage '{stage}' requires '{missing}' which is not present in state")]
    MissingInput {
        /// The stage that was about to run.
        stage: String,
        /// The state key it needed.
        missing: String,
    },

    /// Persisting or loading a checkpoint failed.
    #[error("State store error: {0}")]
    Store(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScenarioError {
    /// Creates a missing-input error.
    #[must_use]
    pub fn missing_input(stage: impl Into<String>, missing: impl Into<String>) -> Self {
        Self::MissingInput {
            stage: stage.into(),
            missing: missing.into(),
        }
    }

    /// Creates a store error.
    #[must_use]
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Creates an approval error.
    #[must_use]
    pub fn approval(message: impl Into<String>) -> Self {
        Self::Approval(message.into())
    }

    /// Returns true if this is an extraction or shape failure.
    #[must_use]
    pub fn is_extraction(&self) -> bool {
        matches!(self, Self::Extraction(_))
    }

    /// Converts to a dictionary representation for reporting to callers.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let kind = match self {
            Self::Extraction(ExtractionError::ShapeMismatch { .. }) => "ShapeMismatch",
            Self::Extraction(_) => "ExtractionFailed",
            Self::Session(_) => "SessionFailed",
            Self::Approval(_) => "ApprovalFailed",
            Self::MissingInput { .. } => "MissingInput",
            Self::Store(_) => "StoreFailed",
            Self::Serialization(_) => "SerializationFailed",
            Self::Io(_) => "IoFailed",
        };

        let mut map = HashMap::new();
        map.insert("type".to_string(), serde_json::json!(kind));
        map.insert("message".to_string(), serde_json::json!(self.to_string()));
        map
    }
}

/// The kind of a JSON value, used in shape-mismatch messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonKind {
    /// `{...}`
    Object,
    /// `[...]`
    Array,
    /// A string.
    String,
    /// A number.
    Number,
    /// `true` / `false`.
    Boolean,
    /// `null`.
    Null,
}

impl JsonKind {
    /// Classifies a JSON value.
    #[must_use]
    pub fn of(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Object(_) => Self::Object,
            serde_json::Value::Array(_) => Self::Array,
            serde_json::Value::String(_) => Self::String,
            serde_json::Value::Number(_) => Self::Number,
            serde_json::Value::Bool(_) => Self::Boolean,
            serde_json::Value::Null => Self::Null,
        }
    }
}

impl fmt::Display for JsonKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Object => "object",
            Self::Array => "array",
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Null => "null",
        };
        f.write_str(name)
    }
}

/// Errors raised while turning a model response into structured data.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    /// The response normalized to an empty string.
    #[error("Empty or invalid response: {kind}")]
    EmptyResponse {
        /// Which response variant was empty.
        kind: String,
    },

    /// Every extraction strategy failed.
    #[error("Could not extract valid JSON from response.\nResponse preview (first 300 chars):\n{preview}...")]
    NoStructure {
        /// The first [`PREVIEW_CHARS`] characters of the normalized text.
        preview: String,
    },

    /// A value was recovered but it has the wrong shape.
    #[error("Expected JSON {expected}, got {actual}")]
    ShapeMismatch {
        /// The shape the caller asked for.
        expected: JsonKind,
        /// The shape that was found.
        actual: JsonKind,
    },

    /// A value was recovered but does not fit the requested type.
    #[error("Extracted JSON does not match {target}: {message}")]
    Deserialize {
        /// Name of the target type.
        target: String,
        /// The serde error message.
        message: String,
    },
}

impl ExtractionError {
    /// Creates a no-structure error with a bounded preview of `text`.
    #[must_use]
    pub fn no_structure(text: &str) -> Self {
        Self::NoStructure {
            preview: preview(text),
        }
    }

    /// Creates a shape-mismatch error.
    #[must_use]
    pub fn shape_mismatch(expected: JsonKind, actual: JsonKind) -> Self {
        Self::ShapeMismatch { expected, actual }
    }
}

/// Returns the first [`PREVIEW_CHARS`] characters of `text`.
#[must_use]
pub fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_structure_preview_is_bounded() {
        let text = "x".repeat(1000);
        let err = ExtractionError::no_structure(&text);

        match &err {
            ExtractionError::NoStructure { preview } => assert_eq!(preview.len(), PREVIEW_CHARS),
            other => panic!("unexpected error: {other:?}"),
        }
        assert!(err.to_string().contains("first 300 chars"));
    }

    #[test]
    fn test_preview_respects_char_boundaries() {
        let text = "é".repeat(400);
        assert_eq!(preview(&text).chars().count(), PREVIEW_CHARS);
    }

    #[test]
    fn test_shape_mismatch_message() {
        let err = ExtractionError::shape_mismatch(JsonKind::Object, JsonKind::Array);
        assert_eq!(err.to_string(), "Expected JSON object, got array");
    }

    #[test]
    fn test_session_error_is_transparent() {
        let err = ScenarioError::from(anyhow::anyhow!("provider unavailable"));
        assert_eq!(err.to_string(), "provider unavailable");
    }

    #[test]
    fn test_to_dict_distinguishes_shape_mismatch() {
        let shape: ScenarioError =
            ExtractionError::shape_mismatch(JsonKind::Array, JsonKind::Object).into();
        let empty: ScenarioError = ExtractionError::EmptyResponse {
            kind: "text".to_string(),
        }
        .into();

        assert_eq!(shape.to_dict().get("type").unwrap(), "ShapeMismatch");
        assert_eq!(empty.to_dict().get("type").unwrap(), "ExtractionFailed");
        assert!(shape.is_extraction());
    }

    #[test]
    fn test_json_kind_of() {
        assert_eq!(JsonKind::of(&serde_json::json!({})), JsonKind::Object);
        assert_eq!(JsonKind::of(&serde_json::json!([1])), JsonKind::Array);
        assert_eq!(JsonKind::of(&serde_json::json!(1.5)), JsonKind::Number);
        assert_eq!(JsonKind::of(&serde_json::Value::Null), JsonKind::Null);
    }
}
