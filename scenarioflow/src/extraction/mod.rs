//! Defensive extraction of structured data from model responses.
//!
//! Models asked for JSON still wrap it in markdown fences, prefix it with
//! "Here is the result:" or surround it with commentary. [`extract_json`]
//! recovers the structure by trying, in order:
//!
//! 1. the whole text,
//! 2. each ```json fenced block,
//! 3. each generic ``` fenced block,
//! 4. bracketed substrings, nested objects first, then nested arrays,
//!    simple objects and simple arrays,
//! 5. the text with its explanatory preamble stripped.
//!
//! If nothing parses the call fails with a bounded preview of the text; it
//! never substitutes a default.

mod normalize;
mod strategies;


pub use normalize::normalize;
pub use strategies::Strategy;

use crate::errors::{ExtractionError, JsonKind};
use crate::session::SessionResponse;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

/// A recovered structure: always an object or an array.
#[derive(Debug, Clone, PartialEq)]
pub enum Extracted {
    /// A JSON object.
    Object(Map<String, Value>),
    /// A JSON array.
    Array(Vec<Value>),
}

impl Extracted {
    /// Returns the shape of the value.
    #[must_use]
    pub fn kind(&self) -> JsonKind {
        match self {
            Self::Object(_) => JsonKind::Object,
            Self::Array(_) => JsonKind::Array,
        }
    }

    /// Converts back into a plain JSON value.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Object(map) => Value::Object(map),
            Self::Array(items) => Value::Array(items),
        }
    }
}

impl From<Extracted> for Value {
    fn from(extracted: Extracted) -> Self {
        extracted.into_value()
    }
}

/// Recovers an object or array from a response.
///
/// # Errors
///
/// [`ExtractionError::EmptyResponse`] if the response has no text,
/// [`ExtractionError::NoStructure`] if no strategy succeeds.
pub fn extract_json(response: &SessionResponse) -> Result<Extracted, ExtractionError> {
    let text = normalize(response)?;
    extract_json_str(&text)
}

/// Same as [`extract_json`] for text that is already normalized.
///
/// # Errors
///
/// See [`extract_json`].
pub fn extract_json_str(text: &str) -> Result<Extracted, ExtractionError> {
    if text.is_empty() {
        return Err(ExtractionError::EmptyResponse {
            kind: "text".to_string(),
        });
    }

    match strategies::run_all(text) {
        Some((strategy, value)) => {
            tracing::debug!(
                strategy = strategy.as_str(),
                text_len = text.len(),
                "Extracted JSON from response"
            );
            match value {
                Value::Object(map) => Ok(Extracted::Object(map)),
                Value::Array(items) => Ok(Extracted::Array(items)),
                other => Err(ExtractionError::shape_mismatch(
                    JsonKind::Object,
                    JsonKind::of(&other),
                )),
            }
        }
        None => {
            tracing::error!(
                text_len = text.len(),
                "No JSON structure found in response"
            );
            Err(ExtractionError::no_structure(text))
        }
    }
}

/// Recovers a JSON object.
///
/// # Errors
///
/// Everything [`extract_json`] returns, plus
/// [`ExtractionError::ShapeMismatch`] when the structure is an array.
pub fn extract_object(response: &SessionResponse) -> Result<Map<String, Value>, ExtractionError> {
    match extract_json(response)? {
        Extracted::Object(map) => Ok(map),
        other => Err(ExtractionError::shape_mismatch(JsonKind::Object, other.kind())),
    }
}

/// Recovers a JSON array.
///
/// # Errors
///
/// Everything [`extract_json`] returns, plus
/// [`ExtractionError::ShapeMismatch`] when the structure is an object.
pub fn extract_array(response: &SessionResponse) -> Result<Vec<Value>, ExtractionError> {
    match extract_json(response)? {
        Extracted::Array(items) => Ok(items),
        other => Err(ExtractionError::shape_mismatch(JsonKind::Array, other.kind())),
    }
}

/// Recovers a structure and deserializes it into `T`.
///
/// # Errors
///
/// Everything [`extract_json`] returns, plus
/// [`ExtractionError::Deserialize`] if the value does not fit `T`.
pub fn extract_as<T: DeserializeOwned>(response: &SessionResponse) -> Result<T, ExtractionError> {
    let value = extract_json(response)?.into_value();
    serde_json::from_value(value).map_err(|e| ExtractionError::Deserialize {
        target: std::any::type_name::<T>().to_string(),
        message: e.to_string(),
    })
}

/// Returns the response as trimmed prose, for stages that produce text.
///
/// # Errors
///
/// [`ExtractionError::EmptyResponse`] if nothing but whitespace remains.
pub fn extract_text(response: &SessionResponse) -> Result<String, ExtractionError> {
    let text = normalize(response)?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(ExtractionError::EmptyResponse {
            kind: response.kind().to_string(),
        });
    }
    Ok(trimmed.to_string())
}
