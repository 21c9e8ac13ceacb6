//! Response shapes returned by a session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single block of a model response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResponseFragment {
    /// Block type reported by the provider (e.g. "text", "thinking").
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// The text carried by this block, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ResponseFragment {
    /// Creates a text fragment.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: Some("text".to_string()),
            text: Some(text.into()),
        }
    }

    /// Creates a fragment with no text.
    #[must_use]
    pub fn empty(kind: impl Into<String>) -> Self {
        Self {
            kind: Some(kind.into()),
            text: None,
        }
    }
}

impl fmt::Display for ResponseFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text {
            Some(ref text) => f.write_str(text),
            None => match serde_json::to_string(self) {
                Ok(json) => f.write_str(&json),
                Err(_) => f.write_str("{}"),
            },
        }
    }
}

/// What a session hands back.
///
/// Providers disagree on the shape, so every variant is normalized into one
/// text string by [`crate::extraction::normalize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionResponse {
    /// Plain text.
    Text(String),
    /// A single block with a text field.
    Fragment(ResponseFragment),
    /// A sequence of blocks, concatenated in order.
    Fragments(Vec<ResponseFragment>),
    /// Anything else.
    Other(serde_json::Value),
}

impl SessionResponse {
    /// Short name of the variant, used in error messages.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Fragment(_) => "fragment",
            Self::Fragments(_) => "fragments",
            Self::Other(_) => "other",
        }
    }
}

impl From<String> for SessionResponse {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for SessionResponse {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<ResponseFragment> for SessionResponse {
    fn from(fragment: ResponseFragment) -> Self {
        Self::Fragment(fragment)
    }
}

impl From<Vec<ResponseFragment>> for SessionResponse {
    fn from(fragments: Vec<ResponseFragment>) -> Self {
        Self::Fragments(fragments)
    }
}

impl From<serde_json::Value> for SessionResponse {
    fn from(value: serde_json::Value) -> Self {
        Self::Other(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fragment_display_prefers_text() {
        assert_eq!(ResponseFragment::text("hello").to_string(), "hello");
        assert_eq!(
            ResponseFragment::empty("thinking").to_string(),
            r#"{"type":"thinking"}"#
        );
    }

    #[test]
    fn test_response_kinds() {
        assert_eq!(SessionResponse::from("x").kind(), "text");
        assert_eq!(SessionResponse::from(ResponseFragment::text("x")).kind(), "fragment");
        assert_eq!(SessionResponse::from(vec![ResponseFragment::text("x")]).kind(), "fragments");
        assert_eq!(SessionResponse::from(serde_json::json!(42)).kind(), "other");
    }
}
