//! Normalization of session responses into one text string.

use crate::errors::ExtractionError;
use crate::session::SessionResponse;

/// Flattens any [`SessionResponse`] into a single string.
///
/// Fragments are concatenated in order; fragments without text contribute
/// their JSON form. Objects in the `Other` variant yield their `text` field
/// when it is a string, otherwise their JSON form.
///
/// # Errors
///
/// Returns [`ExtractionError::EmptyResponse`] if the result is empty.
pub fn normalize(response: &SessionResponse) -> Result<String, ExtractionError> {
    let text = match response {
        SessionResponse::Text(text) => text.clone(),
        SessionResponse::Fragment(fragment) => fragment.to_string(),
        SessionResponse::Fragments(fragments) => {
            fragments.iter().map(ToString::to_string).collect::<String>()
        }
        SessionResponse::Other(value) => match value {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(text) => text.clone(),
            serde_json::Value::Object(map) => match map.get("text") {
                Some(serde_json::Value::String(text)) => text.clone(),
                _ => value.to_string(),
            },
            other => other.to_string(),
        },
    };

    if text.is_empty() {
        return Err(ExtractionError::EmptyResponse {
            kind: response.kind().to_string(),
        });
    }

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ResponseFragment;

    #[test]
    fn test_plain_text() {
        let text = normalize(&SessionResponse::from("hello")).unwrap();
        assert_eq!(text, "hello");
    }

    #[test]
    fn test_single_fragment() {
        let text = normalize(&ResponseFragment::text("{\"a\": 1}").into()).unwrap();
        assert_eq!(text, "{\"a\": 1}");
    }

    #[test]
    fn test_fragments_concatenate_in_order() {
        let response = SessionResponse::from(vec![
            ResponseFragment::text("{\"a\": "),
            ResponseFragment::text("1}"),
        ]);
        assert_eq!(normalize(&response).unwrap(), "{\"a\": 1}");
    }

    #[test]
    fn test_fragment_without_text_is_stringified() {
        let response = SessionResponse::from(vec![
            ResponseFragment::empty("thinking"),
            ResponseFragment::text("ok"),
        ]);
        assert_eq!(normalize(&response).unwrap(), r#"{"type":"thinking"}ok"#);
    }

    #[test]
    fn test_other_object_uses_text_field() {
        let response = SessionResponse::Other(serde_json::json!({"text": "[1, 2]", "id": 7}));
        assert_eq!(normalize(&response).unwrap(), "[1, 2]");
    }

    #[test]
    fn test_other_value_is_stringified() {
        let response = SessionResponse::Other(serde_json::json!({"id": 7}));
        assert_eq!(normalize(&response).unwrap(), r#"{"id":7}"#);
    }

    #[test]
    fn test_empty_inputs_fail() {
        for response in [
            SessionResponse::from(""),
            SessionResponse::from(Vec::<ResponseFragment>::new()),
            SessionResponse::Other(serde_json::Value::Null),
        ] {
            let err = normalize(&response).unwrap_err();
            assert!(matches!(err, ExtractionError::EmptyResponse { .. }));
        }
    }
}
