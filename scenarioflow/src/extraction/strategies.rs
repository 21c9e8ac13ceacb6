//! The individual recovery strategies, tried in priority order.
//!
//! Each strategy returns the first object or array it can parse. Scalars
//! never count as a recovered structure.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// Which strategy produced a value. Reported in debug logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// The whole text parsed.
    Direct,
    /// A ```json fenced block parsed.
    JsonFence,
    /// A generic ``` fenced block parsed.
    AnyFence,
    /// A balanced `{...}` / `[...]` region parsed.
    Balanced,
    /// A regex-matched bracketed substring parsed.
    Pattern,
    /// The text parsed after stripping a preamble.
    Preamble,
}

impl Strategy {
    /// Returns the strategy name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::JsonFence => "json_fence",
            Self::AnyFence => "any_fence",
            Self::Balanced => "balanced",
            Self::Pattern => "pattern",
            Self::Preamble => "preamble",
        }
    }
}

struct Patterns {
    json_fence: Regex,
    any_fence: Regex,
    structures: [Regex; 4],
    preambles: [Regex; 3],
}

#[allow(clippy::expect_used)]
fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        json_fence: Regex::new(r"(?is)```json\s*\n?(.*?)```").expect("valid json fence regex"),
        any_fence: Regex::new(r"(?is)```\s*\n?(.*?)```").expect("valid fence regex"),
        structures: [
            // nested objects
            Regex::new(r"\{[^{}]*\{[^{}]*\}[^{}]*\}").expect("valid nested object regex"),
            // nested arrays
            Regex::new(r"\[[^\[\]]*\[[^\[\]]*\][^\[\]]*\]").expect("valid nested array regex"),
            // simple objects
            Regex::new(r"\{[^{}]+\}").expect("valid object regex"),
            // simple arrays
            Regex::new(r"\[[^\[\]]+\]").expect("valid array regex"),
        ],
        preambles: [
            Regex::new(r"(?is)^.*?(?:here's|here is|below is|following is).*?:\s*")
                .expect("valid preamble regex"),
            Regex::new(r"(?is)^.*?(?:i'll|i will|let me).*?:\s*").expect("valid preamble regex"),
            Regex::new(r"^[^{\[]*").expect("valid preamble regex"),
        ],
    })
}

/// Parses `text` and keeps the result only if it is an object or array.
pub fn parse_structure(text: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(text) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Some(value),
        _ => None,
    }
}

/// Step 1: the whole text.
pub fn direct(text: &str) -> Option<Value> {
    parse_structure(text)
}

/// Step 2: every ```json block, in order of appearance.
pub fn json_fence(text: &str) -> Option<Value> {
    first_capture(&patterns().json_fence, text)
}

/// Step 3: every generic ``` block, in order of appearance.
pub fn any_fence(text: &str) -> Option<Value> {
    first_capture(&patterns().any_fence, text)
}

/// Step 4a: balanced `{...}` / `[...]` regions, ranked like the patterns.
///
/// Each outermost region that parses is a candidate. Candidates are tried
/// in the pattern order (nested objects, nested arrays, simple objects,
/// simple arrays) and by position within a tier, so an aside like `[1]`
/// never beats an object later in the text. Unlike the patterns, a region
/// keeps all of its nesting levels.
pub fn balanced(text: &str) -> Option<Value> {
    let objects = balanced_candidates(text, '{', '}');
    let arrays = balanced_candidates(text, '[', ']');

    let tiers = [(&objects, true), (&arrays, true), (&objects, false), (&arrays, false)];
    let found = tiers.into_iter().find_map(|(candidates, nested)| {
        candidates
            .iter()
            .find(|value| is_nested(value) == nested)
            .cloned()
    });
    found
}

fn balanced_candidates(text: &str, open: char, close: char) -> Vec<Value> {
    let mut found = Vec::new();
    let mut resume_at = 0;

    for (pos, _) in text.match_indices(open) {
        if pos < resume_at {
            continue;
        }
        let Some(region) = balanced_region(&text[pos..], open, close) else {
            continue;
        };
        if let Some(value) = parse_structure(region) {
            resume_at = pos + region.len();
            found.push(value);
        }
    }

    found
}

/// True if an object holds another object, or an array another array, at
/// any depth.
fn is_nested(value: &Value) -> bool {
    fn contains_object(value: &Value) -> bool {
        match value {
            Value::Object(map) => map.values().any(|v| v.is_object() || contains_object(v)),
            Value::Array(items) => items.iter().any(|v| v.is_object() || contains_object(v)),
            _ => false,
        }
    }
    fn contains_array(value: &Value) -> bool {
        match value {
            Value::Object(map) => map.values().any(|v| v.is_array() || contains_array(v)),
            Value::Array(items) => items.iter().any(|v| v.is_array() || contains_array(v)),
            _ => false,
        }
    }

    match value {
        Value::Object(_) => contains_object(value),
        Value::Array(_) => contains_array(value),
        _ => false,
    }
}

/// Step 4b: regex-matched bracketed substrings, most specific pattern first.
pub fn bracketed(text: &str) -> Option<Value> {
    patterns().structures.iter().find_map(|pattern| {
        pattern
            .find_iter(text)
            .find_map(|m| parse_structure(m.as_str()))
    })
}

/// Step 5: strip an explanatory preamble and parse what remains.
pub fn strip_preamble(text: &str) -> Option<Value> {
    patterns().preambles.iter().find_map(|pattern| {
        let cleaned = pattern.replace(text, "");
        if cleaned == text {
            None
        } else {
            parse_structure(&cleaned)
        }
    })
}

/// Runs every strategy in priority order.
pub fn run_all(text: &str) -> Option<(Strategy, Value)> {
    let steps: [(Strategy, fn(&str) -> Option<Value>); 6] = [
        (Strategy::Direct, direct),
        (Strategy::JsonFence, json_fence),
        (Strategy::AnyFence, any_fence),
        (Strategy::Balanced, balanced),
        (Strategy::Pattern, bracketed),
        (Strategy::Preamble, strip_preamble),
    ];

    steps
        .into_iter()
        .find_map(|(strategy, step)| step(text).map(|value| (strategy, value)))
}

fn first_capture(pattern: &Regex, text: &str) -> Option<Value> {
    pattern
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| parse_structure(m.as_str()))
}

/// Returns the prefix of `text` (which starts with `open`) up to the
/// matching `close`, skipping delimiters inside JSON strings.
fn balanced_region(text: &str, open: char, close: char) -> Option<&str> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, ch) in text.char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match ch {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            c if c == open && !in_string => depth += 1,
            c if c == close && !in_string => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(&text[..i + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }

    None
}
