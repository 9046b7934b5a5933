//! PlateParser - Best-effort scrape of model output
//!
//! ## Responsibilities
//!
//! - Locate the `{...}` span in free-form model text
//! - Loosely decode it into a plate result
//! - Fall back to the `UNKNOWN` sentinel at every stage

use serde::{Deserialize, Serialize};

/// Sentinel plate value for "no usable result"
pub const UNKNOWN_PLATE: &str = "UNKNOWN";

/// Structured plate result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlateResult {
    pub plate_number: String,
}

impl PlateResult {
    pub fn new(plate_number: impl Into<String>) -> Self {
        Self {
            plate_number: plate_number.into(),
        }
    }

    /// Sentinel result
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_PLATE)
    }

    pub fn is_unknown(&self) -> bool {
        self.plate_number == UNKNOWN_PLATE
    }
}

/// Find the span from the first `{` to the last `}` (greedy, spans newlines)
pub fn extract_brace_span(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Decode a brace span and read its `plate_number`
///
/// Strings are taken as-is and numbers rendered as decimal text. A missing
/// key, `null`, or any other JSON type yields `None`.
pub fn decode_loose(span: &str) -> Option<PlateResult> {
    let value: serde_json::Value = serde_json::from_str(span).ok()?;

    match value.get("plate_number")? {
        serde_json::Value::String(s) => Some(PlateResult::new(s.clone())),
        serde_json::Value::Number(n) => Some(PlateResult::new(n.to_string())),
        _ => None,
    }
}

/// Parse raw model output into a plate result, `UNKNOWN` on any failure
pub fn parse_plate_response(text: &str) -> PlateResult {
    let Some(span) = extract_brace_span(text) else {
        tracing::debug!("No JSON object found in model response");
        return PlateResult::unknown();
    };

    match decode_loose(span) {
        Some(result) => result,
        None => {
            tracing::debug!(span = %span, "Model response is not a usable plate object");
            PlateResult::unknown()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plate_surrounded_by_prose() {
        let result = parse_plate_response("blah {\"plate_number\": \"ABC123\"} blah");
        assert_eq!(result, PlateResult::new("ABC123"));
        assert!(!result.is_unknown());
    }

    #[test]
    fn test_no_braces_is_unknown() {
        assert!(parse_plate_response("I cannot read this plate").is_unknown());
        assert!(parse_plate_response("").is_unknown());
    }

    #[test]
    fn test_invalid_json_is_unknown() {
        assert!(parse_plate_response("{not json}").is_unknown());
    }

    #[test]
    fn test_missing_key_is_unknown() {
        assert!(parse_plate_response("{\"plate\": \"ABC123\"}").is_unknown());
        assert!(parse_plate_response("{\"plate_number\": null}").is_unknown());
    }

    #[test]
    fn test_markdown_fenced_multiline() {
        let text = "Here you go:\n```json\n{\n  \"plate_number\": \"XYZ987\"\n}\n```";
        assert_eq!(parse_plate_response(text).plate_number, "XYZ987");
    }

    #[test]
    fn test_numeric_plate() {
        assert_eq!(parse_plate_response("{\"plate_number\": 1234}").plate_number, "1234");
    }

    #[test]
    fn test_extract_brace_span_is_greedy() {
        let text = "a {\"x\": 1} b {\"y\": 2} c";
        assert_eq!(extract_brace_span(text), Some("{\"x\": 1} b {\"y\": 2}"));
    }

    #[test]
    fn test_extract_brace_span_reversed() {
        assert_eq!(extract_brace_span("} then {"), None);
        assert_eq!(extract_brace_span("only {"), None);
    }

    #[test]
    fn test_model_unknown_is_passed_through() {
        let result = parse_plate_response("{\"plate_number\": \"UNKNOWN\"}");
        assert!(result.is_unknown());
    }
}
