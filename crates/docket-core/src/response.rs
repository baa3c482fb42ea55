//! Strict validation of completion payloads
//!
//! The model is asked for a JSON object; anything that does not parse is a
//! malformed response and nothing is salvaged from it. Parsed objects are
//! coerced field by field and rejected as incomplete when a required field is
//! missing.

use serde_json::{Map, Value};

use crate::error::CompletionError;
use crate::model::Verdict;

/// Validated ruling payload
#[derive(Debug, Clone, PartialEq)]
pub struct RulingPayload {
    pub verdict: Verdict,
    pub rationale: String,
    pub citations: Vec<String>,
    pub risk_flags: Vec<String>,
    /// The parsed object exactly as the model returned it
    pub raw: Value,
}

/// Validated bias payload
#[derive(Debug, Clone, PartialEq)]
pub struct BiasPayload {
    pub bias_score: f64,
    pub notes: Vec<String>,
}

/// Parse and validate a ruling completion
pub fn parse_ruling_response(text: &str) -> Result<RulingPayload, CompletionError> {
    let raw = parse_json(text, "ruling")?;
    let object = as_object(&raw, "ruling")?;

    let verdict_label = coerce_required_string(object.get("verdict"));
    let rationale = coerce_required_string(object.get("rationale"));
    if verdict_label.is_empty() || rationale.is_empty() {
        return Err(CompletionError::Incomplete(
            "ruling response is missing verdict or rationale".to_string(),
        ));
    }

    let verdict = Verdict::from_label(&verdict_label).unwrap_or_else(|| {
        tracing::warn!(
            verdict = %verdict_label,
            "Model returned a verdict outside the label set; recording as 'other'"
        );
        Verdict::Other
    });

    Ok(RulingPayload {
        verdict,
        rationale,
        citations: coerce_string_list(object.get("citations")),
        risk_flags: coerce_string_list(object.get("risk_flags")),
        raw: raw.clone(),
    })
}

/// Parse and validate a bias completion. The score is not range-checked.
pub fn parse_bias_response(text: &str) -> Result<BiasPayload, CompletionError> {
    let raw = parse_json(text, "bias check")?;
    let object = as_object(&raw, "bias check")?;

    let bias_score = object
        .get("bias_score")
        .and_then(coerce_number)
        .ok_or_else(|| {
            CompletionError::Incomplete(
                "bias check response is missing a numeric bias_score".to_string(),
            )
        })?;

    Ok(BiasPayload {
        bias_score,
        notes: coerce_string_list(object.get("notes")),
    })
}

/// First two sentences of a rationale, for lay readers.
///
/// Sentences are split on periods; a rationale without any period-delimited
/// sentence (including one with no period at all) is returned unchanged.
pub fn plain_explanation(rationale: &str) -> String {
    if !rationale.contains('.') {
        return rationale.to_string();
    }

    let flattened = rationale.replace(|c: char| c == '\r' || c == '\n', " ");
    let sentences: Vec<&str> = flattened
        .split('.')
        .map(str::trim)
        .filter(|sentence| !sentence.is_empty())
        .collect();

    if sentences.is_empty() {
        return rationale.to_string();
    }

    let mut summary = sentences
        .iter()
        .take(2)
        .copied()
        .collect::<Vec<_>>()
        .join(". ");
    if !summary.ends_with('.') {
        summary.push('.');
    }
    summary
}

fn parse_json(text: &str, what: &str) -> Result<Value, CompletionError> {
    serde_json::from_str(text).map_err(|e| {
        tracing::warn!(error = %e, response_len = text.len(), "Unparseable {} response", what);
        CompletionError::Malformed(format!("failed to parse {} from language model", what))
    })
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>, CompletionError> {
    value.as_object().ok_or_else(|| {
        CompletionError::Incomplete(format!("{} response is not a JSON object", what))
    })
}

// Missing and null both read as empty.
fn coerce_required_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(value) => coerce_string(value),
    }
}

fn coerce_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn coerce_string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().map(coerce_string).collect(),
        _ => Vec::new(),
    }
}

fn coerce_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ruling_happy_path() {
        let text = r#"{
            "verdict": "reduced",
            "rationale": "The driver cooperated. Guidelines allow reduction. No aggravating facts.",
            "citations": ["Demo Statute 1.2"],
            "risk_flags": ["Standardize fine reductions"]
        }"#;
        let payload = parse_ruling_response(text).unwrap();
        assert_eq!(payload.verdict, Verdict::Reduced);
        assert_eq!(payload.citations, vec!["Demo Statute 1.2"]);
        assert_eq!(payload.risk_flags, vec!["Standardize fine reductions"]);
        assert_eq!(payload.raw["verdict"], "reduced");
    }

    #[test]
    fn test_parse_ruling_not_json() {
        let err = parse_ruling_response("{not json").unwrap_err();
        assert!(matches!(err, CompletionError::Malformed(_)));
    }

    #[test]
    fn test_parse_ruling_empty_object() {
        let err = parse_ruling_response("{}").unwrap_err();
        assert!(matches!(err, CompletionError::Incomplete(_)));
    }

    #[test]
    fn test_parse_ruling_non_object() {
        let err = parse_ruling_response("[1, 2]").unwrap_err();
        assert!(matches!(err, CompletionError::Incomplete(_)));
    }

    #[test]
    fn test_parse_ruling_blank_fields_are_incomplete() {
        let err = parse_ruling_response(r#"{"verdict": "", "rationale": "x."}"#).unwrap_err();
        assert!(matches!(err, CompletionError::Incomplete(_)));

        let err = parse_ruling_response(r#"{"verdict": "guilty", "rationale": null}"#).unwrap_err();
        assert!(matches!(err, CompletionError::Incomplete(_)));
    }

    #[test]
    fn test_parse_ruling_defaults_and_coercion() {
        let text = r#"{"verdict": "Upheld", "rationale": 42, "citations": "not a list", "risk_flags": [1, true, "x"]}"#;
        let payload = parse_ruling_response(text).unwrap();
        assert_eq!(payload.verdict, Verdict::Upheld);
        assert_eq!(payload.rationale, "42");
        assert!(payload.citations.is_empty());
        assert_eq!(payload.risk_flags, vec!["1", "true", "x"]);
    }

    #[test]
    fn test_parse_ruling_unknown_verdict_maps_to_other() {
        let payload =
            parse_ruling_response(r#"{"verdict": "acquitted", "rationale": "Fine."}"#).unwrap();
        assert_eq!(payload.verdict, Verdict::Other);
        assert_eq!(payload.raw["verdict"], "acquitted");
    }

    #[test]
    fn test_parse_bias() {
        let payload =
            parse_bias_response(r#"{"bias_score": 0.15, "notes": ["Language remains neutral"]}"#)
                .unwrap();
        assert!((payload.bias_score - 0.15).abs() < f64::EPSILON);
        assert_eq!(payload.notes, vec!["Language remains neutral"]);
    }

    #[test]
    fn test_parse_bias_coerced_scores_and_missing_notes() {
        let payload = parse_bias_response(r#"{"bias_score": "0.3"}"#).unwrap();
        assert!((payload.bias_score - 0.3).abs() < f64::EPSILON);

        let payload = parse_bias_response(r#"{"bias_score": true}"#).unwrap();
        assert_eq!(payload.bias_score, 1.0);
        let payload = parse_bias_response(r#"{"bias_score": false}"#).unwrap();
        assert_eq!(payload.bias_score, 0.0);
        assert!(payload.notes.is_empty());
    }

    #[test]
    fn test_parse_bias_out_of_range_passes_through() {
        let payload = parse_bias_response(r#"{"bias_score": 1.7, "notes": []}"#).unwrap();
        assert!((payload.bias_score - 1.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_parse_bias_failures() {
        assert!(matches!(
            parse_bias_response("nope").unwrap_err(),
            CompletionError::Malformed(_)
        ));
        assert!(matches!(
            parse_bias_response(r#"{"notes": []}"#).unwrap_err(),
            CompletionError::Incomplete(_)
        ));
        assert!(matches!(
            parse_bias_response(r#"{"bias_score": "high"}"#).unwrap_err(),
            CompletionError::Incomplete(_)
        ));
        assert!(matches!(
            parse_bias_response(r#"{"bias_score": null}"#).unwrap_err(),
            CompletionError::Incomplete(_)
        ));
    }

    #[test]
    fn test_plain_explanation_takes_two_sentences() {
        assert_eq!(plain_explanation("A. B. C."), "A. B.");
        assert_eq!(plain_explanation("Only one. "), "Only one.");
        assert_eq!(plain_explanation("First line.\nSecond line. Third."), "First line. Second line.");
    }

    #[test]
    fn test_plain_explanation_without_periods() {
        assert_eq!(plain_explanation("no periods here"), "no periods here");
        assert_eq!(plain_explanation(""), "");
        assert_eq!(plain_explanation("..."), "...");
    }
}
