//! Pulls a JSON object out of raw model text and validates it.
//!
//! Models often wrap the requested JSON in prose or markdown fences. The
//! candidate is the span from the first `{` to the last `}`; when no such
//! span exists the whole trimmed text is tried instead.

use tracing::warn;

use crate::decision::{DecisionKind, StructuredDecision};
use crate::error::{EXCERPT_CHARS, ExtractionError};

/// Characters of raw text written to the log on failure.
const LOG_EXCERPT_CHARS: usize = 500;

/// Extract and validate a decision of the expected kind from raw model text.
pub fn extract(raw: &str, expected: DecisionKind) -> Result<StructuredDecision, ExtractionError> {
    let candidate = json_candidate(raw);

    let value: serde_json::Value = serde_json::from_str(candidate).map_err(|e| {
        warn!(kind = %expected, error = %e, raw = %excerpt(raw, LOG_EXCERPT_CHARS), "Failed to parse model JSON");
        ExtractionError::MalformedJson {
            reason: e.to_string(),
            excerpt: excerpt(raw, EXCERPT_CHARS),
        }
    })?;

    StructuredDecision::validate(&value, expected).map_err(|reason| {
        warn!(kind = %expected, error = %reason, raw = %excerpt(raw, LOG_EXCERPT_CHARS), "Model JSON failed validation");
        ExtractionError::SchemaViolation {
            reason,
            excerpt: excerpt(raw, EXCERPT_CHARS),
        }
    })
}

/// The greedy `{...}` span of `raw`, or the trimmed text when there is none.
pub fn json_candidate(raw: &str) -> &str {
    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => raw.trim(),
    }
}

/// The first `max_chars` characters of `text`.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::{DoctorType, Handoff, Referral};

    #[test]
    fn handoff_after_leading_prose() {
        let raw = "Понимаю, передаю вас оператору.\n{\"intent\":\"handoff_to_operator\",\"reason\":\"R\"}";
        let d = extract(raw, DecisionKind::Handoff).unwrap();
        assert_eq!(d, StructuredDecision::Handoff(Handoff { reason: "R".into() }));
    }

    #[test]
    fn referral_in_markdown_fence() {
        let raw = "```json\n{\"intent\":\"make_referral\",\"fio\":\"X\",\"preliminary_assessment\":\"Y\",\"doctor_type\":\"терапевт\"}\n```";
        let d = extract(raw, DecisionKind::Referral).unwrap();
        assert_eq!(
            d,
            StructuredDecision::Referral(Referral::MakeReferral {
                fio: "X".into(),
                preliminary_assessment: "Y".into(),
                doctor_type: DoctorType::Therapist,
            })
        );
    }

    #[test]
    fn unknown_doctor_type_is_schema_violation() {
        let raw = r#"{"intent":"make_referral","fio":"X","preliminary_assessment":"Y","doctor_type":"шаман"}"#;
        let err = extract(raw, DecisionKind::Referral).unwrap_err();
        assert!(matches!(err, ExtractionError::SchemaViolation { .. }));
        assert!(err.excerpt().starts_with("{\"intent\""));
    }

    #[test]
    fn no_referral_with_bad_referral_fields_is_schema_violation() {
        let raw = r#"{"intent":"no_referral_needed","reason":"R","doctor_type":"астролог"}"#;
        let err = extract(raw, DecisionKind::Referral).unwrap_err();
        assert!(matches!(err, ExtractionError::SchemaViolation { .. }));

        let raw = r#"{"intent":"no_referral_needed","reason":"R","fio":42}"#;
        let err = extract(raw, DecisionKind::Referral).unwrap_err();
        assert!(matches!(err, ExtractionError::SchemaViolation { .. }));
    }

    #[test]
    fn prose_without_json_is_malformed() {
        let err = extract("Извините, не могу ответить.", DecisionKind::Handoff).unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedJson { .. }));
    }

    #[test]
    fn broken_json_is_malformed() {
        let err = extract("{\"intent\": \"handoff_to_operator\",}", DecisionKind::Handoff).unwrap_err();
        assert!(matches!(err, ExtractionError::MalformedJson { .. }));
    }

    #[test]
    fn greedy_span_covers_first_to_last_brace() {
        assert_eq!(json_candidate("a {x} b {y} c"), "{x} b {y}");
        assert_eq!(json_candidate("  no braces  "), "no braces");
        assert_eq!(json_candidate("} backwards {"), "} backwards {");
    }

    #[test]
    fn excerpt_is_bounded_by_characters() {
        let long = "ж".repeat(300);
        let cut = excerpt(&long, EXCERPT_CHARS);
        assert_eq!(cut.chars().count(), EXCERPT_CHARS);

        let err = extract(&long, DecisionKind::Handoff).unwrap_err();
        assert_eq!(err.excerpt().chars().count(), EXCERPT_CHARS);
        assert_eq!(excerpt("short", 10), "short");
    }
}
