//! Refund estimate formulas and the estimate record returned to the widget.

use serde::{Deserialize, Serialize};

/// Share of federal withholding (Box 2) assumed to be owed.
pub const FEDERAL_RATE: f64 = 0.12;
/// Share of state withholding (Box 17) assumed to be owed.
pub const STATE_RATE: f64 = 0.04;

/// Rates used when the model reply had to be recovered from free text.
pub const FALLBACK_FEDERAL_RATE: f64 = 0.10;
pub const FALLBACK_STATE_RATE: f64 = 0.05;

/// How the two withheld amounts were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfidenceTag {
    High,
    Medium,
    Low,
    AiExtracted,
    Manual,
}

/// Estimate returned by both calculation routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundEstimate {
    pub box2_federal: f64,
    pub box17_state: f64,
    pub estimated_refund: f64,
    pub ocr_confidence: ConfidenceTag,
}

impl RefundEstimate {
    /// Build an estimate with the primary formula.
    pub fn primary(federal: f64, state: f64, tag: ConfidenceTag) -> Self {
        Self {
            box2_federal: federal,
            box17_state: state,
            estimated_refund: calculate_refund(federal, state),
            ocr_confidence: tag,
        }
    }

    /// Build an estimate with the fallback formula.
    pub fn fallback(federal: f64, state: f64) -> Self {
        Self {
            box2_federal: federal,
            box17_state: state,
            estimated_refund: fallback_refund(federal, state),
            ocr_confidence: ConfidenceTag::Low,
        }
    }
}

/// `max(0, (f + s) - 0.12f - 0.04s)`, rounded to cents.
pub fn calculate_refund(federal: f64, state: f64) -> f64 {
    apply_rates(federal, state, FEDERAL_RATE, STATE_RATE)
}

/// `max(0, (f + s) - 0.10f - 0.05s)`, rounded to cents.
pub fn fallback_refund(federal: f64, state: f64) -> f64 {
    apply_rates(federal, state, FALLBACK_FEDERAL_RATE, FALLBACK_STATE_RATE)
}

fn apply_rates(federal: f64, state: f64, federal_rate: f64, state_rate: f64) -> f64 {
    let total = federal + state;
    let refund = total - federal * federal_rate - state * state_rate;
    round_cents(refund.max(0.0))
}

/// Round to two decimal places.
pub fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Check that a withheld amount is usable by the formulas.
pub fn is_valid_amount(value: f64) -> bool {
    value.is_finite() && value >= 0.0
}

/// Read a dollar amount from a JSON value.
///
/// Accepts numbers and numeric strings such as `"1,234.56"` or `"$980"`.
/// Returns `None` for null, booleans, objects, or unparseable text.
pub fn amount_from_json(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => parse_amount_text(s),
        _ => None,
    }
}

/// Parse a dollar amount written as text.
pub fn parse_amount_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_refund_example() {
        assert_eq!(calculate_refund(1000.0, 500.0), 1360.0);
    }

    #[test]
    fn test_calculate_refund_zero() {
        assert_eq!(calculate_refund(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_calculate_refund_rounds_to_cents() {
        // 0.88 * 123.45 + 0.96 * 67.89 = 108.636 + 65.1744 = 173.8104
        assert_eq!(calculate_refund(123.45, 67.89), 173.81);
    }

    #[test]
    fn test_calculate_refund_matches_formula_over_grid() {
        let samples: [f64; 7] = [0.0, 0.01, 1.0, 99.99, 1234.56, 50_000.0, 1e7];
        for &f in &samples {
            for &s in &samples {
                let expected = round_cents(((f + s) - 0.12 * f - 0.04 * s).max(0.0));
                let actual = calculate_refund(f, s);
                assert_eq!(actual, expected, "f={} s={}", f, s);
                assert!(actual >= 0.0);
            }
        }
    }

    #[test]
    fn test_fallback_refund_differs_from_primary() {
        // 1500 - 100 - 25
        assert_eq!(fallback_refund(1000.0, 500.0), 1375.0);
        assert_ne!(fallback_refund(1000.0, 500.0), calculate_refund(1000.0, 500.0));
    }

    #[test]
    fn test_is_valid_amount() {
        assert!(is_valid_amount(0.0));
        assert!(is_valid_amount(42.5));
        assert!(!is_valid_amount(-0.01));
        assert!(!is_valid_amount(f64::NAN));
        assert!(!is_valid_amount(f64::INFINITY));
    }

    #[test]
    fn test_amount_from_json() {
        use serde_json::json;

        assert_eq!(amount_from_json(&json!(1234.5)), Some(1234.5));
        assert_eq!(amount_from_json(&json!(0)), Some(0.0));
        assert_eq!(amount_from_json(&json!("1,234.56")), Some(1234.56));
        assert_eq!(amount_from_json(&json!("$980")), Some(980.0));
        assert_eq!(amount_from_json(&json!("-5")), Some(-5.0));
        assert_eq!(amount_from_json(&json!("")), None);
        assert_eq!(amount_from_json(&json!("n/a")), None);
        assert_eq!(amount_from_json(&json!(null)), None);
        assert_eq!(amount_from_json(&json!(true)), None);
    }

    #[test]
    fn test_estimate_serializes_wire_names() {
        let estimate = RefundEstimate::primary(1000.0, 500.0, ConfidenceTag::Manual);
        let json = serde_json::to_value(&estimate).unwrap();
        assert_eq!(json["box2Federal"], 1000.0);
        assert_eq!(json["box17State"], 500.0);
        assert_eq!(json["estimatedRefund"], 1360.0);
        assert_eq!(json["ocrConfidence"], "manual");
    }

    #[test]
    fn test_confidence_tag_kebab_case() {
        let json = serde_json::to_string(&ConfidenceTag::AiExtracted).unwrap();
        assert_eq!(json, "\"ai-extracted\"");
        let tag: ConfidenceTag = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(tag, ConfidenceTag::Low);
    }

    #[test]
    fn test_fallback_estimate_is_tagged_low() {
        let estimate = RefundEstimate::fallback(200.0, 100.0);
        assert_eq!(estimate.ocr_confidence, ConfidenceTag::Low);
        assert_eq!(estimate.estimated_refund, 275.0);
    }
}
