//! Prompts and schemas for W-2 extraction vision API calls.

/// System instruction shared by all providers.
pub const SYSTEM_PROMPT: &str = "You are a tax document extraction assistant. Always respond with valid JSON only, no markdown formatting or code blocks.";

/// JSON schema for the structured extraction reply.
/// Field names match `W2Extraction`'s wire format.
pub fn w2_extraction_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "box2Federal": {
                "type": "number",
                "description": "Box 2: Federal income tax withheld, in US dollars"
            },
            "box17State": {
                "type": "number",
                "description": "Box 17: State income tax withheld, in US dollars (0 if blank)"
            },
            "confidence": {
                "type": "string",
                "enum": ["high", "medium", "low"]
            }
        },
        "required": ["box2Federal", "box17State", "confidence"],
        "additionalProperties": false
    })
}

/// Build the W-2 extraction prompt.
pub fn build_w2_prompt() -> String {
    r#"Extract withholding amounts from this IRS Form W-2.

Return a JSON object with exactly these fields:
- box2Federal: the amount in Box 2 "Federal income tax withheld"
- box17State: the amount in Box 17 "State income tax". If there are several
  state lines, add them together. If Box 17 is blank, use 0.
- confidence: "high" if both boxes are clearly legible, "medium" if one value
  required interpretation, "low" if the image is blurry, cropped, or not a W-2.

Rules:
- Amounts are plain numbers in US dollars without "$" or thousands separators,
  e.g. 4213.07
- Do not confuse Box 1 (wages) or Box 16 (state wages) with withholding.
- Never return negative numbers."#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_structure() {
        let schema = w2_extraction_schema();
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["box2Federal"]["type"], "number");
        assert_eq!(schema["properties"]["box17State"]["type"], "number");
    }

    #[test]
    fn test_schema_confidence_levels() {
        let schema = w2_extraction_schema();
        let levels: Vec<&str> = schema["properties"]["confidence"]["enum"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert_eq!(levels, vec!["high", "medium", "low"]);
    }

    #[test]
    fn test_schema_requires_both_boxes() {
        let schema = w2_extraction_schema();
        let required = schema["required"].as_array().unwrap();
        assert!(required.contains(&serde_json::json!("box2Federal")));
        assert!(required.contains(&serde_json::json!("box17State")));
    }

    #[test]
    fn test_prompt_names_both_boxes() {
        let prompt = build_w2_prompt();
        assert!(prompt.contains("box2Federal"));
        assert!(prompt.contains("box17State"));
        assert!(prompt.contains("Box 2"));
        assert!(prompt.contains("Box 17"));
    }
}
