//! Vision API calls and reply parsing for W-2 extraction.
//!
//! Supports OpenAI chat completions and the Anthropic messages API.
//! Replies are parsed strictly first; a malformed reply falls back to
//! recovering the two amounts from its text.

use std::time::Duration;

use tracing::{error, info, warn};

use super::prompts::{build_w2_prompt, w2_extraction_schema, SYSTEM_PROMPT};
use super::types::{ExtractionOutcome, ExtractionSettings, PreparedUpload, W2Extraction};
use crate::config::VisionProvider;
use crate::error::AppError;
use crate::refund::{amount_from_json, is_valid_amount, parse_amount_text, ConfidenceTag};

/// Timeout for a single vision API call.
pub const API_TIMEOUT: Duration = Duration::from_secs(60);

/// Build a reqwest client with a 60-second timeout for vision API calls.
pub fn build_api_client() -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder().timeout(API_TIMEOUT).build()
}

/// Extract Box 2 and Box 17 from an uploaded W-2.
///
/// # Errors
/// - `Upstream` for network failures, non-2xx replies, or unusable replies
/// - `Validation` when the model reads negative or non-finite amounts
pub async fn extract_w2(
    client: &reqwest::Client,
    upload: &PreparedUpload,
    settings: &ExtractionSettings,
) -> Result<ExtractionOutcome, AppError> {
    info!(
        "Extracting W-2 values from '{}' ({}) using provider '{}' model '{}'",
        upload.file_name, upload.media_type, settings.provider, settings.model
    );

    let response_text = match settings.provider {
        VisionProvider::OpenAi => call_openai(client, settings, upload).await?,
        VisionProvider::Claude => call_claude(client, settings, upload).await?,
    };

    let outcome = parse_reply(&response_text)?;
    validate_extraction(outcome.extraction())?;

    let extraction = outcome.extraction();
    info!(
        "Extracted W-2 values: box2={}, box17={}, confidence={:?}",
        extraction.box2_federal, extraction.box17_state, extraction.confidence
    );

    Ok(outcome)
}

/// Parse a model reply into an extraction.
///
/// A JSON object reply is read strictly. Anything else is scanned for the
/// two field names and their numbers, and reported as `Recovered`.
pub fn parse_reply(text: &str) -> Result<ExtractionOutcome, AppError> {
    let cleaned = strip_markdown_json(text);

    match serde_json::from_str::<serde_json::Value>(&cleaned) {
        Ok(json) if json.is_object() => map_reply_json(&json).map(ExtractionOutcome::Parsed),
        Ok(_) | Err(_) => {
            let recovered = recover_from_text(&cleaned).ok_or_else(|| {
                let truncated = truncate(&cleaned, 500);
                let msg = format!(
                    "Vision model reply was not usable JSON. Raw response (first 500 chars): {}",
                    truncated
                );
                error!("{}", msg);
                AppError::Upstream(msg)
            })?;
            warn!(
                "Recovered W-2 values from malformed model reply: box2={}, box17={}",
                recovered.box2_federal, recovered.box17_state
            );
            Ok(ExtractionOutcome::Recovered(recovered))
        }
    }
}

/// Map the reply JSON to a `W2Extraction`, accepting numeric strings.
fn map_reply_json(json: &serde_json::Value) -> Result<W2Extraction, AppError> {
    let box2_federal = amount_from_json(&json["box2Federal"]).ok_or_else(|| {
        AppError::Validation("Could not read Box 2 (federal withholding) from the W-2".to_string())
    })?;
    let box17_state = amount_from_json(&json["box17State"]).ok_or_else(|| {
        AppError::Validation("Could not read Box 17 (state withholding) from the W-2".to_string())
    })?;

    let confidence = json["confidence"]
        .as_str()
        .and_then(|s| match s.to_ascii_lowercase().as_str() {
            "high" => Some(ConfidenceTag::High),
            "medium" => Some(ConfidenceTag::Medium),
            "low" => Some(ConfidenceTag::Low),
            _ => None,
        });

    Ok(W2Extraction {
        box2_federal,
        box17_state,
        confidence,
    })
}

/// Scan free text for `box2Federal ... <number>` and `box17State ... <number>`.
fn recover_from_text(text: &str) -> Option<W2Extraction> {
    let box2_federal = number_after_key(text, "box2Federal")?;
    let box17_state = number_after_key(text, "box17State")?;
    Some(W2Extraction {
        box2_federal,
        box17_state,
        confidence: Some(ConfidenceTag::Low),
    })
}

fn number_after_key(text: &str, key: &str) -> Option<f64> {
    let start = text.find(key)? + key.len();
    let rest = &text[start..];

    let number_start = rest.find(|c: char| c.is_ascii_digit() || c == '-')?;
    // Another field or a closing brace before the number means this key has no value.
    if rest[..number_start].contains([',', '}', '\n']) {
        return None;
    }

    let number: String = rest[number_start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();
    parse_amount_text(number.trim_end_matches([',', '.']))
}

/// Reject extracted amounts that the refund formulas cannot use.
pub fn validate_extraction(extraction: &W2Extraction) -> Result<(), AppError> {
    if !is_valid_amount(extraction.box2_federal) {
        return Err(AppError::Validation(format!(
            "Extracted Box 2 value is invalid: {}",
            extraction.box2_federal
        )));
    }
    if !is_valid_amount(extraction.box17_state) {
        return Err(AppError::Validation(format!(
            "Extracted Box 17 value is invalid: {}",
            extraction.box17_state
        )));
    }
    Ok(())
}

/// Strip markdown code fences from a model reply if present.
fn strip_markdown_json(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        let after_open = if let Some(pos) = trimmed.find('\n') {
            &trimmed[pos + 1..]
        } else {
            trimmed
        };
        let cleaned = after_open.trim_end();
        if let Some(inner) = cleaned.strip_suffix("```") {
            inner.trim().to_string()
        } else {
            cleaned.to_string()
        }
    } else {
        trimmed.to_string()
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

/// Check status and extract body text.
async fn handle_api_response(
    response: reqwest::Response,
    provider: VisionProvider,
) -> Result<String, AppError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<failed to read body>".to_string());
        let msg = format!(
            "Vision API error: {} from {} - {}",
            status,
            provider,
            truncate(&body, 1024)
        );
        error!("{}", msg);
        return Err(AppError::Upstream(msg));
    }
    response.text().await.map_err(|e| {
        AppError::Upstream(format!(
            "Failed to read API response body from {}: {}",
            provider, e
        ))
    })
}

fn request_error(provider: VisionProvider, e: reqwest::Error) -> AppError {
    let msg = if e.is_timeout() {
        format!(
            "Vision API timeout after {}s for provider '{}'",
            API_TIMEOUT.as_secs(),
            provider
        )
    } else {
        format!("Vision API request failed for {}: {}", provider, e)
    };
    error!("{}", msg);
    AppError::Upstream(msg)
}

fn endpoint(api_base: &str, path: &str) -> String {
    format!("{}{}", api_base.trim_end_matches('/'), path)
}

/// Build the OpenAI chat completions body for an upload.
fn openai_request_body(model: &str, upload: &PreparedUpload) -> serde_json::Value {
    let attachment = if upload.is_pdf() {
        serde_json::json!({
            "type": "file",
            "file": {
                "filename": upload.file_name,
                "file_data": upload.data_url()
            }
        })
    } else {
        serde_json::json!({
            "type": "image_url",
            "image_url": { "url": upload.data_url(), "detail": "high" }
        })
    };

    serde_json::json!({
        "model": model,
        "max_tokens": 512,
        "messages": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": [
                {"type": "text", "text": build_w2_prompt()},
                attachment
            ]}
        ],
        "response_format": {
            "type": "json_schema",
            "json_schema": {
                "name": "w2_withholding",
                "strict": true,
                "schema": w2_extraction_schema()
            }
        }
    })
}

/// Build the Anthropic messages body for an upload.
fn claude_request_body(model: &str, upload: &PreparedUpload) -> serde_json::Value {
    let block_type = if upload.is_pdf() { "document" } else { "image" };

    serde_json::json!({
        "model": model,
        "max_tokens": 512,
        "system": SYSTEM_PROMPT,
        "messages": [
            {"role": "user", "content": [
                {
                    "type": block_type,
                    "source": {
                        "type": "base64",
                        "media_type": upload.media_type,
                        "data": upload.base64_data
                    }
                },
                {"type": "text", "text": build_w2_prompt()}
            ]}
        ]
    })
}

/// Call the OpenAI API with structured output (json_schema response_format).
async fn call_openai(
    client: &reqwest::Client,
    settings: &ExtractionSettings,
    upload: &PreparedUpload,
) -> Result<String, AppError> {
    let body = openai_request_body(&settings.model, upload);

    let response = client
        .post(endpoint(&settings.api_base, "/v1/chat/completions"))
        .header("Authorization", format!("Bearer {}", settings.api_key))
        .header("content-type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| request_error(VisionProvider::OpenAi, e))?;

    let body_text = handle_api_response(response, VisionProvider::OpenAi).await?;

    // { "choices": [{"message": {"content": "..."}}] }
    let resp_json: serde_json::Value = serde_json::from_str(&body_text).map_err(|e| {
        AppError::Upstream(format!("Failed to parse OpenAI API response wrapper: {}", e))
    })?;

    resp_json["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Upstream("No content in OpenAI API response".to_string()))
}

/// Call the Anthropic messages API.
async fn call_claude(
    client: &reqwest::Client,
    settings: &ExtractionSettings,
    upload: &PreparedUpload,
) -> Result<String, AppError> {
    let body = claude_request_body(&settings.model, upload);

    let response = client
        .post(endpoint(&settings.api_base, "/v1/messages"))
        .header("x-api-key", &settings.api_key)
        .header("anthropic-version", "2023-06-01")
        .header("content-type", "application/json")
        .json(&body)
        .send()
        .await
        .map_err(|e| request_error(VisionProvider::Claude, e))?;

    let body_text = handle_api_response(response, VisionProvider::Claude).await?;

    // { "content": [{"type": "text", "text": "..."}] }
    let resp_json: serde_json::Value = serde_json::from_str(&body_text).map_err(|e| {
        AppError::Upstream(format!("Failed to parse Claude API response wrapper: {}", e))
    })?;

    resp_json["content"][0]["text"]
        .as_str()
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::Upstream("No text content in Claude API response".to_string()))
}
