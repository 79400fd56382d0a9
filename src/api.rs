//! Typed HTTP helpers for the refund backend.

use reqwest::{multipart, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::types::{CachedDocument, RefundEstimate};

/// Backend base URL, fixed at build time.
pub const API_BASE: &str = match option_env!("REFUND_API_BASE") {
    Some(base) => base,
    None => "http://localhost:3001",
};

/// Multipart field the backend reads the W-2 from.
pub const UPLOAD_FIELD: &str = "w2Image";

const GENERIC_ERROR: &str = "Something went wrong. Please try again.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Could not reach the refund service: {0}")]
    Network(String),
    #[error("{message}")]
    Server { status: u16, message: String },
    #[error("Unexpected response from the refund service: {0}")]
    Decode(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CalculateRequest {
    box2_federal: f64,
    box17_state: f64,
}

pub fn endpoint(path: &str) -> String {
    format!("{}{}", API_BASE.trim_end_matches('/'), path)
}

/// Estimate a refund from manually entered withholding amounts.
pub async fn calculate(federal: f64, state: f64) -> Result<RefundEstimate, ApiError> {
    let request = reqwest::Client::new()
        .post(endpoint("/api/calculate"))
        .json(&CalculateRequest {
            box2_federal: federal,
            box17_state: state,
        });

    let response = with_credentials(request)
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    read_estimate(response).await
}

/// Upload a W-2 document and get the estimate read from it. `bearer` is
/// forwarded as the model credential when the host page supplies one.
pub async fn upload_w2(
    document: &CachedDocument,
    bearer: Option<&str>,
) -> Result<RefundEstimate, ApiError> {
    let part = multipart::Part::bytes(document.bytes.clone())
        .file_name(document.file_name.clone())
        .mime_str(&document.mime_type)
        .map_err(|e| ApiError::Network(e.to_string()))?;
    let form = multipart::Form::new().part(UPLOAD_FIELD, part);

    let mut request = reqwest::Client::new()
        .post(endpoint("/api/upload-w2"))
        .multipart(form);
    if let Some(token) = bearer {
        request = request.bearer_auth(token);
    }

    debug!(
        "Uploading '{}' ({} bytes)",
        document.file_name,
        document.bytes.len()
    );
    let response = with_credentials(request)
        .send()
        .await
        .map_err(|e| ApiError::Network(e.to_string()))?;
    read_estimate(response).await
}

async fn read_estimate(response: Response) -> Result<RefundEstimate, ApiError> {
    let status = response.status();
    if status.is_success() {
        return response
            .json::<RefundEstimate>()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()));
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_error_message(&body);
    warn!("Refund service returned {}: {}", status, message);
    Err(ApiError::Server {
        status: status.as_u16(),
        message,
    })
}

#[cfg(target_arch = "wasm32")]
fn with_credentials(request: RequestBuilder) -> RequestBuilder {
    request.fetch_credentials_include()
}

#[cfg(not(target_arch = "wasm32"))]
fn with_credentials(request: RequestBuilder) -> RequestBuilder {
    request
}

/// Pick a user-facing message out of an error body: JSON `error` or
/// `message`, else the raw text, else a generic message.
pub fn extract_error_message(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return GENERIC_ERROR.to_string();
    }

    if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
        let from_json = ["error", "message"].iter().find_map(|key| match json.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Object(inner)) => inner
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string),
            _ => None,
        });
        return from_json.unwrap_or_else(|| GENERIC_ERROR.to_string());
    }

    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_field() {
        assert_eq!(
            extract_error_message(r#"{"error": "box2Federal is required"}"#),
            "box2Federal is required"
        );
    }

    #[test]
    fn test_extract_message_field() {
        assert_eq!(
            extract_error_message(r#"{"message": "Rate limited"}"#),
            "Rate limited"
        );
        assert_eq!(
            extract_error_message(r#"{"error": {"message": "Nested"}}"#),
            "Nested"
        );
    }

    #[test]
    fn test_extract_raw_text() {
        assert_eq!(
            extract_error_message("  Bad Gateway \n"),
            "Bad Gateway"
        );
    }

    #[test]
    fn test_extract_generic_fallback() {
        assert_eq!(extract_error_message(""), GENERIC_ERROR);
        assert_eq!(extract_error_message("{}"), GENERIC_ERROR);
        assert_eq!(extract_error_message(r#"{"error": ""}"#), GENERIC_ERROR);
    }

    #[test]
    fn test_endpoint() {
        assert!(endpoint("/api/calculate").ends_with("/api/calculate"));
        assert!(!endpoint("/health").contains("//health"));
    }

    #[test]
    fn test_calculate_request_wire_names() {
        let body = serde_json::to_value(CalculateRequest {
            box2_federal: 1000.0,
            box17_state: 500.0,
        })
        .unwrap();
        assert_eq!(body["box2Federal"], 1000.0);
        assert_eq!(body["box17State"], 500.0);
    }
}
