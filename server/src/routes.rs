use std::sync::Arc;

use axum::{
    extract::{
        multipart::{Multipart, MultipartRejection},
        rejection::JsonRejection,
        State,
    },
    http::{header::AUTHORIZATION, HeaderMap},
    Json,
};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    error::AppError,
    refund::{amount_from_json, is_valid_amount, ConfidenceTag, RefundEstimate},
    state::AppState,
    vision::{extract_w2, prepare_upload, resolve_media_type, ExtractionOutcome, ExtractionSettings},
};

/// Multipart field carrying the W-2 file.
pub const UPLOAD_FIELD: &str = "w2Image";

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn calculate_handler(
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<RefundEstimate>, AppError> {
    let Json(body) = payload
        .map_err(|e| AppError::Validation(format!("Malformed request body: {}", e.body_text())))?;

    let federal = required_amount(&body, "box2Federal")?;
    let state = required_amount(&body, "box17State")?;

    let estimate = RefundEstimate::primary(federal, state, ConfidenceTag::Manual);
    info!(
        federal,
        state,
        refund = estimate.estimated_refund,
        "manual estimate computed"
    );

    Ok(Json(estimate))
}

pub async fn upload_w2_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RefundEstimate>, AppError> {
    let mut multipart = multipart
        .map_err(|e| AppError::Validation(format!("Expected a multipart upload: {}", e.body_text())))?;

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid upload: {}", e.body_text())))?
    {
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }

        let file_name = field.file_name().unwrap_or("w2-upload").to_string();
        let declared_type = field.content_type().map(str::to_string);
        let data = field
            .bytes()
            .await
            .map_err(|e| AppError::Validation(format!("Invalid upload: {}", e.body_text())))?;

        upload = Some((file_name, declared_type, data));
        break;
    }

    let (file_name, declared_type, data) = upload.ok_or(AppError::MissingFile)?;

    let media_type = resolve_media_type(declared_type.as_deref(), &file_name).ok_or_else(|| {
        warn!(
            "Rejected upload '{}' with type {:?}",
            file_name, declared_type
        );
        AppError::Validation(format!(
            "Unsupported file type {}. Upload a JPEG, PNG, or PDF.",
            declared_type.as_deref().unwrap_or("(unknown)")
        ))
    })?;

    let api_key = bearer_token(&headers)
        .or_else(|| state.config.api_key.clone())
        .ok_or_else(|| {
            AppError::Configuration(format!(
                "{} is not set and no bearer token was supplied",
                state.config.provider.key_name()
            ))
        })?;

    info!(
        "Received W-2 upload '{}' ({}, {} bytes)",
        file_name,
        media_type,
        data.len()
    );

    let prepared = prepare_upload(&data, media_type, &file_name)?;
    let settings = ExtractionSettings {
        provider: state.config.provider,
        model: state.config.model.clone(),
        api_base: state.config.api_base.clone(),
        api_key,
    };

    let estimate = match extract_w2(&state.http, &prepared, &settings).await? {
        ExtractionOutcome::Parsed(e) => {
            RefundEstimate::primary(e.box2_federal, e.box17_state, ConfidenceTag::AiExtracted)
        }
        ExtractionOutcome::Recovered(e) => {
            warn!("Using fallback refund formula for '{}'", file_name);
            RefundEstimate::fallback(e.box2_federal, e.box17_state)
        }
    };

    info!(
        refund = estimate.estimated_refund,
        confidence = ?estimate.ocr_confidence,
        "W-2 estimate computed"
    );

    Ok(Json(estimate))
}

/// Read a required, finite, non-negative amount from the request body.
fn required_amount(body: &Value, key: &str) -> Result<f64, AppError> {
    let raw = match body.get(key) {
        None | Some(Value::Null) => {
            return Err(AppError::Validation(format!("{key} is required")));
        }
        Some(raw) => raw,
    };

    let value = amount_from_json(raw)
        .ok_or_else(|| AppError::Validation(format!("{key} must be a number")))?;

    if !is_valid_amount(value) {
        return Err(AppError::Validation(format!(
            "{key} must be a finite, non-negative number"
        )));
    }

    Ok(value)
}

/// Extract a bearer token from the `Authorization` header, if any.
fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_required_amount_accepts_numbers_and_strings() {
        let body = json!({ "box2Federal": 1000, "box17State": "500.25" });
        assert_eq!(required_amount(&body, "box2Federal").unwrap(), 1000.0);
        assert_eq!(required_amount(&body, "box17State").unwrap(), 500.25);
    }

    #[test]
    fn test_required_amount_missing() {
        let body = json!({ "box2Federal": null });
        let err = required_amount(&body, "box2Federal").unwrap_err();
        assert_eq!(err.to_string(), "box2Federal is required");
        let err = required_amount(&body, "box17State").unwrap_err();
        assert_eq!(err.to_string(), "box17State is required");
    }

    #[test]
    fn test_required_amount_rejects_negative_and_non_numeric() {
        let body = json!({ "a": -1, "b": "abc", "c": "Infinity", "d": [1] });
        assert!(required_amount(&body, "a").is_err());
        assert!(required_amount(&body, "b").is_err());
        assert!(required_amount(&body, "c").is_err());
        assert!(required_amount(&body, "d").is_err());
    }

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer sk-test"));
        assert_eq!(bearer_token(&headers), Some("sk-test".to_string()));

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer   "));
        assert_eq!(bearer_token(&headers), None);
    }
}
