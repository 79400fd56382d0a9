use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the withholding amounts behind an estimate were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfidenceTag {
    High,
    Medium,
    Low,
    AiExtracted,
    Manual,
}

impl ConfidenceTag {
    pub fn label(&self) -> &'static str {
        match self {
            ConfidenceTag::High => "High confidence",
            ConfidenceTag::Medium => "Medium confidence",
            ConfidenceTag::Low => "Low confidence",
            ConfidenceTag::AiExtracted => "Read by AI",
            ConfidenceTag::Manual => "Entered manually",
        }
    }
}

/// Estimate returned by the backend, matching its wire format.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundEstimate {
    pub box2_federal: f64,
    pub box17_state: f64,
    pub estimated_refund: f64,
    pub ocr_confidence: ConfidenceTag,
}

/// An estimate as kept in the session store.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedResult {
    #[serde(flatten)]
    pub estimate: RefundEstimate,
    pub computed_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document_name: Option<String>,
}

impl CachedResult {
    pub fn new(estimate: RefundEstimate, source_document_name: Option<String>) -> Self {
        Self {
            estimate,
            computed_at: Utc::now(),
            source_document_name,
        }
    }
}

/// The last file the user picked, kept so a reload does not lose it.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDocument {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub mime_type: String,
    /// Milliseconds since the Unix epoch.
    pub last_modified: f64,
}

impl CachedDocument {
    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}
