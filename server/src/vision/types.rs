//! Type definitions for W-2 vision extraction.

use serde::{Deserialize, Serialize};

use crate::config::VisionProvider;
use crate::refund::ConfidenceTag;

/// Withholding values read from a W-2 by the vision model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct W2Extraction {
    /// Box 2: federal income tax withheld
    pub box2_federal: f64,
    /// Box 17: state income tax withheld
    pub box17_state: f64,
    /// Model's own confidence in the reading, when it reports one
    pub confidence: Option<ConfidenceTag>,
}

/// How the extraction was obtained from the model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    /// Reply was a well-formed JSON object with both values.
    Parsed(W2Extraction),
    /// Reply was malformed; values were recovered from its text.
    Recovered(W2Extraction),
}

impl ExtractionOutcome {
    pub fn extraction(&self) -> &W2Extraction {
        match self {
            ExtractionOutcome::Parsed(e) | ExtractionOutcome::Recovered(e) => e,
        }
    }
}

/// Upload payload ready to embed in a vision API request.
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    /// Media type of `base64_data` (after any re-encoding)
    pub media_type: String,
    /// Base64-encoded bytes
    pub base64_data: String,
    /// Original file name, forwarded for document inputs
    pub file_name: String,
}

impl PreparedUpload {
    pub fn is_pdf(&self) -> bool {
        self.media_type == "application/pdf"
    }

    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.base64_data)
    }
}

/// Everything needed to call the vision provider for one request.
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    pub provider: VisionProvider,
    pub model: String,
    pub api_base: String,
    pub api_key: String,
}
