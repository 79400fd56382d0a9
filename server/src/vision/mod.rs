//! AI vision extraction of W-2 withholding boxes.

pub mod client;
pub mod image_prep;
pub mod prompts;
pub mod types;

pub use client::{build_api_client, extract_w2};
pub use image_prep::{prepare_upload, resolve_media_type};
pub use types::*;
