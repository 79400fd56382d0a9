//! Upload validation, resizing, and base64 encoding for vision APIs.
//!
//! Photos are capped at 2048px on the longest edge so W-2 text stays
//! legible while request bodies stay small. PDFs are forwarded unchanged.

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{DynamicImage, ImageFormat};
use std::io::Cursor;
use tracing::info;

use super::types::PreparedUpload;
use crate::error::AppError;

/// Maximum dimension (width or height) for images sent to vision APIs.
pub const MAX_IMAGE_DIMENSION: u32 = 2048;

/// MIME types accepted for W-2 uploads.
pub const ACCEPTED_MEDIA_TYPES: &[&str] = &["image/jpeg", "image/jpg", "image/png", "application/pdf"];

/// Resolve the media type of an upload from its declared type or file name.
///
/// Returns `None` when the upload is not a JPEG, PNG, or PDF.
pub fn resolve_media_type(declared: Option<&str>, file_name: &str) -> Option<&'static str> {
    let declared = declared
        .map(|d| d.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
        .filter(|d| !d.is_empty() && d != "application/octet-stream");

    if let Some(declared) = declared {
        return match declared.as_str() {
            "image/jpeg" | "image/jpg" => Some("image/jpeg"),
            "image/png" => Some("image/png"),
            "application/pdf" => Some("application/pdf"),
            _ => None,
        };
    }

    let extension = file_name.rsplit_once('.')?.1.to_ascii_lowercase();
    match extension.as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "pdf" => Some("application/pdf"),
        _ => None,
    }
}

/// Prepare an upload for a vision API: validate, resize images, encode.
///
/// # Errors
/// Returns a validation error when the file is empty or an image cannot be decoded.
pub fn prepare_upload(
    bytes: &[u8],
    media_type: &str,
    file_name: &str,
) -> Result<PreparedUpload, AppError> {
    if bytes.is_empty() {
        return Err(AppError::Validation("Uploaded file is empty".to_string()));
    }

    if media_type == "application/pdf" {
        info!("Forwarding PDF upload '{}': {} bytes", file_name, bytes.len());
        return Ok(PreparedUpload {
            media_type: media_type.to_string(),
            base64_data: STANDARD.encode(bytes),
            file_name: file_name.to_string(),
        });
    }

    let img = image::load_from_memory(bytes).map_err(|e| {
        AppError::Validation(format!(
            "Failed to read image: {}. Upload a JPEG, PNG, or PDF.",
            e
        ))
    })?;
    info!("Loaded W-2 image: {}x{}", img.width(), img.height());

    let resized = resize_if_needed(img, MAX_IMAGE_DIMENSION);
    let jpeg_bytes = encode_to_jpeg(&resized)?;
    info!(
        "Prepared W-2 image: {}x{}, {} bytes",
        resized.width(),
        resized.height(),
        jpeg_bytes.len()
    );

    Ok(PreparedUpload {
        media_type: "image/jpeg".to_string(),
        base64_data: STANDARD.encode(&jpeg_bytes),
        file_name: file_name.to_string(),
    })
}

/// Resize image if either dimension exceeds max, maintaining aspect ratio.
fn resize_if_needed(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = (img.width(), img.height());

    if width <= max_dimension && height <= max_dimension {
        return img;
    }

    let scale = max_dimension as f32 / width.max(height) as f32;
    let new_width = (width as f32 * scale) as u32;
    let new_height = (height as f32 * scale) as u32;

    img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3)
}

/// Encode to JPEG bytes. JPEG has no alpha channel, so convert to RGB first.
fn encode_to_jpeg(img: &DynamicImage) -> Result<Vec<u8>, AppError> {
    let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
    let mut buffer = Cursor::new(Vec::new());
    rgb.write_to(&mut buffer, ImageFormat::Jpeg)
        .map_err(|e| AppError::Upstream(format!("Failed to encode image to JPEG: {}", e)))?;
    Ok(buffer.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::new_rgba8(width, height);
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_resolve_media_type_declared() {
        assert_eq!(resolve_media_type(Some("image/png"), "x"), Some("image/png"));
        assert_eq!(resolve_media_type(Some("image/jpg"), "x"), Some("image/jpeg"));
        assert_eq!(
            resolve_media_type(Some("application/pdf; charset=binary"), "x"),
            Some("application/pdf")
        );
        assert_eq!(resolve_media_type(Some("text/plain"), "w2.png"), None);
        assert_eq!(resolve_media_type(Some("image/gif"), "w2.gif"), None);
    }

    #[test]
    fn test_resolve_media_type_from_extension() {
        assert_eq!(resolve_media_type(None, "W2-2025.JPG"), Some("image/jpeg"));
        assert_eq!(
            resolve_media_type(Some("application/octet-stream"), "w2.pdf"),
            Some("application/pdf")
        );
        assert_eq!(resolve_media_type(None, "w2.txt"), None);
        assert_eq!(resolve_media_type(None, "noextension"), None);
    }

    #[test]
    fn test_prepare_upload_rejects_empty() {
        let result = prepare_upload(&[], "image/png", "w2.png");
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_prepare_upload_rejects_invalid_image() {
        let result = prepare_upload(b"not an image", "image/png", "w2.png");
        match result {
            Err(AppError::Validation(msg)) => assert!(msg.contains("Failed to read image")),
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_prepare_upload_pdf_passthrough() {
        let pdf = b"%PDF-1.7 fake".to_vec();
        let upload = prepare_upload(&pdf, "application/pdf", "w2.pdf").unwrap();
        assert!(upload.is_pdf());
        assert_eq!(STANDARD.decode(&upload.base64_data).unwrap(), pdf);
        assert_eq!(upload.file_name, "w2.pdf");
    }

    #[test]
    fn test_prepare_upload_png_becomes_jpeg() {
        let upload = prepare_upload(&png_bytes(300, 200), "image/png", "w2.png").unwrap();
        assert_eq!(upload.media_type, "image/jpeg");
        let jpeg = STANDARD.decode(&upload.base64_data).unwrap();
        assert_eq!(jpeg[0], 0xFF);
        assert_eq!(jpeg[1], 0xD8);
    }

    #[test]
    fn test_resize_if_needed_no_resize() {
        let img = DynamicImage::new_rgb8(500, 300);
        let resized = resize_if_needed(img, 2048);
        assert_eq!(resized.width(), 500);
        assert_eq!(resized.height(), 300);
    }

    #[test]
    fn test_resize_if_needed_long_edge() {
        let img = DynamicImage::new_rgb8(4096, 1024);
        let resized = resize_if_needed(img, 2048);
        assert_eq!(resized.width(), 2048);
        assert_eq!(resized.height(), 512);
    }
}
