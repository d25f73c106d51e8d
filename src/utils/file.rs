use image::ImageFormat;

use crate::errors::{AppError, Result};

/// Strips parameters (`image/png; charset=...`) and lowercases.
pub fn normalize_mime_type(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

pub fn validate_mime_type(mime_type: &str, allowed_types: &[String]) -> Result<()> {
    let mime_type = normalize_mime_type(mime_type);
    if !allowed_types.iter().any(|allowed| *allowed == mime_type) {
        return Err(AppError::Validation(
            "Only JPG, PNG, and WEBP files are allowed".to_string(),
        ));
    }
    Ok(())
}

/// Checks the leading bytes against the declared type, so a renamed text file
/// never reaches the removal service or storage.
pub fn validate_image_signature(data: &[u8], mime_type: &str) -> Result<ImageFormat> {
    let detected = image::guess_format(data)
        .map_err(|_| AppError::Validation("File is not a recognizable image".to_string()))?;

    let expected = mime_to_format(&normalize_mime_type(mime_type));
    if expected != Some(detected) {
        return Err(AppError::Validation(format!(
            "File content does not match declared type {}",
            mime_type
        )));
    }
    Ok(detected)
}

pub fn mime_to_format(mime_type: &str) -> Option<ImageFormat> {
    match mime_type {
        "image/jpeg" | "image/jpg" => Some(ImageFormat::Jpeg),
        "image/png" => Some(ImageFormat::Png),
        "image/webp" => Some(ImageFormat::WebP),
        _ => None,
    }
}

pub fn get_file_extension(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Jpeg => "jpg",
        ImageFormat::Png => "png",
        ImageFormat::WebP => "webp",
        _ => "bin",
    }
}

/// Content type for serving stored blobs, sniffed from the bytes.
pub fn content_type_for(data: &[u8]) -> mime::Mime {
    match image::guess_format(data) {
        Ok(ImageFormat::Png) => mime::IMAGE_PNG,
        Ok(ImageFormat::Jpeg) => mime::IMAGE_JPEG,
        Ok(ImageFormat::WebP) => "image/webp".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}
