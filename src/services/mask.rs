//! Local stand-in for background removal: keeps a centred disc of the image
//! and makes everything outside it transparent.

use image::{DynamicImage, ImageOutputFormat, ImageResult, RgbaImage};
use std::io::Cursor;

/// Decodes `data`, applies [`circular_mask`] and re-encodes as PNG.
pub fn apply_fallback_mask(data: &[u8]) -> ImageResult<Vec<u8>> {
    let img = image::load_from_memory(data)?;
    encode_png(circular_mask(&img))
}

/// Radius is `min(width, height) / 2`, centred on the image. A pixel is kept
/// when its centre lies inside the circle; its alpha is zeroed otherwise.
pub fn circular_mask(img: &DynamicImage) -> RgbaImage {
    let mut rgba = img.to_rgba8();
    let (width, height) = rgba.dimensions();

    let center_x = width as f32 / 2.0;
    let center_y = height as f32 / 2.0;
    let radius = width.min(height) as f32 / 2.0;
    let radius_sq = radius * radius;

    for (x, y, pixel) in rgba.enumerate_pixels_mut() {
        let dx = x as f32 + 0.5 - center_x;
        let dy = y as f32 + 0.5 - center_y;
        if dx * dx + dy * dy > radius_sq {
            pixel[3] = 0;
        }
    }

    rgba
}

pub fn encode_png(img: RgbaImage) -> ImageResult<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img).write_to(&mut buffer, ImageOutputFormat::Png)?;
    Ok(buffer.into_inner())
}
