//! Frame scaling and still-image encoding.
//!
//! Converts raw BGRA frame data into a PNG no larger than the configured
//! resolution ceiling.

use image::{ImageBuffer, Rgba};

use crate::CapturedImage;

/// Scale `(width, height)` down to fit within `(max_width, max_height)`,
/// preserving the aspect ratio. Dimensions already inside the ceiling are
/// returned unchanged.
pub fn scaled_dimensions(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width <= max_width && height <= max_height {
        return (width, height);
    }
    let width_ratio = max_width as f64 / width as f64;
    let height_ratio = max_height as f64 / height as f64;
    let ratio = width_ratio.min(height_ratio);
    (
        ((width as f64 * ratio) as u32).max(1),
        ((height as f64 * ratio) as u32).max(1),
    )
}

/// Convert BGRA frame data to a PNG, downscaling to the ceiling if needed.
///
/// # Arguments
/// * `data` - BGRA pixel data
/// * `width` - Frame width in pixels
/// * `height` - Frame height in pixels
/// * `max_width` - Maximum output width
/// * `max_height` - Maximum output height
pub fn bgra_to_png(
    data: &[u8],
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
) -> Result<CapturedImage, String> {
    if width == 0 || height == 0 {
        return Err("empty frame".to_string());
    }
    if data.len() < (width * height * 4) as usize {
        return Err(format!(
            "Buffer too small: expected {} bytes, got {}",
            width * height * 4,
            data.len()
        ));
    }

    // Convert BGRA to RGBA (swap B and R channels)
    let mut rgba_data = Vec::with_capacity(data.len());
    for chunk in data.chunks_exact(4) {
        rgba_data.push(chunk[2]); // R (was B)
        rgba_data.push(chunk[1]); // G
        rgba_data.push(chunk[0]); // B (was R)
        rgba_data.push(255); // opaque alpha
    }

    let img: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_raw(width, height, rgba_data)
            .ok_or_else(|| "Failed to build image buffer".to_string())?;

    let (out_width, out_height) = scaled_dimensions(width, height, max_width, max_height);
    let resized = if (out_width, out_height) == (width, height) {
        img
    } else {
        image::imageops::resize(&img, out_width, out_height, image::imageops::FilterType::Triangle)
    };

    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgba8(resized)
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .map_err(|err| format!("PNG encoding failed: {}", err))?;

    Ok(CapturedImage {
        bytes,
        width: out_width,
        height: out_height,
    })
}
