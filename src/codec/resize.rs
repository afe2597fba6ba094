/// Resized tier generation
///
/// Resizing is width-constrained: the height bound is set far above any
/// realistic aspect ratio so the output width always equals the target and
/// the aspect ratio of the original is preserved.

use image::{imageops::FilterType, DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;

use crate::error::Result;

/// Read the pixel dimensions of an encoded image without decoding it fully
///
/// # Returns
/// * `Ok((width, height))` - Dimensions in pixels
/// * `Err(ImgfsError::ImgLib)` - The bytes are not a recognised image
pub fn decode_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
    Ok(reader.into_dimensions()?)
}

/// Decode `original`, shrink it to `target_width` and re-encode it as JPEG
pub fn resize_to_width(original: &[u8], target_width: u32) -> Result<Vec<u8>> {
    let img = image::load_from_memory(original)?;

    // Resize maintaining aspect ratio (width-constrained)
    let resized = img.resize(target_width, target_width.saturating_mul(10), FilterType::Lanczos3);

    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgb8(resized.to_rgb8());

    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageFormat::Jpeg)?;
    Ok(out.into_inner())
}
