// encode.rs — Re-encodes a captured photo for upload: downscale, JPEG at a
// bounded quality, base64 data URL.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, DynamicImage, GenericImageView};

/// Decode `raw`, shrink it to at most `max_width` pixels wide and re-encode
/// it as JPEG at `jpeg_quality` (1–100).
pub fn reencode_jpeg(raw: &[u8], max_width: u32, jpeg_quality: u8) -> Result<Vec<u8>, String> {
    let img = image::load_from_memory(raw).map_err(|e| format!("decode: {e}"))?;

    let img = if img.width() > max_width {
        let ratio = max_width as f64 / img.width() as f64;
        let new_h = ((img.height() as f64 * ratio).round() as u32).max(1);
        img.resize_exact(max_width, new_h, imageops::FilterType::Triangle)
    } else {
        img
    };

    encode_jpeg(&img, jpeg_quality)
}

pub fn encode_jpeg(img: &DynamicImage, jpeg_quality: u8) -> Result<Vec<u8>, String> {
    let (w, h) = img.dimensions();
    let mut jpeg_buf: Vec<u8> = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg_buf, jpeg_quality.clamp(1, 100));
    encoder
        .encode(img.to_rgb8().as_raw(), w, h, image::ExtendedColorType::Rgb8)
        .map_err(|e| format!("jpeg encode: {e}"))?;
    Ok(jpeg_buf)
}

pub fn jpeg_data_url(jpeg: &[u8]) -> String {
    format!("data:image/jpeg;base64,{}", BASE64.encode(jpeg))
}
