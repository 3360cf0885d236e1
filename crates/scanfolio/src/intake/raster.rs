use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::error::IntakeError;

use super::{IntakeOptions, NormalizedPage, CANONICAL_MIME_TYPE};

/// Hex-encoded BLAKE3 digest of canonical page bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Decodes any supported raster format, bounds its longest side, flattens alpha and re-encodes
/// it as JPEG.
pub fn normalize_image(
    bytes: &[u8],
    page_index: usize,
    options: &IntakeOptions,
) -> Result<NormalizedPage, IntakeError> {
    let _span = tracing::debug_span!("intake.raster", page_index).entered();

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| IntakeError::Decode(format!("Failed to load image: {}", e)))?;

    let (width, height) = decoded.dimensions();
    let bounded = if width.max(height) > options.max_dimension {
        decoded.resize(options.max_dimension, options.max_dimension, FilterType::Lanczos3)
    } else {
        decoded
    };

    // JPEG has no alpha channel; dropping it here keeps the encoder input identical for
    // sources that only differ in transparency.
    let rgb = DynamicImage::ImageRgb8(bounded.to_rgb8());
    let (width, height) = rgb.dimensions();

    let mut buffer = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buffer, options.jpeg_quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| IntakeError::Encode(e.to_string()))?;

    let image_bytes = buffer.into_inner();
    Ok(NormalizedPage {
        page_index,
        content_hash: content_hash(&image_bytes),
        image_bytes,
        mime_type: CANONICAL_MIME_TYPE.to_string(),
        width,
        height,
    })
}
