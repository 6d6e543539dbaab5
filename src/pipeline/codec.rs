use std::io::Cursor;

use image::{DynamicImage, ImageFormat};

use crate::error::DecodeError;

/// Decodes image bytes, sniffing the format from the content.
pub(crate) fn decode_image(bytes: &[u8], what: &str) -> Result<DynamicImage, DecodeError> {
    image::load_from_memory(bytes).map_err(|source| DecodeError::Image {
        what: what.to_string(),
        source,
    })
}

/// Encodes an image as PNG in memory.
pub(crate) fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    image.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    Ok(buf)
}
