//! Page image encoding for vision transcription: `DynamicImage` → base64 PNG.
//!
//! PNG is lossless, so glyph edges stay crisp for the vision model.
//! `detail: "high"` lets GPT-4-class models tile the full page instead of
//! reading a single downscaled overview.

use crate::error::FlashcardError;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode rasterised page `page_num` (1-indexed) as a base64 PNG attachment.
pub fn encode_page(img: &DynamicImage, page_num: usize) -> Result<ImageData, FlashcardError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| FlashcardError::Parse {
            detail: format!("image encoding failed for page {}: {}", page_num, e),
        })?;

    let b64 = STANDARD.encode(&buf);
    debug!("Page {}: encoded image → {} bytes base64", page_num, b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encodes_png_attachment() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 12, Rgba([0, 0, 0, 255])));
        let data = encode_page(&img, 1).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }
}
