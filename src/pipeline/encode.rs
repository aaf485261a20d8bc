//! Image encoding: `GrayImage` → PNG bytes for the OCR engine.
//!
//! Both backends hand Tesseract an encoded file rather than raw pixels:
//! the executable needs a path, and `leptess` decodes from memory. PNG is
//! lossless, so the enhanced pixels reach the engine untouched.

use image::{GrayImage, ImageFormat};
use std::io::Cursor;
use tracing::trace;

/// Encode a grayscale image as PNG.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)?;
    trace!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn encode_small_image() {
        let img = GrayImage::from_pixel(10, 10, Luma([200]));
        let data = encode_png(&img).expect("encode should succeed");
        assert_eq!(&data[1..4], b"PNG");
        let decoded = image::load_from_memory(&data).expect("valid png").to_luma8();
        assert_eq!(decoded.dimensions(), (10, 10));
        assert_eq!(decoded.get_pixel(3, 3)[0], 200);
    }
}
