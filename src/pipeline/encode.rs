//! Image encoding: `DynamicImage` → RGB JPEG bytes.
//!
//! Every picture in the package (full-page renders and embedded images) goes
//! through here so they share one colour model and one quality setting.
//! Alpha channels and CMYK sources are flattened to 8-bit RGB first; JPEG has
//! no alpha and most e-readers only handle RGB/greyscale baseline JPEGs.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, RgbImage};
use tracing::debug;

/// Convert any decoded image to 8-bit RGB.
pub fn to_rgb(img: &DynamicImage) -> RgbImage {
    match img {
        DynamicImage::ImageRgb8(rgb) => rgb.clone(),
        other => other.to_rgb8(),
    }
}

/// Encode an image as an RGB JPEG at `quality` (1–100).
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let rgb = to_rgb(img);
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality.clamp(1, 100));
    rgb.write_with_encoder(encoder)?;

    debug!(
        "Encoded {}x{} image → {} bytes JPEG",
        rgb.width(),
        rgb.height(),
        buf.len()
    );
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn encode_small_rgba_image() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 128])));
        let jpeg = encode_jpeg(&img, 95).expect("encode should succeed");
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "JPEG SOI marker");

        let decoded = image::load_from_memory(&jpeg).expect("valid JPEG");
        assert_eq!(decoded.width(), 10);
        assert_eq!(decoded.height(), 10);
    }

    #[test]
    fn greyscale_becomes_rgb() {
        let img = DynamicImage::ImageLuma8(image::GrayImage::new(4, 3));
        let rgb = to_rgb(&img);
        assert_eq!(rgb.dimensions(), (4, 3));
    }
}
