//! `data:` URL decoding and PNG encoding

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use image::codecs::png::PngEncoder;
use image::{ColorType, ImageEncoder, RgbaImage};
use terrashade_core::{RenderError, Result};

/// Payload bytes of a base64 `data:` URL
pub fn decode_data_url(url: &str) -> Result<Vec<u8>> {
    let src = url.chars().take(32).collect::<String>();
    let rest = url
        .trim()
        .strip_prefix("data:")
        .ok_or_else(|| RenderError::image_load(&src, "not a data URL"))?;
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| RenderError::image_load(&src, "data URL has no payload"))?;

    if !meta.to_ascii_lowercase().ends_with(";base64") {
        return Err(RenderError::image_load(
            &src,
            "only base64 data URLs are supported",
        ));
    }

    let payload: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    STANDARD
        .decode(payload)
        .map_err(|e| RenderError::image_load(src, e))
}

/// Encode an image as PNG
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(image.as_raw(), image.width(), image.height(), ColorType::Rgba8)
        .map_err(|e| RenderError::InvalidImage(e.to_string()))?;
    Ok(bytes)
}

/// Encode an image as a `data:image/png;base64,...` URL
pub fn encode_png_data_url(image: &RgbaImage) -> Result<String> {
    let png = encode_png(image)?;
    Ok(format!("data:image/png;base64,{}", STANDARD.encode(png)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_png_data_url_decodes_to_same_pixels() {
        let image = RgbaImage::from_fn(3, 2, |x, y| Rgba([x as u8 * 80, y as u8 * 100, 5, 200]));
        let url = encode_png_data_url(&image).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));

        let bytes = decode_data_url(&url).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgba8();
        assert_eq!(decoded, image);
    }

    #[test]
    fn test_rejects_malformed_urls() {
        assert!(decode_data_url("https://example.com/a.png").is_err());
        assert!(decode_data_url("data:image/png;base64").is_err());
        assert!(decode_data_url("data:text/plain,hello").is_err());
        assert!(decode_data_url("data:image/png;base64,@@@@").is_err());
    }
}
