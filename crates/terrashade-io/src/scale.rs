//! Image resampling

use image::imageops::{self, FilterType};
use image::RgbaImage;
use terrashade_core::{RenderError, Result};
use tracing::debug;

use crate::data_url::encode_png_data_url;

/// Largest accepted scale factor; bigger factors are capped
pub const MAX_IMAGE_SCALE: f64 = 20.0;

fn checked_factor(name: &str, factor: f64) -> Result<f64> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(RenderError::invalid_config(format!(
            "{} must be a positive number, got {}",
            name, factor
        )));
    }
    Ok(factor.min(MAX_IMAGE_SCALE))
}

fn scaled_dimension(size: u32, factor: f64) -> Result<u32> {
    let scaled = (size as f64 * factor).round();
    if scaled < 1.0 || scaled > u32::MAX as f64 {
        return Err(RenderError::InvalidImage(format!(
            "scaling {} by {} gives an empty or oversized image",
            size, factor
        )));
    }
    Ok(scaled as u32)
}

/// Resample `image` to `round(width * scale_x) x round(height * scale_y)`
pub fn scale_image(image: &RgbaImage, scale_x: f64, scale_y: f64) -> Result<RgbaImage> {
    let scale_x = checked_factor("scale_x", scale_x)?;
    let scale_y = checked_factor("scale_y", scale_y)?;
    let width = scaled_dimension(image.width(), scale_x)?;
    let height = scaled_dimension(image.height(), scale_y)?;

    if (width, height) == image.dimensions() {
        return Ok(image.clone());
    }
    debug!(
        "Scaling {}x{} image to {}x{}",
        image.width(),
        image.height(),
        width,
        height
    );
    Ok(imageops::resize(image, width, height, FilterType::Triangle))
}

/// Resample `image` and encode the result as a PNG `data:` URL
pub fn scale_image_to_data_url(image: &RgbaImage, scale_x: f64, scale_y: f64) -> Result<String> {
    encode_png_data_url(&scale_image(image, scale_x, scale_y)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_url::decode_data_url;

    #[test]
    fn test_rejects_non_positive_factors() {
        let image = RgbaImage::new(4, 4);
        assert!(scale_image(&image, 0.0, 1.0).is_err());
        assert!(scale_image(&image, 1.0, -2.0).is_err());
        assert!(scale_image(&image, f64::NAN, 1.0).is_err());
    }

    #[test]
    fn test_factor_is_capped() {
        let image = RgbaImage::new(2, 3);
        let scaled = scale_image(&image, 50.0, 1.0).unwrap();
        assert_eq!(scaled.dimensions(), (40, 3));
    }

    #[test]
    fn test_downscale_to_nothing_fails() {
        let image = RgbaImage::new(2, 2);
        assert!(matches!(
            scale_image(&image, 0.1, 1.0),
            Err(RenderError::InvalidImage(_))
        ));
    }

    #[test]
    fn test_data_url_output() {
        let image = RgbaImage::new(3, 3);
        let url = scale_image_to_data_url(&image, 2.0, 1.0).unwrap();
        let decoded = image::load_from_memory(&decode_data_url(&url).unwrap())
            .unwrap()
            .to_rgba8();
        assert_eq!(decoded.dimensions(), (6, 3));
    }
}
