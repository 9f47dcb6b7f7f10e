//! Terrashade IO - Image Loading and Preparation
//!
//! This crate gets images into memory for the renderer:
//! - Image sources (URLs, `data:` URIs, files, decoded images)
//! - Async loading with CORS handling, timeouts and cancellation
//! - Resampling by a scale factor
//! - PNG `data:` URL encoding
//! - Stitching map tiles into one mosaic

#![warn(missing_docs)]

pub mod cors;
pub mod data_url;
pub mod loader;
pub mod scale;
pub mod source;
pub mod tiles;

pub use cors::{cors_mode, is_cross_origin};
pub use data_url::{decode_data_url, encode_png, encode_png_data_url};
pub use loader::{load_image, ImageLoader, LoaderOptions};
pub use scale::{scale_image, scale_image_to_data_url, MAX_IMAGE_SCALE};
pub use source::ImageSource;
pub use tiles::{tiles_to_image, Tile, TileCoords, TileMosaic, MAX_MOSAIC_PIXELS};
