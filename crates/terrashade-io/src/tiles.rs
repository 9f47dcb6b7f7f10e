//! Tile stitching
//!
//! Map tiles are loaded concurrently and drawn into a grid covering the
//! bounding box of their coordinates. Tiles that fail to load leave a
//! transparent hole and are reported in the mosaic.

use futures::future::join_all;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::Deserialize;
use terrashade_core::{CancellationToken, RenderError, Result};
use tracing::{debug, warn};

use crate::data_url::encode_png_data_url;
use crate::loader::ImageLoader;
use crate::source::ImageSource;

/// Grid position of a tile; `y` grows downwards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct TileCoords {
    /// Column
    pub x: i64,
    /// Row
    pub y: i64,
}

/// A tile to stitch
#[derive(Debug, Clone, Deserialize)]
pub struct Tile {
    /// Grid position
    pub coords: TileCoords,
    /// Image of the tile
    pub image: ImageSource,
}

/// Stitched tiles
#[derive(Debug, Clone)]
pub struct TileMosaic {
    /// The stitched image
    pub image: RgbaImage,
    /// Edge length of a tile in pixels
    pub tile_size: u32,
    /// Smallest column
    pub min_x: i64,
    /// Smallest row
    pub min_y: i64,
    /// Largest column
    pub max_x: i64,
    /// Largest row
    pub max_y: i64,
    /// Number of tiles drawn
    pub loaded: usize,
    /// Tiles that failed to load
    pub missing: Vec<TileCoords>,
}

impl TileMosaic {
    /// Whether every tile was drawn
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// The stitched image as a PNG `data:` URL
    pub fn to_data_url(&self) -> Result<String> {
        encode_png_data_url(&self.image)
    }
}

/// Largest mosaic, in pixels, that is allocated (1 GiB of RGBA8)
pub const MAX_MOSAIC_PIXELS: u64 = 1 << 28;

fn grid_dimension(min: i64, max: i64, tile_size: u32) -> Result<u32> {
    max.checked_sub(min)
        .and_then(|span| span.checked_add(1))
        .and_then(|cells| u32::try_from(cells).ok())
        .and_then(|cells| cells.checked_mul(tile_size))
        .ok_or_else(|| {
            RenderError::InvalidImage(format!(
                "tile grid {}..={} of {} px tiles is too large",
                min, max, tile_size
            ))
        })
}

/// Load `tiles` concurrently and stitch them into one image.
///
/// The tile size is the width of the first tile that loaded; other tiles
/// are resampled to it. Returns `Ok(None)` for an empty tile list.
pub async fn tiles_to_image(
    tiles: &[Tile],
    loader: &ImageLoader,
    cancel: &CancellationToken,
) -> Result<Option<TileMosaic>> {
    let Some(first) = tiles.first() else {
        return Ok(None);
    };

    let (mut min_x, mut max_x, mut min_y, mut max_y) =
        (first.coords.x, first.coords.x, first.coords.y, first.coords.y);
    for tile in tiles {
        min_x = min_x.min(tile.coords.x);
        max_x = max_x.max(tile.coords.x);
        min_y = min_y.min(tile.coords.y);
        max_y = max_y.max(tile.coords.y);
    }
    debug!(
        "Loading {} tiles covering x {}..={}, y {}..={}",
        tiles.len(),
        min_x,
        max_x,
        min_y,
        max_y
    );

    let results = join_all(tiles.iter().map(|tile| loader.load(&tile.image, cancel))).await;
    cancel.check()?;

    let mut missing = Vec::new();
    let mut loaded = Vec::new();
    for (tile, result) in tiles.iter().zip(results) {
        match result {
            Ok(image) => loaded.push((tile.coords, image)),
            Err(e) => {
                warn!("Tile ({}, {}) failed to load: {}", tile.coords.x, tile.coords.y, e);
                missing.push(tile.coords);
            }
        }
    }

    let Some(tile_size) = loaded.first().map(|(_, image)| image.width()) else {
        return Err(RenderError::image_load(
            "tiles",
            format!("all {} tiles failed to load", tiles.len()),
        ));
    };

    let width = grid_dimension(min_x, max_x, tile_size)?;
    let height = grid_dimension(min_y, max_y, tile_size)?;
    if width as u64 * height as u64 > MAX_MOSAIC_PIXELS {
        return Err(RenderError::ResourceExhausted {
            resource: "mosaic pixels",
            capacity: MAX_MOSAIC_PIXELS as usize,
        });
    }
    let mut mosaic = RgbaImage::new(width, height);

    for (coords, image) in &loaded {
        let x = (coords.x - min_x) * tile_size as i64;
        let y = (coords.y - min_y) * tile_size as i64;
        if image.dimensions() == (tile_size, tile_size) {
            imageops::replace(&mut mosaic, image, x, y);
        } else {
            let resized = imageops::resize(image, tile_size, tile_size, FilterType::Triangle);
            imageops::replace(&mut mosaic, &resized, x, y);
        }
    }

    if !missing.is_empty() {
        warn!("{} of {} tiles are missing from the mosaic", missing.len(), tiles.len());
    }

    Ok(Some(TileMosaic {
        image: mosaic,
        tile_size,
        min_x,
        min_y,
        max_x,
        max_y,
        loaded: loaded.len(),
        missing,
    }))
}
