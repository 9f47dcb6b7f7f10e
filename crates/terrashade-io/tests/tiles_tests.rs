//! Tile stitching and scaling tests

use image::{Rgba, RgbaImage};
use proptest::prelude::*;
use terrashade_core::{CancellationToken, RenderError};
use terrashade_io::{
    encode_png_data_url, scale_image, tiles_to_image, ImageLoader, ImageSource, LoaderOptions,
    Tile, TileCoords, MAX_MOSAIC_PIXELS,
};

fn tile(x: i64, y: i64, size: u32, value: u8) -> Tile {
    Tile {
        coords: TileCoords { x, y },
        image: RgbaImage::from_pixel(size, size, Rgba([value, value, value, 255])).into(),
    }
}

fn loader() -> ImageLoader {
    ImageLoader::new(LoaderOptions::default()).unwrap()
}

#[tokio::test]
async fn test_empty_tile_list() {
    let mosaic = tiles_to_image(&[], &loader(), &CancellationToken::new())
        .await
        .unwrap();
    assert!(mosaic.is_none());
}

#[tokio::test]
async fn test_tiles_land_in_their_cells() {
    let tiles = [tile(10, 5, 4, 10), tile(11, 5, 4, 20), tile(11, 6, 4, 30)];
    let mosaic = tiles_to_image(&tiles, &loader(), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(mosaic.image.dimensions(), (8, 8));
    assert_eq!((mosaic.min_x, mosaic.min_y, mosaic.max_x, mosaic.max_y), (10, 5, 11, 6));
    assert_eq!(mosaic.image.get_pixel(1, 1).0, [10, 10, 10, 255]);
    assert_eq!(mosaic.image.get_pixel(5, 2).0, [20, 20, 20, 255]);
    assert_eq!(mosaic.image.get_pixel(6, 7).0, [30, 30, 30, 255]);
    // No tile at (10, 6)
    assert_eq!(mosaic.image.get_pixel(1, 6).0, [0, 0, 0, 0]);
    assert!(mosaic.is_complete());
}

#[tokio::test]
async fn test_failed_tiles_are_reported() {
    let tiles = [
        Tile {
            coords: TileCoords { x: 0, y: 0 },
            image: ImageSource::parse("/no/such/tile.png"),
        },
        tile(1, 0, 2, 99),
    ];
    let mosaic = tiles_to_image(&tiles, &loader(), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(mosaic.tile_size, 2);
    assert_eq!(mosaic.image.dimensions(), (4, 2));
    assert_eq!(mosaic.loaded, 1);
    assert_eq!(mosaic.missing, vec![TileCoords { x: 0, y: 0 }]);
    assert_eq!(mosaic.image.get_pixel(0, 0).0[3], 0);
}

#[tokio::test]
async fn test_all_tiles_failing_is_an_error() {
    let tiles = [Tile {
        coords: TileCoords { x: 0, y: 0 },
        image: ImageSource::parse("/no/such/tile.png"),
    }];
    let result = tiles_to_image(&tiles, &loader(), &CancellationToken::new()).await;
    assert!(matches!(result, Err(RenderError::ImageLoadFailed { .. })));
}

#[tokio::test]
async fn test_oversized_grid_is_rejected() {
    let tiles = [tile(0, 0, 256, 1), tile(1_000_000, 1_000_000, 256, 2)];
    let result = tiles_to_image(&tiles, &loader(), &CancellationToken::new()).await;
    assert!(matches!(
        result,
        Err(RenderError::ResourceExhausted { capacity, .. }) if capacity as u64 == MAX_MOSAIC_PIXELS
    ));

    // A span that overflows i64 is rejected as well
    let tiles = [tile(i64::MIN, 0, 1, 1), tile(i64::MAX, 0, 1, 2)];
    let result = tiles_to_image(&tiles, &loader(), &CancellationToken::new()).await;
    assert!(matches!(result, Err(RenderError::InvalidImage(_))));
}

#[tokio::test]
async fn test_tiles_from_data_urls_and_manifest() {
    let url = encode_png_data_url(&RgbaImage::from_pixel(3, 3, Rgba([1, 2, 3, 255]))).unwrap();
    let manifest = format!(
        r#"[{{ "coords": {{ "x": 0, "y": 0 }}, "image": "{url}" }},
            {{ "coords": {{ "x": 0, "y": 1 }}, "image": "{url}" }}]"#
    );
    let tiles: Vec<Tile> = serde_json::from_str(&manifest).unwrap();

    let mosaic = tiles_to_image(&tiles, &loader(), &CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(mosaic.image.dimensions(), (3, 6));
    assert_eq!(mosaic.image.get_pixel(2, 5).0, [1, 2, 3, 255]);
}

#[tokio::test]
async fn test_cancelled_tile_load() {
    let token = CancellationToken::new();
    token.cancel();
    let result = tiles_to_image(&[tile(0, 0, 2, 1)], &loader(), &token).await;
    assert!(matches!(result, Err(RenderError::Cancelled)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_mosaic_covers_bounding_box(
        coords in prop::collection::vec((-5i64..5, -5i64..5), 1..8),
        size in 1u32..6,
    ) {
        let tiles: Vec<Tile> = coords.iter().map(|&(x, y)| tile(x, y, size, 7)).collect();
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let mosaic = runtime
            .block_on(tiles_to_image(&tiles, &loader(), &CancellationToken::new()))
            .unwrap()
            .unwrap();

        let dim_x = (coords.iter().map(|c| c.0).max().unwrap() - coords.iter().map(|c| c.0).min().unwrap() + 1) as u32;
        let dim_y = (coords.iter().map(|c| c.1).max().unwrap() - coords.iter().map(|c| c.1).min().unwrap() + 1) as u32;
        prop_assert_eq!(mosaic.image.dimensions(), (dim_x * size, dim_y * size));
        prop_assert_eq!(mosaic.loaded, tiles.len());
    }

    #[test]
    fn prop_scaled_dimensions_are_rounded(
        width in 1u32..40,
        height in 1u32..40,
        scale_x in 0.1f64..4.0,
        scale_y in 0.1f64..4.0,
    ) {
        let expected = (
            (width as f64 * scale_x).round(),
            (height as f64 * scale_y).round(),
        );
        prop_assume!(expected.0 >= 1.0 && expected.1 >= 1.0);

        let scaled = scale_image(&RgbaImage::new(width, height), scale_x, scale_y).unwrap();
        prop_assert_eq!(scaled.dimensions(), (expected.0 as u32, expected.1 as u32));
    }
}
