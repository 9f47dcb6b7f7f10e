//! End-to-end tests of the draw commands and pipeline dispatch

use image::{Rgba, RgbaImage};
use proptest::prelude::*;
use terrashade_core::{ColorStop, Colormap, ColormapOptions, ColormapSource, LayerConfig};
use terrashade_render::{
    draw_layer, draw_with_colormap, ColorScaleOptions, DeviceLimits, RenderContext, RenderError,
};

fn solid(width: u32, height: u32, value: u8) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
}

fn black_to_white() -> Colormap {
    let stops = [
        ColorStop::from_hex(0.0, "#000000").unwrap(),
        ColorStop::from_hex(1.0, "#FFFFFF").unwrap(),
    ];
    Colormap::from_stops(&stops, &ColormapOptions::default()).unwrap()
}

fn layer_colormap(config: &LayerConfig) -> Option<Colormap> {
    match config.color_scale.as_ref()?.colormap_source().unwrap()? {
        ColormapSource::Table(colormap) => Some(colormap),
        ColormapSource::Image(_) => None,
    }
}

/// Elevation ramp rising to the right, 24-bit encoded
fn ramp(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, _| {
        let value = x * 40_000;
        Rgba([(value >> 16) as u8, (value >> 8) as u8, value as u8, 255])
    })
}

#[test]
fn test_mid_gray_maps_to_mid_colormap() {
    let ctx = RenderContext::default();
    let image = solid(2, 2, 128);
    let options = ColorScaleOptions {
        cut_point_min: 0.0,
        cut_point_max: 255.0,
        ..ColorScaleOptions::default()
    };

    draw_with_colormap(&ctx, &image, &black_to_white(), &options).unwrap();
    let canvas = ctx.read_canvas();

    assert_eq!(canvas.dimensions(), (2, 2));
    for pixel in canvas.pixels() {
        let [r, g, b, a] = pixel.0;
        assert!((126..=130).contains(&r), "red was {}", r);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert_eq!(a, 255);
    }
}

#[test]
fn test_colormap_layer_is_idempotent() {
    let config = LayerConfig::from_json(
        r##"{
            "colorScale": { "colors": [[0, "#000000"], [1, "#FFFFFF"]], "scaleType": "linear" }
        }"##,
    )
    .unwrap();
    let colormap = layer_colormap(&config);
    let image = RgbaImage::from_fn(8, 4, |x, y| {
        let v = (x * 30 + y * 7) as u8;
        Rgba([v, v, v, 255])
    });

    let ctx = RenderContext::default();
    let first = draw_layer(&ctx, &image, colormap.as_ref(), &config).unwrap();
    let second = draw_layer(&ctx, &image, colormap.as_ref(), &config).unwrap();
    assert_eq!(first.as_raw(), second.as_raw());

    let fresh = draw_layer(&RenderContext::default(), &image, colormap.as_ref(), &config).unwrap();
    assert_eq!(first.as_raw(), fresh.as_raw());
}

#[test]
fn test_cut_points_hide_values_outside_range() {
    let config = LayerConfig::from_json(
        r##"{
            "colorScale": { "colors": ["#000000", "#ffffff"], "cutPointMin": 100 },
            "minvalue": 0,
            "maxvalue": 255
        }"##,
    )
    .unwrap();
    let colormap = layer_colormap(&config);
    let image = RgbaImage::from_fn(2, 1, |x, _| if x == 0 { Rgba([50, 50, 50, 255]) } else { Rgba([200, 200, 200, 255]) });

    let canvas = draw_layer(&RenderContext::default(), &image, colormap.as_ref(), &config).unwrap();
    assert_eq!(canvas.get_pixel(0, 0).0[3], 0);
    assert_eq!(canvas.get_pixel(1, 0).0[3], 255);
}

#[test]
fn test_raw_fallback_without_colormap() {
    let config = LayerConfig::from_json(r#"{ "shader": { "type": "hillshading" } }"#).unwrap();
    let image = RgbaImage::from_fn(3, 2, |x, y| Rgba([x as u8 * 50, y as u8 * 90, 7, 255]));

    let canvas = draw_layer(&RenderContext::default(), &image, None, &config).unwrap();
    assert_eq!(canvas.as_raw(), image.as_raw());
}

#[test]
fn test_unsupported_pipeline_is_an_error() {
    let config = LayerConfig::from_json(r#"{ "shader": { "type": "watercolor" } }"#).unwrap();
    let result = draw_layer(&RenderContext::default(), &solid(2, 2, 10), None, &config);
    assert!(matches!(result, Err(RenderError::UnsupportedPipeline(_))));
}

#[test]
fn test_hillshading_exhausts_small_unit_pool() {
    let ctx = RenderContext::new(DeviceLimits {
        max_texture_image_units: 3,
    });
    let config = LayerConfig::from_json(r#"{ "shader": { "type": "hillshading" } }"#).unwrap();

    let result = draw_layer(&ctx, &ramp(4, 4), Some(&black_to_white()), &config);
    assert!(matches!(
        result,
        Err(RenderError::ResourceExhausted { capacity: 2, .. })
    ));
}

#[test]
fn test_direct_hillshading_draws_every_pixel() {
    let config = LayerConfig::from_json(
        r#"{ "shader": { "type": "hillshading", "pixelScale": 1000 } }"#,
    )
    .unwrap();
    let ctx = RenderContext::default();

    let canvas = draw_layer(&ctx, &ramp(6, 5), Some(&black_to_white()), &config).unwrap();
    assert_eq!(canvas.dimensions(), (6, 5));
    assert!(canvas.pixels().all(|p| p.0[3] == 255));
    assert_eq!(ctx.units_in_use(), 0);
}

#[test]
fn test_seeded_soft_shadows_are_reproducible() {
    let config = LayerConfig::from_json(
        r#"{ "shader": { "type": "soft-hillshading", "shadowIterations": 3, "seed": 42 } }"#,
    )
    .unwrap();
    let image = ramp(5, 5);
    let colormap = black_to_white();

    let first = draw_layer(&RenderContext::default(), &image, Some(&colormap), &config).unwrap();
    let second = draw_layer(&RenderContext::default(), &image, Some(&colormap), &config).unwrap();
    assert_eq!(first.as_raw(), second.as_raw());
}

#[test]
fn test_onepass_masks_black_without_colormap() {
    let config = LayerConfig::from_json(r#"{ "shader": { "type": "onepass" } }"#).unwrap();
    let image = RgbaImage::from_fn(2, 2, |x, _| if x == 0 { Rgba([0, 0, 0, 255]) } else { Rgba([128, 128, 128, 255]) });

    let canvas = draw_layer(&RenderContext::default(), &image, None, &config).unwrap();
    assert_eq!(canvas.get_pixel(0, 0).0[3], 0);
    assert_eq!(canvas.get_pixel(1, 1).0[3], 255);
    assert!(canvas.get_pixel(1, 1).0[0] > 0);
}

#[test]
fn test_terrain_rgb_no_data_is_transparent() {
    let config = LayerConfig::from_json(
        r#"{ "shader": { "type": "terrain-rgb", "applyHillshading": false }, "minvalue": 0, "maxvalue": 1000 }"#,
    )
    .unwrap();
    // 100000 * 0.1 - 10000 = 0 metres
    let sea_level = Rgba([0x01, 0x86, 0xA0, 255]);
    let image = RgbaImage::from_fn(2, 1, |x, _| if x == 0 { Rgba([0, 0, 0, 0]) } else { sea_level });

    let canvas = draw_layer(&RenderContext::default(), &image, None, &config).unwrap();
    assert_eq!(canvas.get_pixel(0, 0).0, [0, 0, 0, 0]);
    assert_eq!(canvas.get_pixel(1, 0).0, [0, 0, 0, 255]);
}

#[test]
fn test_cancelled_context_stops_drawing() {
    let ctx = RenderContext::default();
    ctx.cancellation().cancel();
    let result = draw_with_colormap(&ctx, &solid(2, 2, 1), &black_to_white(), &ColorScaleOptions::default());
    assert!(matches!(result, Err(RenderError::Cancelled)));
}

proptest! {
    #[test]
    fn prop_units_are_never_reused_within_capacity(ops in prop::collection::vec((any::<bool>(), any::<bool>()), 1..=15)) {
        let ctx = RenderContext::default();
        let image = solid(1, 1, 0);
        let mut seen = Vec::new();
        let mut alive = Vec::new();

        for (use_framebuffer, keep) in ops {
            let texture = if use_framebuffer {
                ctx.framebuffer(1, 1).unwrap().texture().clone()
            } else {
                ctx.texture(&image).unwrap()
            };
            prop_assert!(!seen.contains(&texture.unit()));
            prop_assert!(texture.unit() >= 1);
            seen.push(texture.unit());
            if keep {
                alive.push(texture);
            }
        }
    }

    #[test]
    fn prop_ping_pong_swap_is_an_involution(swaps in 0usize..16) {
        let ctx = RenderContext::default();
        let mut pair = ctx.ping_pong(2, 2).unwrap();
        for _ in 0..swaps {
            pair.swap();
        }
        let (ping, pong) = (pair.ping().texture().id(), pair.pong().texture().id());
        prop_assert_ne!(ping, pong);

        pair.swap();
        pair.swap();
        prop_assert_eq!(pair.ping().texture().id(), ping);
        prop_assert_eq!(pair.pong().texture().id(), pong);
    }
}
