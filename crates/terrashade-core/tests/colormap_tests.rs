use proptest::prelude::*;
use terrashade_core::{
    interpolate_colors, ColorScaleConfig, Colormap, ColormapOptions, ColormapSource, LayerConfig,
};

fn rgba() -> impl Strategy<Value = [u8; 4]> {
    prop::array::uniform4(any::<u8>())
}

proptest! {
    #[test]
    fn interpolated_length_matches_steps(
        colors in prop::collection::vec(rgba(), 2..12),
        steps in 1usize..1024,
    ) {
        prop_assert_eq!(interpolate_colors(&colors, steps).len(), steps);
    }

    #[test]
    fn interpolation_keeps_endpoints(
        colors in prop::collection::vec(rgba(), 2..8),
        steps in 64usize..512,
    ) {
        let table = interpolate_colors(&colors, steps);
        prop_assert_eq!(table[0], colors[0]);
        prop_assert_eq!(table[steps - 1], colors[colors.len() - 1]);
    }

    #[test]
    fn colormap_width_is_respected(width in 1usize..2048) {
        let options = ColormapOptions { width, ..ColormapOptions::default() };
        let colormap = Colormap::from_hex_colors(&["#102030", "#a0b0c0", "#ffffff"], &options).unwrap();
        prop_assert_eq!(colormap.len(), width);
        prop_assert_eq!(colormap.to_image().dimensions(), (width as u32, 1));
    }
}

#[test]
fn test_building_twice_gives_identical_tables() {
    let config = LayerConfig::from_json(
        r##"{ "colorScale": { "colors": ["#000000", "#ff8800", "#ffffff"], "width": 100 } }"##,
    )
    .unwrap();
    let scale = config.color_scale.as_ref().unwrap();

    let first = scale.colormap_source().unwrap();
    let second = scale.colormap_source().unwrap();
    assert_eq!(first, second);
    match first {
        Some(ColormapSource::Table(colormap)) => assert_eq!(colormap.len(), 100),
        other => panic!("expected a table, got {:?}", other),
    }
}

#[test]
fn test_object_without_colors_has_no_colormap() {
    let scale: ColorScaleConfig = serde_json::from_str(r#"{ "scaleType": "log" }"#).unwrap();
    assert_eq!(scale.colormap_source().unwrap(), None);
    assert!(scale.params().is_some());
}
