//! Pipeline dispatch
//!
//! Picks the draw command for a layer from its `shader.type` and whether a
//! colormap is available, flattens the layer options for it and reads the
//! rendered canvas back.

use std::fmt;

use image::RgbaImage;
use terrashade_core::{Colormap, LayerConfig, RenderError, Result};
use tracing::{debug, warn};

use crate::commands::{
    draw_raw_image, draw_with_advanced_hillshading, draw_with_colormap,
    draw_with_onepass_hillshading, draw_with_terrain_rgb, ColorScaleOptions, HillshadingOptions,
    OnePassOptions, RawImageOptions, TerrainRgbOptions,
};
use crate::context::RenderContext;

/// A draw pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    /// Image drawn as is
    Raw,
    /// Red channel through a colormap
    Colormap,
    /// Multi-pass hillshading through a colormap
    Hillshading {
        /// Soft shadows regardless of the `shadows` option
        force_shadows: bool,
    },
    /// Colormap and direct lighting in one pass
    OnePass,
    /// Mapbox terrain-RGB decoding
    TerrainRgb,
}

impl Pipeline {
    /// Select the pipeline for a `shader.type` value.
    ///
    /// The colormap pipelines fall back to [`Pipeline::Raw`] when there is no
    /// colormap. Unknown names are rejected.
    pub fn select(kind: Option<&str>, has_colormap: bool) -> Result<Pipeline> {
        let pipeline = match (kind, has_colormap) {
            (Some("onepass"), _) => Pipeline::OnePass,
            (Some("terrainrgb" | "terrain-rgb"), _) => Pipeline::TerrainRgb,
            (None | Some("raw"), false) => Pipeline::Raw,
            (Some("raw"), true) => Pipeline::Raw,
            (Some("colormap" | "hillshading" | "soft-hillshading"), false) => Pipeline::Raw,
            (None | Some("colormap"), true) => Pipeline::Colormap,
            (Some("hillshading"), true) => Pipeline::Hillshading {
                force_shadows: false,
            },
            (Some("soft-hillshading"), true) => Pipeline::Hillshading {
                force_shadows: true,
            },
            (Some(other), _) => {
                warn!("Unsupported pipeline {:?}", other);
                return Err(RenderError::UnsupportedPipeline(other.to_string()));
            }
        };
        Ok(pipeline)
    }

    /// Name used in logs
    pub fn name(self) -> &'static str {
        match self {
            Pipeline::Raw => "raw",
            Pipeline::Colormap => "colormap",
            Pipeline::Hillshading {
                force_shadows: false,
            } => "hillshading",
            Pipeline::Hillshading {
                force_shadows: true,
            } => "soft-hillshading",
            Pipeline::OnePass => "onepass",
            Pipeline::TerrainRgb => "terrain-rgb",
        }
    }

    /// Whether cut points are read as byte values rather than normalized
    pub fn scales_cut_points(self) -> bool {
        matches!(
            self,
            Pipeline::Raw | Pipeline::Colormap | Pipeline::Hillshading { .. }
        )
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Render `image` as configured by `config` and read the canvas back
pub fn draw_layer(
    ctx: &RenderContext,
    image: &RgbaImage,
    colormap: Option<&Colormap>,
    config: &LayerConfig,
) -> Result<RgbaImage> {
    config.validate()?;
    let pipeline = Pipeline::select(config.pipeline_name(), colormap.is_some())?;

    let mut options = config.draw_options();
    if pipeline.scales_cut_points() {
        let cut = config.cut_off_points().to_byte_range();
        options.cut_point_min = Some(cut.min);
        options.cut_point_max = Some(cut.max);
    }
    debug!(
        "Drawing {}x{} layer with the {} pipeline",
        image.width(),
        image.height(),
        pipeline
    );

    match (pipeline, colormap) {
        (Pipeline::OnePass, colormap) => {
            draw_with_onepass_hillshading(ctx, image, colormap, &OnePassOptions::from(&options))?
        }
        (Pipeline::TerrainRgb, colormap) => {
            draw_with_terrain_rgb(ctx, image, colormap, &TerrainRgbOptions::from(&options))?
        }
        (Pipeline::Colormap, Some(colormap)) => {
            draw_with_colormap(ctx, image, colormap, &ColorScaleOptions::from(&options))?
        }
        (Pipeline::Hillshading { force_shadows }, Some(colormap)) => {
            let mut hillshading = HillshadingOptions::from(&options);
            hillshading.shadows |= force_shadows;
            draw_with_advanced_hillshading(ctx, image, colormap, &hillshading)?
        }
        _ => draw_raw_image(ctx, image, &RawImageOptions::from(&options))?,
    }

    Ok(ctx.read_canvas())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_with_colormap() {
        assert_eq!(Pipeline::select(None, true).unwrap(), Pipeline::Colormap);
        assert_eq!(
            Pipeline::select(Some("hillshading"), true).unwrap(),
            Pipeline::Hillshading {
                force_shadows: false
            }
        );
        assert_eq!(
            Pipeline::select(Some("soft-hillshading"), true).unwrap(),
            Pipeline::Hillshading {
                force_shadows: true
            }
        );
        assert_eq!(Pipeline::select(Some("raw"), true).unwrap(), Pipeline::Raw);
    }

    #[test]
    fn test_select_without_colormap() {
        assert_eq!(Pipeline::select(None, false).unwrap(), Pipeline::Raw);
        assert_eq!(Pipeline::select(Some("hillshading"), false).unwrap(), Pipeline::Raw);
        assert_eq!(Pipeline::select(Some("onepass"), false).unwrap(), Pipeline::OnePass);
        assert_eq!(
            Pipeline::select(Some("terrain-rgb"), false).unwrap(),
            Pipeline::TerrainRgb
        );
        assert_eq!(
            Pipeline::select(Some("terrainrgb"), true).unwrap(),
            Pipeline::TerrainRgb
        );
    }

    #[test]
    fn test_select_unknown() {
        assert!(matches!(
            Pipeline::select(Some("watercolor"), true),
            Err(RenderError::UnsupportedPipeline(name)) if name == "watercolor"
        ));
    }

    #[test]
    fn test_cut_point_units() {
        assert!(Pipeline::Colormap.scales_cut_points());
        assert!(!Pipeline::OnePass.scales_cut_points());
        assert!(!Pipeline::TerrainRgb.scales_cut_points());
        assert_eq!(Pipeline::OnePass.to_string(), "onepass");
    }
}
