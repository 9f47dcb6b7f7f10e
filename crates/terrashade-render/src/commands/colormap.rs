use image::RgbaImage;
use terrashade_core::{Colormap, DrawOptions, Result, ScaleType};
use tracing::debug;

use super::{prepare_canvas, quad};
use crate::context::RenderContext;
use crate::programs::ColormapProgram;

/// How values are mapped through the colormap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorScaleOptions {
    /// Linear or logarithmic lookup
    pub scale_type: ScaleType,
    /// Values below this byte value are transparent
    pub cut_point_min: f32,
    /// Values above this byte value are transparent
    pub cut_point_max: f32,
    /// Turn pure black pixels transparent
    pub black_to_alpha: bool,
}

impl Default for ColorScaleOptions {
    fn default() -> Self {
        Self {
            scale_type: ScaleType::Linear,
            cut_point_min: 0.0,
            cut_point_max: 255.0,
            black_to_alpha: false,
        }
    }
}

impl From<&DrawOptions> for ColorScaleOptions {
    /// Cut points are expected in byte units already
    fn from(options: &DrawOptions) -> Self {
        let defaults = Self::default();
        Self {
            scale_type: options.scale_type.unwrap_or(defaults.scale_type),
            cut_point_min: options.cut_point_min.unwrap_or(defaults.cut_point_min),
            cut_point_max: options.cut_point_max.unwrap_or(defaults.cut_point_max),
            black_to_alpha: options.set_black_to_alpha.unwrap_or(defaults.black_to_alpha),
        }
    }
}

/// Map the red channel of the image through the colormap
pub fn draw_with_colormap(
    ctx: &RenderContext,
    image: &RgbaImage,
    colormap: &Colormap,
    options: &ColorScaleOptions,
) -> Result<()> {
    let size = prepare_canvas(ctx, image)?;
    debug!(
        "Drawing {}x{} with a {}-entry colormap ({:?})",
        size.0,
        size.1,
        colormap.len(),
        options.scale_type
    );

    let texture = ctx.texture(image)?;
    let colormap_texture = ctx.colormap_texture(colormap)?;
    quad(ctx, ColormapProgram, size, None)
        .texture("u_raw_image", &texture)
        .texture("u_colormap", &colormap_texture)
        .uniform("u_colormap_length", colormap.len() as f32)
        .uniform("u_scale_type", options.scale_type.as_uniform())
        .uniform("u_min_color_value", options.cut_point_min)
        .uniform("u_max_color_value", options.cut_point_max)
        .uniform("u_black_to_alpha", options.black_to_alpha)
        .compile()?
        .draw(ctx)
}
