use glam::{Vec2, Vec3};
use image::RgbaImage;
use terrashade_core::{Colormap, DrawOptions, Result, ScaleType, DEFAULT_COLORMAP_WIDTH};
use tracing::debug;

use super::{default_sun_direction, prepare_canvas, quad, resolution};
use crate::context::RenderContext;
use crate::programs::OnePassProgram;

/// Options of the one-pass hillshading pipeline.
///
/// Cut and remap points are normalized values in 0..1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnePassOptions {
    /// Turn pure black pixels transparent
    pub black_to_alpha: bool,
    /// Colour through the colormap; otherwise the input colour is kept
    pub apply_color_scale: bool,
    /// Linear or logarithmic lookup
    pub scale_type: ScaleType,
    /// Colormap sub-range values are remapped onto
    pub remap: Vec2,
    /// Values outside are transparent
    pub cut: Vec2,
    /// Light the surface
    pub apply_hillshading: bool,
    /// Horizontal size of a pixel in elevation units
    pub pixel_scale: f32,
    /// Multiplier applied to decoded elevations
    pub elevation_scale: f32,
    /// Direction the light comes from
    pub sun_direction: Vec3,
    /// Brightness added to every pixel
    pub ambient_light_intensity: f32,
    /// Brightness of surfaces facing the light
    pub diffuse_light_intensity: f32,
}

impl Default for OnePassOptions {
    fn default() -> Self {
        Self {
            black_to_alpha: true,
            apply_color_scale: true,
            scale_type: ScaleType::Linear,
            remap: Vec2::new(0.0, 1.0),
            cut: Vec2::new(0.0, 1.0),
            apply_hillshading: true,
            pixel_scale: 1.0,
            elevation_scale: 1.0,
            sun_direction: default_sun_direction(),
            ambient_light_intensity: 0.4,
            diffuse_light_intensity: 1.0,
        }
    }
}

impl From<&DrawOptions> for OnePassOptions {
    fn from(options: &DrawOptions) -> Self {
        let d = Self::default();
        Self {
            black_to_alpha: options.set_black_to_alpha.unwrap_or(d.black_to_alpha),
            apply_color_scale: options.apply_color_scale.unwrap_or(d.apply_color_scale),
            scale_type: options.scale_type.unwrap_or(d.scale_type),
            remap: Vec2::new(
                options.remap_point_min.unwrap_or(d.remap.x),
                options.remap_point_max.unwrap_or(d.remap.y),
            ),
            cut: Vec2::new(
                options.cut_point_min.unwrap_or(d.cut.x),
                options.cut_point_max.unwrap_or(d.cut.y),
            ),
            apply_hillshading: options.apply_hillshading.unwrap_or(d.apply_hillshading),
            pixel_scale: options.pixel_scale.unwrap_or(d.pixel_scale),
            elevation_scale: options.elevation_scale.unwrap_or(d.elevation_scale),
            sun_direction: options.sun_direction.unwrap_or(d.sun_direction),
            ambient_light_intensity: options
                .ambient_light_intensity
                .unwrap_or(d.ambient_light_intensity),
            diffuse_light_intensity: options
                .diffuse_light_intensity
                .unwrap_or(d.diffuse_light_intensity),
        }
    }
}

/// Colormap and direct lighting in a single pass.
///
/// Without a colormap a grayscale ramp is used.
pub fn draw_with_onepass_hillshading(
    ctx: &RenderContext,
    image: &RgbaImage,
    colormap: Option<&Colormap>,
    options: &OnePassOptions,
) -> Result<()> {
    let size = prepare_canvas(ctx, image)?;
    debug!("One-pass hillshading {}x{}", size.0, size.1);

    let data = ctx.texture(image)?;
    let colormap_texture = match colormap {
        Some(colormap) => ctx.colormap_texture(colormap)?,
        None => ctx.colormap_texture(&Colormap::grayscale(DEFAULT_COLORMAP_WIDTH))?,
    };

    quad(ctx, OnePassProgram, size, None)
        .texture("u_data_texture", &data)
        .texture("u_colormap", &colormap_texture)
        .uniform("u_resolution", resolution(size))
        .uniform("u_black_to_alpha", options.black_to_alpha)
        .uniform("u_apply_color_scale", options.apply_color_scale)
        .uniform("u_apply_hillshading", options.apply_hillshading)
        .uniform("u_interpolation_type", options.scale_type.as_uniform())
        .uniform("u_remap_colormap", options.remap)
        .uniform("u_clamp_colormap", options.cut)
        .uniform("u_elevation_scale", options.elevation_scale)
        .uniform("u_pixel_scale", options.pixel_scale)
        .uniform("u_sun_direction", options.sun_direction)
        .uniform("u_ambient_light_intensity", options.ambient_light_intensity)
        .uniform("u_diffuse_light_intensity", options.diffuse_light_intensity)
        .compile()?
        .draw(ctx)
}
