//! Multi-pass hillshading.
//!
//! elevation -> normals -> lighting -> colormap. Lighting is either direct
//! (one pass) or a Monte Carlo estimate of soft shadows and ambient light,
//! each accumulated over `N` passes on its own ping-pong pair and blended.

use glam::{Vec2, Vec3};
use image::RgbaImage;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use terrashade_core::{Colormap, DrawOptions, Result};
use tracing::{debug, info};

use super::{default_sun_direction, prepare_canvas, quad, resolution, ColorScaleOptions};
use crate::context::RenderContext;
use crate::framebuffer::FrameBuffer;
use crate::pipeline::DrawProps;
use crate::programs::{
    AmbientProgram, CombinedProgram, DirectLightingProgram, ElevationProgram, NormalsProgram,
    ShadedColormapProgram, SoftShadowProgram,
};

/// Default horizontal pixel size in elevation units
pub const DEFAULT_PIXEL_SCALE: f32 = 8000.0;

/// Pixel scale used by the ambient occlusion passes
pub const AMBIENT_PIXEL_SCALE: f32 = 152.702_99;

const SUN_DISTANCE: f32 = 1.496e11;
const SUN_RADIUS: f32 = 6.955e10;

/// Options of the multi-pass hillshading pipeline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HillshadingOptions {
    /// Multiplier applied to decoded elevations
    pub elevation_scale: f32,
    /// Horizontal size of a pixel in elevation units
    pub pixel_scale: f32,
    /// Direction the light comes from
    pub sun_direction: Vec3,
    /// Soft shadows and ambient light instead of direct lighting
    pub shadows: bool,
    /// Iterations of the soft lighting passes, chosen from the image size when unset
    pub shadow_iterations: Option<u32>,
    /// Render the lighting only
    pub no_color: bool,
    /// Seed of the random directions
    pub seed: Option<u64>,
    /// Colormap lookup of the final pass
    pub color: ColorScaleOptions,
}

impl Default for HillshadingOptions {
    fn default() -> Self {
        Self {
            elevation_scale: 1.0,
            pixel_scale: DEFAULT_PIXEL_SCALE,
            sun_direction: default_sun_direction(),
            shadows: false,
            shadow_iterations: None,
            no_color: false,
            seed: None,
            color: ColorScaleOptions::default(),
        }
    }
}

impl From<&DrawOptions> for HillshadingOptions {
    fn from(options: &DrawOptions) -> Self {
        let defaults = Self::default();
        Self {
            elevation_scale: options.elevation_scale.unwrap_or(defaults.elevation_scale),
            pixel_scale: options.pixel_scale.unwrap_or(defaults.pixel_scale),
            sun_direction: options.sun_direction.unwrap_or(defaults.sun_direction),
            shadows: options.shadows.unwrap_or(defaults.shadows),
            shadow_iterations: options.shadow_iterations.filter(|n| *n > 0),
            no_color: options.no_color.unwrap_or(defaults.no_color),
            seed: options.seed,
            color: ColorScaleOptions::from(options),
        }
    }
}

/// Number of soft lighting iterations for an image size.
///
/// Bigger images get fewer iterations to bound the render time.
pub fn calc_iterations(width: u32, height: u32) -> u32 {
    let pixels = width as u64 * height as u64;
    match pixels {
        0..=90_000 => 128,
        90_001..=360_000 => 84,
        360_001..=490_000 => 48,
        490_001..=810_000 => 18,
        810_001..=2_293_759 => 8,
        _ => 1,
    }
}

fn random_unit_vector(rng: &mut impl Rng) -> Vec3 {
    loop {
        let v = Vec3::new(
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
        );
        let length_squared = v.length_squared();
        if length_squared > 1e-6 && length_squared <= 1.0 {
            return v / length_squared.sqrt();
        }
    }
}

/// Sun direction seen from a random point of the sun's disc
fn jitter_sun(rng: &mut impl Rng, sun: Vec3) -> Vec3 {
    (sun.normalize_or_zero() * SUN_DISTANCE + random_unit_vector(rng) * SUN_RADIUS).normalize_or_zero()
}

/// A random direction of random length
fn random_direction(rng: &mut impl Rng) -> Vec3 {
    Vec3::new(
        rng.random::<f32>() * 2.0 - 1.0,
        rng.random::<f32>() * 2.0 - 1.0,
        rng.random::<f32>() * 2.0 - 1.0,
    )
}

/// Hillshade the elevation image and colour it through the colormap
pub fn draw_with_advanced_hillshading(
    ctx: &RenderContext,
    image: &RgbaImage,
    colormap: &Colormap,
    options: &HillshadingOptions,
) -> Result<()> {
    let size = prepare_canvas(ctx, image)?;
    let res = resolution(size);

    let source = ctx.texture(image)?;
    let elevation = ctx.framebuffer(size.0, size.1)?;
    quad(ctx, ElevationProgram, size, Some(&elevation))
        .texture("tElevation", &source)
        .uniform("elevationScale", options.elevation_scale)
        .uniform("resolution", res)
        .compile()?
        .draw(ctx)?;

    let normals = ctx.framebuffer(size.0, size.1)?;
    quad(ctx, NormalsProgram, size, Some(&normals))
        .texture("tElevation", &elevation)
        .uniform("pixelScale", options.pixel_scale)
        .uniform("resolution", res)
        .compile()?
        .draw(ctx)?;

    let lighting = if options.no_color {
        None
    } else {
        Some(ctx.framebuffer(size.0, size.1)?)
    };

    if options.shadows {
        draw_soft_lighting(ctx, size, &elevation, &normals, lighting.as_ref(), options)?;
    } else {
        debug!("Direct lighting from {:?}", options.sun_direction);
        quad(ctx, DirectLightingProgram, size, lighting.as_ref())
            .texture("tNormal", &normals)
            .uniform("sunDirection", options.sun_direction)
            .uniform("resolution", res)
            .compile()?
            .draw(ctx)?;
    }

    let Some(lighting) = lighting else {
        return Ok(());
    };

    let colormap_texture = ctx.colormap_texture(colormap)?;
    let color = &options.color;
    quad(ctx, ShadedColormapProgram, size, None)
        .texture("u_image", &lighting)
        .texture("u_raw_image", &source)
        .texture("u_colormap", &colormap_texture)
        .uniform("u_colormap_length", colormap.len() as f32)
        .uniform("u_scale_type", color.scale_type.as_uniform())
        .uniform("u_min_color_value", color.cut_point_min)
        .uniform("u_max_color_value", color.cut_point_max)
        .uniform("u_black_to_alpha", color.black_to_alpha)
        .uniform("u_resolution", res)
        .compile()?
        .draw(ctx)
}

fn draw_soft_lighting(
    ctx: &RenderContext,
    size: (u32, u32),
    elevation: &FrameBuffer,
    normals: &FrameBuffer,
    target: Option<&FrameBuffer>,
    options: &HillshadingOptions,
) -> Result<()> {
    let res: Vec2 = resolution(size);
    let iterations = options
        .shadow_iterations
        .unwrap_or_else(|| calc_iterations(size.0, size.1));
    info!(
        "Soft lighting {}x{} with {} iterations",
        size.0, size.1, iterations
    );

    let mut rng = match options.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut shadows = ctx.ping_pong(size.0, size.1)?;
    let soft_shadow = quad(ctx, SoftShadowProgram, size, None)
        .texture("tElevation", elevation)
        .texture("tNormal", normals)
        .texture_var("tSrc")
        .uniform_var("sunDirection")
        .uniform("pixelScale", options.pixel_scale)
        .uniform("resolution", res)
        .uniform("n", iterations as f32)
        .framebuffer_var("dest")
        .compile()?;
    for _ in 0..iterations {
        let props = DrawProps::new()
            .texture("tSrc", shadows.ping())
            .uniform("sunDirection", jitter_sun(&mut rng, options.sun_direction))
            .framebuffer("dest", shadows.pong());
        soft_shadow.draw_with(ctx, &props)?;
        shadows.swap();
    }

    let mut ambient = ctx.ping_pong(size.0, size.1)?;
    let ambient_light = quad(ctx, AmbientProgram, size, None)
        .texture("tElevation", elevation)
        .texture("tNormal", normals)
        .texture_var("tSrc")
        .uniform_var("direction")
        .uniform("pixelScale", AMBIENT_PIXEL_SCALE)
        .uniform("resolution", res)
        .uniform("n", iterations as f32)
        .framebuffer_var("dest")
        .compile()?;
    for _ in 0..iterations {
        let props = DrawProps::new()
            .texture("tSrc", ambient.ping())
            .uniform("direction", random_direction(&mut rng))
            .framebuffer("dest", ambient.pong());
        ambient_light.draw_with(ctx, &props)?;
        ambient.swap();
    }

    quad(ctx, CombinedProgram, size, target)
        .texture("tSoftShadow", shadows.ping())
        .texture("tAmbient", ambient.ping())
        .uniform("resolution", res)
        .compile()?
        .draw(ctx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_table() {
        assert_eq!(calc_iterations(300, 300), 128);
        assert_eq!(calc_iterations(301, 300), 84);
        assert_eq!(calc_iterations(600, 600), 84);
        assert_eq!(calc_iterations(700, 700), 48);
        assert_eq!(calc_iterations(900, 900), 18);
        assert_eq!(calc_iterations(1000, 1000), 8);
        assert_eq!(calc_iterations(1792, 1280), 1);
    }

    #[test]
    fn test_jittered_sun_stays_close() {
        let mut rng = StdRng::seed_from_u64(7);
        let sun = default_sun_direction();
        for _ in 0..100 {
            let jittered = jitter_sun(&mut rng, sun);
            assert!((jittered.length() - 1.0).abs() < 1e-4);
            // The sun's disc spans well under 30 degrees here
            assert!(jittered.dot(sun) > 0.85);
        }
    }

    #[test]
    fn test_options_from_layer_options() {
        let options = DrawOptions {
            shadows: Some(true),
            shadow_iterations: Some(0),
            pixel_scale: Some(30.0),
            ..DrawOptions::default()
        };
        let hillshading = HillshadingOptions::from(&options);
        assert!(hillshading.shadows);
        assert_eq!(hillshading.shadow_iterations, None);
        assert_eq!(hillshading.pixel_scale, 30.0);
        assert_eq!(hillshading.elevation_scale, 1.0);
    }
}
