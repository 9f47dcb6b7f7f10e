//! Draw command library
//!
//! Fixed pipelines that turn an image, an optional colormap and a set of
//! options into a rendered canvas. Every command resizes the canvas of the
//! context to the image and leaves its result there.

mod colormap;
mod hillshading;
mod onepass;
mod raw;
mod terrain_rgb;

pub use colormap::{draw_with_colormap, ColorScaleOptions};
pub use hillshading::{
    calc_iterations, draw_with_advanced_hillshading, HillshadingOptions, AMBIENT_PIXEL_SCALE,
};
pub use onepass::{draw_with_onepass_hillshading, OnePassOptions};
pub use raw::{draw_raw_image, RawImageOptions};
pub use terrain_rgb::{draw_with_terrain_rgb, TerrainRgbOptions};

use glam::{Vec2, Vec3};
use image::RgbaImage;
use terrashade_core::Result;

use crate::context::RenderContext;
use crate::framebuffer::FrameBuffer;
use crate::pipeline::{
    FragmentProgram, ShaderCommandBuilder, VertexStage, FULLSCREEN_QUAD, POSITION_ATTRIBUTE,
};

/// `normalize(1, 1, 1)`
pub fn default_sun_direction() -> Vec3 {
    Vec3::ONE.normalize()
}

/// A full-screen quad command for `program`, drawing into `target` or the canvas
fn quad(
    ctx: &RenderContext,
    program: impl FragmentProgram,
    size: (u32, u32),
    target: Option<&FrameBuffer>,
) -> ShaderCommandBuilder {
    let builder = ctx
        .command()
        .vertex(VertexStage::Position)
        .fragment(program)
        .attribute(POSITION_ATTRIBUTE, FULLSCREEN_QUAD)
        .viewport(0, 0, size.0, size.1)
        .vertex_count(6);
    match target {
        Some(fb) => builder.framebuffer(fb),
        None => builder,
    }
}

fn resolution((width, height): (u32, u32)) -> Vec2 {
    Vec2::new(width as f32, height as f32)
}

/// Resize the canvas to the image and return its size
fn prepare_canvas(ctx: &RenderContext, image: &RgbaImage) -> Result<(u32, u32)> {
    let size = image.dimensions();
    ctx.resize_canvas(size.0, size.1)?;
    Ok(size)
}
