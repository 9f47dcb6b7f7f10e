use image::RgbaImage;
use terrashade_core::{DrawOptions, Result};
use tracing::debug;

use super::{prepare_canvas, quad};
use crate::context::RenderContext;
use crate::programs::RawImageProgram;

/// Options of the raw image pass
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RawImageOptions {
    /// Turn pure black pixels transparent
    pub black_to_alpha: bool,
}

impl From<&DrawOptions> for RawImageOptions {
    fn from(options: &DrawOptions) -> Self {
        Self {
            black_to_alpha: options.set_black_to_alpha.unwrap_or(false),
        }
    }
}

/// Draw the image as is
pub fn draw_raw_image(ctx: &RenderContext, image: &RgbaImage, options: &RawImageOptions) -> Result<()> {
    let size = prepare_canvas(ctx, image)?;
    debug!("Drawing raw image {}x{}", size.0, size.1);

    let texture = ctx.texture(image)?;
    quad(ctx, RawImageProgram, size, None)
        .texture("u_image", &texture)
        .uniform("u_black_to_alpha", options.black_to_alpha)
        .compile()?
        .draw(ctx)
}
