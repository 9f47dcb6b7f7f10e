//! Render context
//!
//! All state a draw touches lives here and is passed explicitly to every
//! operation: the device limits, the texture unit pool, the canvas (the
//! default framebuffer) and the cancellation token of the current request.

use image::RgbaImage;
use parking_lot::{RwLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use terrashade_core::{CancellationToken, Colormap, RenderError, Result};
use tracing::debug;

use crate::framebuffer::{FrameBuffer, PingPong};
use crate::pipeline::ShaderCommandBuilder;
use crate::texture::{TexelBuffer, Texture, TextureUnitPool};

/// Limits of the rendering device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceLimits {
    /// Number of texture image units, one of which is reserved
    pub max_texture_image_units: usize,
}

impl Default for DeviceLimits {
    fn default() -> Self {
        Self {
            max_texture_image_units: 16,
        }
    }
}

impl DeviceLimits {
    /// Units available to textures and framebuffers
    pub fn usable_texture_units(&self) -> usize {
        self.max_texture_image_units.saturating_sub(1)
    }
}

/// Explicit rendering state shared by the passes of one draw request
#[derive(Debug)]
pub struct RenderContext {
    limits: DeviceLimits,
    units: TextureUnitPool,
    canvas: RwLock<TexelBuffer>,
    cancel: CancellationToken,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(DeviceLimits::default())
    }
}

impl RenderContext {
    /// Create a context with a 1x1 canvas
    pub fn new(limits: DeviceLimits) -> Self {
        Self::with_cancellation(limits, CancellationToken::new())
    }

    /// Create a context whose draws stop once `cancel` fires
    pub fn with_cancellation(limits: DeviceLimits, cancel: CancellationToken) -> Self {
        debug!(
            "Creating render context with {} usable texture units",
            limits.usable_texture_units()
        );
        Self {
            limits,
            units: TextureUnitPool::new(limits.usable_texture_units()),
            canvas: RwLock::new(TexelBuffer::new(1, 1)),
            cancel,
        }
    }

    /// Device limits
    pub fn limits(&self) -> DeviceLimits {
        self.limits
    }

    /// Number of leased texture units
    pub fn units_in_use(&self) -> usize {
        self.units.in_use()
    }

    /// Token of the current request
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Fail with `Cancelled` once the request has been abandoned
    pub fn check_cancelled(&self) -> Result<()> {
        self.cancel.check()
    }

    /// Upload an image into a new texture
    pub fn texture(&self, image: &RgbaImage) -> Result<Texture> {
        Texture::from_image(&self.units, image)
    }

    /// Upload a colormap as an N x 1 texture
    pub fn colormap_texture(&self, colormap: &Colormap) -> Result<Texture> {
        Texture::from_colormap(&self.units, colormap)
    }

    /// Create an off-screen render target
    pub fn framebuffer(&self, width: u32, height: u32) -> Result<FrameBuffer> {
        FrameBuffer::new(&self.units, width, height)
    }

    /// Create a pair of alternating render targets
    pub fn ping_pong(&self, width: u32, height: u32) -> Result<PingPong> {
        PingPong::new(&self.units, width, height)
    }

    /// Start a new draw command
    pub fn command(&self) -> ShaderCommandBuilder {
        ShaderCommandBuilder::new()
    }

    /// Resize the canvas, discarding its contents
    pub fn resize_canvas(&self, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidImage(format!(
                "canvas size {}x{} is empty",
                width, height
            )));
        }
        *self.canvas.write() = TexelBuffer::new(width, height);
        Ok(())
    }

    /// Canvas size in pixels
    pub fn canvas_size(&self) -> (u32, u32) {
        let canvas = self.canvas.read();
        (canvas.width(), canvas.height())
    }

    /// Read the canvas back as a top-down RGBA8 image
    pub fn read_canvas(&self) -> RgbaImage {
        self.canvas.read().to_rgba_image()
    }

    pub(crate) fn canvas_mut(&self) -> RwLockWriteGuard<'_, TexelBuffer> {
        self.canvas.write()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usable_units_reserve_one() {
        let limits = DeviceLimits {
            max_texture_image_units: 8,
        };
        assert_eq!(limits.usable_texture_units(), 7);
        assert_eq!(DeviceLimits::default().usable_texture_units(), 15);
    }

    #[test]
    fn test_resize_canvas() {
        let ctx = RenderContext::default();
        ctx.resize_canvas(3, 2).unwrap();
        assert_eq!(ctx.canvas_size(), (3, 2));
        assert_eq!(ctx.read_canvas().dimensions(), (3, 2));
        assert!(ctx.resize_canvas(0, 2).is_err());
    }

    #[test]
    fn test_units_are_tracked() {
        let ctx = RenderContext::default();
        let image = RgbaImage::new(2, 2);
        let texture = ctx.texture(&image).unwrap();
        let pair = ctx.ping_pong(2, 2).unwrap();
        assert_eq!(ctx.units_in_use(), 3);
        drop(texture);
        drop(pair);
        assert_eq!(ctx.units_in_use(), 0);
    }

    #[test]
    fn test_cancelled_context() {
        let token = CancellationToken::new();
        let ctx = RenderContext::with_cancellation(DeviceLimits::default(), token.clone());
        assert!(ctx.check_cancelled().is_ok());
        token.cancel();
        assert!(matches!(ctx.check_cancelled(), Err(RenderError::Cancelled)));
    }
}
