//! Off-screen render targets

use crate::texture::{TexelBuffer, Texture, TextureUnitPool};
use terrashade_core::Result;

/// A float render target backed by its own texture and unit
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    texture: Texture,
}

impl FrameBuffer {
    pub(crate) fn new(pool: &TextureUnitPool, width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            texture: Texture::new(pool, TexelBuffer::new(width, height))?,
        })
    }

    /// The texture rendered into
    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.texture.width()
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.texture.height()
    }

    /// Whether both handles refer to the same target
    pub fn same_target(&self, other: &FrameBuffer) -> bool {
        self.texture.id() == other.texture.id()
    }
}

impl AsRef<Texture> for FrameBuffer {
    fn as_ref(&self) -> &Texture {
        &self.texture
    }
}

/// Two framebuffers alternating between the read and the write role
#[derive(Debug, Clone)]
pub struct PingPong {
    buffers: [FrameBuffer; 2],
    current: usize,
}

impl PingPong {
    pub(crate) fn new(pool: &TextureUnitPool, width: u32, height: u32) -> Result<Self> {
        Ok(Self {
            buffers: [
                FrameBuffer::new(pool, width, height)?,
                FrameBuffer::new(pool, width, height)?,
            ],
            current: 0,
        })
    }

    /// The target to read from
    pub fn ping(&self) -> &FrameBuffer {
        &self.buffers[self.current]
    }

    /// The target to write to
    pub fn pong(&self) -> &FrameBuffer {
        &self.buffers[1 - self.current]
    }

    /// Exchange the read and write roles
    pub fn swap(&mut self) {
        self.current = 1 - self.current;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping_pong_never_aliases() {
        let pool = TextureUnitPool::new(4);
        let mut pair = PingPong::new(&pool, 4, 4).unwrap();
        for _ in 0..5 {
            assert!(!pair.ping().same_target(pair.pong()));
            assert_ne!(pair.ping().texture().unit(), pair.pong().texture().unit());
            pair.swap();
        }
    }

    #[test]
    fn test_swap_exchanges_roles() {
        let pool = TextureUnitPool::new(4);
        let mut pair = PingPong::new(&pool, 2, 2).unwrap();
        let ping = pair.ping().texture().id();
        let pong = pair.pong().texture().id();
        pair.swap();
        assert_eq!(pair.ping().texture().id(), pong);
        assert_eq!(pair.pong().texture().id(), ping);
    }
}
