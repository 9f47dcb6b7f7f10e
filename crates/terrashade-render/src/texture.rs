//! Textures, texel storage and the texture unit pool

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use glam::{Vec2, Vec4};
use image::{Rgba, RgbaImage};
use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};
use terrashade_core::{Colormap, RenderError, Result};
use tracing::trace;

/// Float RGBA texels, row 0 at the bottom of the image
#[derive(Debug, Clone, PartialEq)]
pub struct TexelBuffer {
    width: u32,
    height: u32,
    texels: Vec<Vec4>,
}

impl TexelBuffer {
    /// Transparent black buffer
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            texels: vec![Vec4::ZERO; width as usize * height as usize],
        }
    }

    /// Upload an RGBA8 image. Rows are flipped so the top image row ends up last.
    pub fn from_rgba_image(image: &RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        let mut texels = Vec::with_capacity(width as usize * height as usize);
        for y in (0..height).rev() {
            for x in 0..width {
                let Rgba([r, g, b, a]) = *image.get_pixel(x, y);
                texels.push(Vec4::new(r as f32, g as f32, b as f32, a as f32) / 255.0);
            }
        }
        Self {
            width,
            height,
            texels,
        }
    }

    /// Width in texels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in texels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// All texels, bottom row first
    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    pub(crate) fn texels_mut(&mut self) -> &mut [Vec4] {
        &mut self.texels
    }

    /// Set every texel to transparent black
    pub fn clear(&mut self) {
        self.texels.fill(Vec4::ZERO);
    }

    /// Texel at integer coordinates, clamped to the edge
    pub fn fetch(&self, x: i32, y: i32) -> Vec4 {
        if self.texels.is_empty() {
            return Vec4::ZERO;
        }
        let x = x.clamp(0, self.width as i32 - 1) as usize;
        let y = y.clamp(0, self.height as i32 - 1) as usize;
        self.texels[y * self.width as usize + x]
    }

    /// Nearest-neighbour sample at normalized coordinates, clamped to the edge
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let x = (uv.x * self.width as f32).floor() as i32;
        let y = (uv.y * self.height as f32).floor() as i32;
        self.fetch(x, y)
    }

    /// Write a single texel
    pub fn put(&mut self, x: u32, y: u32, value: Vec4) {
        if x < self.width && y < self.height {
            self.texels[(y * self.width + x) as usize] = value;
        }
    }

    /// Read back as RGBA8, clamping and rounding every channel and flipping rows back to top-down
    pub fn to_rgba_image(&self) -> RgbaImage {
        let height = self.height;
        RgbaImage::from_fn(self.width, self.height, |x, y| {
            let texel = self.fetch(x as i32, (height - 1 - y) as i32);
            let bytes = (texel.clamp(Vec4::ZERO, Vec4::ONE) * 255.0).round();
            Rgba([bytes.x as u8, bytes.y as u8, bytes.z as u8, bytes.w as u8])
        })
    }
}

#[derive(Debug)]
struct PoolState {
    capacity: usize,
    next_fresh: usize,
    released: VecDeque<usize>,
    in_use: usize,
}

/// Hands out texture unit indices.
///
/// Units are numbered from 1; unit 0 stays free as the scratch binding.
/// Never-used units are handed out first, in increasing order. Released
/// units are only reused once every unit has been handed out once.
#[derive(Debug, Clone)]
pub struct TextureUnitPool {
    state: Arc<Mutex<PoolState>>,
}

impl TextureUnitPool {
    /// Create a pool with `capacity` usable units
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(PoolState {
                capacity,
                next_fresh: 0,
                released: VecDeque::new(),
                in_use: 0,
            })),
        }
    }

    /// Number of usable units
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Number of units currently leased
    pub fn in_use(&self) -> usize {
        self.state.lock().in_use
    }

    /// Lease a unit; it returns to the pool when the lease is dropped
    pub fn allocate(&self) -> Result<UnitLease> {
        let mut state = self.state.lock();
        let index = if state.next_fresh < state.capacity {
            state.next_fresh += 1;
            state.next_fresh
        } else if let Some(unit) = state.released.pop_front() {
            unit
        } else {
            return Err(RenderError::ResourceExhausted {
                resource: "texture units",
                capacity: state.capacity,
            });
        };
        state.in_use += 1;
        trace!("Leased texture unit {} ({} in use)", index, state.in_use);

        Ok(UnitLease {
            index,
            pool: Arc::clone(&self.state),
        })
    }
}

/// A leased texture unit
#[derive(Debug)]
pub struct UnitLease {
    index: usize,
    pool: Arc<Mutex<PoolState>>,
}

impl UnitLease {
    /// The unit index
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Drop for UnitLease {
    fn drop(&mut self) {
        let mut state = self.pool.lock();
        state.in_use = state.in_use.saturating_sub(1);
        state.released.push_back(self.index);
    }
}

#[derive(Debug)]
struct TextureInner {
    id: u64,
    unit: UnitLease,
    width: u32,
    height: u32,
    texels: RwLock<TexelBuffer>,
}

/// A texture bound to its own unit.
///
/// Cloning is cheap and shares the texels; the unit is released once the
/// last handle is dropped.
#[derive(Debug, Clone)]
pub struct Texture {
    inner: Arc<TextureInner>,
}

impl Texture {
    pub(crate) fn new(pool: &TextureUnitPool, texels: TexelBuffer) -> Result<Self> {
        static COUNTER: AtomicU64 = AtomicU64::new(0);

        if texels.width() == 0 || texels.height() == 0 {
            return Err(RenderError::InvalidImage(format!(
                "texture size {}x{} is empty",
                texels.width(),
                texels.height()
            )));
        }

        let unit = pool.allocate()?;
        Ok(Self {
            inner: Arc::new(TextureInner {
                id: COUNTER.fetch_add(1, Ordering::Relaxed),
                unit,
                width: texels.width(),
                height: texels.height(),
                texels: RwLock::new(texels),
            }),
        })
    }

    pub(crate) fn from_image(pool: &TextureUnitPool, image: &RgbaImage) -> Result<Self> {
        Self::new(pool, TexelBuffer::from_rgba_image(image))
    }

    pub(crate) fn from_colormap(pool: &TextureUnitPool, colormap: &Colormap) -> Result<Self> {
        Self::from_image(pool, &colormap.to_image())
    }

    /// Unique id of the underlying storage
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Texture unit the texture is bound to
    pub fn unit(&self) -> usize {
        self.inner.unit.index()
    }

    /// Width in texels
    pub fn width(&self) -> u32 {
        self.inner.width
    }

    /// Height in texels
    pub fn height(&self) -> u32 {
        self.inner.height
    }

    /// Lock the texels for reading
    pub fn read(&self) -> RwLockReadGuard<'_, TexelBuffer> {
        self.inner.texels.read_recursive()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, TexelBuffer> {
        self.inner.texels.write()
    }

    /// Read the texture back as an RGBA8 image
    pub fn to_image(&self) -> RgbaImage {
        self.read().to_rgba_image()
    }
}

impl AsRef<Texture> for Texture {
    fn as_ref(&self) -> &Texture {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upload_flips_rows() {
        let mut image = RgbaImage::new(1, 2);
        image.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        image.put_pixel(0, 1, Rgba([0, 0, 255, 255]));

        let buffer = TexelBuffer::from_rgba_image(&image);
        assert_eq!(buffer.fetch(0, 0), Vec4::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(buffer.fetch(0, 1), Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(buffer.to_rgba_image(), image);
    }

    #[test]
    fn test_fetch_clamps_to_edge() {
        let mut buffer = TexelBuffer::new(2, 2);
        buffer.put(1, 1, Vec4::ONE);
        assert_eq!(buffer.fetch(5, 5), Vec4::ONE);
        assert_eq!(buffer.fetch(-3, -3), Vec4::ZERO);
        assert_eq!(buffer.sample(Vec2::new(0.99, 0.99)), Vec4::ONE);
        assert_eq!(buffer.sample(Vec2::new(1.5, 1.5)), Vec4::ONE);
    }

    #[test]
    fn test_pool_hands_out_fresh_units_first() {
        let pool = TextureUnitPool::new(3);
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        assert_eq!((a.index(), b.index()), (1, 2));

        drop(a);
        // Unit 3 has never been used, so it comes before the released unit 1
        let c = pool.allocate().unwrap();
        assert_eq!(c.index(), 3);
        let d = pool.allocate().unwrap();
        assert_eq!(d.index(), 1);
        assert_eq!(pool.in_use(), 3);
    }

    #[test]
    fn test_pool_exhaustion() {
        let pool = TextureUnitPool::new(1);
        let _lease = pool.allocate().unwrap();
        match pool.allocate() {
            Err(RenderError::ResourceExhausted { capacity, .. }) => assert_eq!(capacity, 1),
            other => panic!("expected exhaustion, got {:?}", other),
        }
    }

    #[test]
    fn test_texture_releases_unit_on_last_drop() {
        let pool = TextureUnitPool::new(2);
        let texture = Texture::new(&pool, TexelBuffer::new(1, 1)).unwrap();
        let clone = texture.clone();
        assert_eq!(pool.in_use(), 1);
        drop(texture);
        assert_eq!(pool.in_use(), 1);
        drop(clone);
        assert_eq!(pool.in_use(), 0);
    }

    #[test]
    fn test_empty_texture_rejected() {
        let pool = TextureUnitPool::new(2);
        assert!(matches!(
            Texture::new(&pool, TexelBuffer::new(0, 4)),
            Err(RenderError::InvalidImage(_))
        ));
        assert_eq!(pool.in_use(), 0);
    }
}
