//! Fragment programs used by the draw commands
//!
//! Each program declares its samplers and uniforms through
//! [`ProgramInterface`](crate::pipeline::ProgramInterface) and reads them back
//! by slot in `shade`. Slot constants sit next to each interface.

mod colormap;
mod lighting;
mod onepass;
mod raw;
mod terrain_rgb;

pub use colormap::{ColormapProgram, ShadedColormapProgram};
pub use lighting::{
    AmbientProgram, CombinedProgram, DirectLightingProgram, ElevationProgram, NormalsProgram,
    SoftShadowProgram,
};
pub use onepass::OnePassProgram;
pub use raw::RawImageProgram;
pub use terrain_rgb::TerrainRgbProgram;

use glam::{Vec3, Vec4};
use terrashade_core::ScaleType;

use crate::texture::TexelBuffer;

/// Largest value of a 24-bit RGB encoding
pub const MAX_24BIT: f64 = 16_777_215.0;

fn channel(value: f32) -> f64 {
    (value.clamp(0.0, 1.0) * 255.0).round() as f64
}

fn packed24(texel: Vec4) -> f64 {
    channel(texel.x) * 65536.0 + channel(texel.y) * 256.0 + channel(texel.z)
}

/// Decode an RGB-packed value to 0..1: `(R * 65536 + G * 256 + B) / (2^24 - 1)`.
///
/// Gray pixels decode to their gray level over 255.
pub fn decode24(texel: Vec4) -> f32 {
    (packed24(texel) / MAX_24BIT) as f32
}

/// Height in metres of a Mapbox terrain-RGB texel
pub fn terrain_rgb_height(texel: Vec4) -> f32 {
    (-10_000.0 + 0.1 * packed24(texel)) as f32
}

/// Whether the colour channels are all zero
pub fn is_black(texel: Vec4) -> bool {
    texel.truncate() == Vec3::ZERO
}

/// Apply the interpolation selected by a `ScaleType` uniform code
pub fn apply_scale(code: i32, t: f32) -> f32 {
    if code == ScaleType::Log.as_uniform() {
        ScaleType::Log.apply(t)
    } else {
        ScaleType::Linear.apply(t)
    }
}

/// Nearest entry of an N x 1 colormap for `t` in 0..1
pub fn colormap_lookup(colormap: &TexelBuffer, length: f32, t: f32) -> Vec4 {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let last = (length.max(1.0) - 1.0).min(colormap.width().saturating_sub(1) as f32);
    // Small bias so values that land exactly on an entry are not truncated to the one below
    let index = (t * last + 1e-4).floor();
    colormap.fetch(index as i32, 0)
}

/// Light from a surface normal: `ambient + diffuse * max(n . sun, 0)`
fn direct_light(normal: Vec3, sun: Vec3, ambient: f32, diffuse: f32) -> f32 {
    ambient + diffuse * normal.dot(sun.normalize_or_zero()).max(0.0)
}

/// Normal from central differences of `height` around `(x, y)`
fn central_normal(height: impl Fn(i32, i32) -> f32, x: i32, y: i32, pixel_scale: f32) -> Vec3 {
    let dzx = (height(x + 1, y) - height(x - 1, y)) * 0.5;
    let dzy = (height(x, y + 1) - height(x, y - 1)) * 0.5;
    Vec3::new(-dzx, -dzy, pixel_scale)
        .try_normalize()
        .unwrap_or(Vec3::Z)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode24_gray_levels() {
        let gray = Vec4::new(128.0, 128.0, 128.0, 255.0) / 255.0;
        assert!((decode24(gray) - 128.0 / 255.0).abs() < 1e-6);
        assert_eq!(decode24(Vec4::ZERO), 0.0);
        assert_eq!(decode24(Vec4::ONE), 1.0);
    }

    #[test]
    fn test_terrain_rgb_height() {
        assert_eq!(terrain_rgb_height(Vec4::ZERO), -10_000.0);
        // 0x01_86_A0 = 100000 -> 0 m
        let sea_level = Vec4::new(1.0, 134.0, 160.0, 255.0) / 255.0;
        assert!(terrain_rgb_height(sea_level).abs() < 1e-3);
    }

    #[test]
    fn test_colormap_lookup_hits_entries() {
        let mut colormap = TexelBuffer::new(256, 1);
        for i in 0..256 {
            colormap.put(i, 0, Vec4::splat(i as f32));
        }
        assert_eq!(colormap_lookup(&colormap, 256.0, 0.0).x, 0.0);
        assert_eq!(colormap_lookup(&colormap, 256.0, 128.0 / 255.0).x, 128.0);
        assert_eq!(colormap_lookup(&colormap, 256.0, 1.0).x, 255.0);
        assert_eq!(colormap_lookup(&colormap, 256.0, 7.0).x, 255.0);
    }

    #[test]
    fn test_flat_surface_normal_points_up() {
        let normal = central_normal(|_, _| 5.0, 0, 0, 1.0);
        assert_eq!(normal, Vec3::Z);
        assert!((direct_light(normal, Vec3::Z, 0.4, 1.0) - 1.4).abs() < 1e-6);
    }
}
