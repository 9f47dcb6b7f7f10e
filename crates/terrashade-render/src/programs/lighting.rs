//! Programs of the multi-pass hillshading pipeline.
//!
//! Elevations are kept unclamped in the red channel of a float framebuffer.
//! Normals are packed as `0.5 * n + 0.5`.

use glam::{Vec2, Vec3, Vec4};

use super::decode24;
use crate::pipeline::{Fragment, FragmentProgram, ProgramInterface, UniformKind};
use crate::texture::TexelBuffer;

/// Elevation units per decoded unit
const ELEVATION_RANGE: f32 = 65535.0;

/// Distance between samples along a shadow ray, in pixels
const MARCH_STEP: f32 = 0.5;

/// Samples taken along a shadow ray before it counts as unblocked (128 px)
const MAX_MARCH_STEPS: u32 = 256;

fn unpack_normal(texel: Vec4) -> Vec3 {
    (texel.truncate() * 2.0 - 1.0).normalize_or_zero()
}

fn gray(value: f32) -> Vec4 {
    Vec4::new(value, value, value, 1.0)
}

/// Whether terrain within `MAX_MARCH_STEPS` samples of `(x, y)` blocks a ray towards `dir`
fn occluded(elevation: &TexelBuffer, x: i32, y: i32, dir: Vec3, pixel_scale: f32) -> bool {
    let horizontal = dir.truncate();
    let run = horizontal.length();
    if run < 1e-6 {
        return false;
    }
    let step = horizontal / run * MARCH_STEP;
    let slope = dir.z / run;
    let start = elevation.fetch(x, y).x;
    let (width, height) = (elevation.width() as f32, elevation.height() as f32);

    let mut p = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
    for i in 1..=MAX_MARCH_STEPS {
        p += step;
        if p.x < 0.0 || p.y < 0.0 || p.x >= width || p.y >= height {
            return false;
        }
        let distance = i as f32 * MARCH_STEP;
        let terrain = elevation.fetch(p.x.floor() as i32, p.y.floor() as i32).x;
        if terrain > start + distance * pixel_scale * slope {
            return true;
        }
    }
    false
}

/// Decodes the input image into elevations
#[derive(Debug, Clone, Copy, Default)]
pub struct ElevationProgram;

impl FragmentProgram for ElevationProgram {
    fn name(&self) -> &'static str {
        "elevation"
    }

    fn interface(&self) -> ProgramInterface {
        ProgramInterface {
            samplers: &["tElevation"],
            uniforms: &[
                ("elevationScale", UniformKind::Float),
                ("resolution", UniformKind::Vec2),
            ],
        }
    }

    fn shade(&self, fragment: &Fragment<'_>) -> Vec4 {
        let (x, y) = fragment.pixel();
        let texel = fragment.texture(0).fetch(x, y);
        let elevation = decode24(texel) * ELEVATION_RANGE * fragment.float(0);
        Vec4::new(elevation, 0.0, 0.0, 1.0)
    }
}

/// Surface normals from forward differences of the elevation
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalsProgram;

impl FragmentProgram for NormalsProgram {
    fn name(&self) -> &'static str {
        "normals"
    }

    fn interface(&self) -> ProgramInterface {
        ProgramInterface {
            samplers: &["tElevation"],
            uniforms: &[
                ("pixelScale", UniformKind::Float),
                ("resolution", UniformKind::Vec2),
            ],
        }
    }

    fn shade(&self, fragment: &Fragment<'_>) -> Vec4 {
        let (x, y) = fragment.pixel();
        let elevation = fragment.texture(0);
        let pixel_scale = fragment.float(0);

        let z0 = elevation.fetch(x, y).x;
        let dzx = elevation.fetch(x + 1, y).x - z0;
        let dzy = elevation.fetch(x, y + 1).x - z0;
        let normal = Vec3::new(pixel_scale, 0.0, dzx)
            .cross(Vec3::new(0.0, pixel_scale, dzy))
            .try_normalize()
            .unwrap_or(Vec3::Z);
        (normal * 0.5 + 0.5).extend(1.0)
    }
}

/// Half-Lambert lighting from the sun direction
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectLightingProgram;

impl FragmentProgram for DirectLightingProgram {
    fn name(&self) -> &'static str {
        "direct_lighting"
    }

    fn interface(&self) -> ProgramInterface {
        ProgramInterface {
            samplers: &["tNormal"],
            uniforms: &[
                ("sunDirection", UniformKind::Vec3),
                ("resolution", UniformKind::Vec2),
            ],
        }
    }

    fn shade(&self, fragment: &Fragment<'_>) -> Vec4 {
        let (x, y) = fragment.pixel();
        let normal = unpack_normal(fragment.texture(0).fetch(x, y));
        let sun = fragment.vec3(0).normalize_or_zero();
        gray(0.5 * normal.dot(sun) + 0.5)
    }
}

const T_ELEVATION: usize = 0;
const T_NORMAL: usize = 1;
const T_SRC: usize = 2;

const U_DIRECTION: usize = 0;
const U_PIXEL_SCALE: usize = 1;
const U_N: usize = 3;

/// One soft shadow sample, accumulated onto `tSrc`
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftShadowProgram;

impl FragmentProgram for SoftShadowProgram {
    fn name(&self) -> &'static str {
        "soft_shadow"
    }

    fn interface(&self) -> ProgramInterface {
        ProgramInterface {
            samplers: &["tElevation", "tNormal", "tSrc"],
            uniforms: &[
                ("sunDirection", UniformKind::Vec3),
                ("pixelScale", UniformKind::Float),
                ("resolution", UniformKind::Vec2),
                ("n", UniformKind::Float),
            ],
        }
    }

    fn shade(&self, fragment: &Fragment<'_>) -> Vec4 {
        let (x, y) = fragment.pixel();
        let src = fragment.texture(T_SRC).fetch(x, y);
        let normal = unpack_normal(fragment.texture(T_NORMAL).fetch(x, y));
        let sun = fragment.vec3(U_DIRECTION).normalize_or_zero();

        let mut lambert = normal.dot(sun).max(0.0);
        if lambert > 0.0
            && occluded(
                fragment.texture(T_ELEVATION),
                x,
                y,
                sun,
                fragment.float(U_PIXEL_SCALE),
            )
        {
            lambert = 0.0;
        }
        (src.truncate() + Vec3::splat(lambert / fragment.float(U_N))).extend(1.0)
    }
}

/// One ambient occlusion sample, accumulated onto `tSrc`
#[derive(Debug, Clone, Copy, Default)]
pub struct AmbientProgram;

impl FragmentProgram for AmbientProgram {
    fn name(&self) -> &'static str {
        "ambient"
    }

    fn interface(&self) -> ProgramInterface {
        ProgramInterface {
            samplers: &["tElevation", "tNormal", "tSrc"],
            uniforms: &[
                ("direction", UniformKind::Vec3),
                ("pixelScale", UniformKind::Float),
                ("resolution", UniformKind::Vec2),
                ("n", UniformKind::Float),
            ],
        }
    }

    fn shade(&self, fragment: &Fragment<'_>) -> Vec4 {
        let (x, y) = fragment.pixel();
        let src = fragment.texture(T_SRC).fetch(x, y);
        let normal = unpack_normal(fragment.texture(T_NORMAL).fetch(x, y));

        let mut direction = fragment.vec3(U_DIRECTION).normalize_or_zero();
        if direction.dot(normal) < 0.0 {
            direction = -direction;
        }
        let mut light = direction.dot(normal);
        if light > 0.0
            && occluded(
                fragment.texture(T_ELEVATION),
                x,
                y,
                direction,
                fragment.float(U_PIXEL_SCALE),
            )
        {
            light = 0.0;
        }
        (src.truncate() + Vec3::splat(light / fragment.float(U_N))).extend(1.0)
    }
}

/// Blends soft shadows and ambient light: `clamp(0.8 * shadow + 0.4 * ambient)`
#[derive(Debug, Clone, Copy, Default)]
pub struct CombinedProgram;

impl FragmentProgram for CombinedProgram {
    fn name(&self) -> &'static str {
        "combined"
    }

    fn interface(&self) -> ProgramInterface {
        ProgramInterface {
            samplers: &["tSoftShadow", "tAmbient"],
            uniforms: &[("resolution", UniformKind::Vec2)],
        }
    }

    fn shade(&self, fragment: &Fragment<'_>) -> Vec4 {
        let (x, y) = fragment.pixel();
        let shadow = fragment.texture(0).fetch(x, y).x;
        let ambient = fragment.texture(1).fetch(x, y).x;
        gray((0.8 * shadow + 0.4 * ambient).clamp(0.0, 1.0))
    }
}
