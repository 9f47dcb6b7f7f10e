use glam::{Vec3, Vec4};

use super::{apply_scale, central_normal, colormap_lookup, decode24, direct_light, is_black};
use crate::pipeline::{Fragment, FragmentProgram, ProgramInterface, UniformKind};

const U_DATA: usize = 0;
const U_COLORMAP: usize = 1;

const U_BLACK_TO_ALPHA: usize = 1;
const U_APPLY_COLOR_SCALE: usize = 2;
const U_APPLY_HILLSHADING: usize = 3;
const U_INTERPOLATION: usize = 4;
const U_REMAP: usize = 5;
const U_CLAMP: usize = 6;
const U_ELEVATION_SCALE: usize = 7;
const U_PIXEL_SCALE: usize = 8;
const U_SUN: usize = 9;
const U_AMBIENT: usize = 10;
const U_DIFFUSE: usize = 11;

/// Elevation units per decoded unit
const ELEVATION_RANGE: f32 = 255.0;

/// Colormap and direct lighting in a single pass
#[derive(Debug, Clone, Copy, Default)]
pub struct OnePassProgram;

impl FragmentProgram for OnePassProgram {
    fn name(&self) -> &'static str {
        "onepass"
    }

    fn interface(&self) -> ProgramInterface {
        ProgramInterface {
            samplers: &["u_data_texture", "u_colormap"],
            uniforms: &[
                ("u_resolution", UniformKind::Vec2),
                ("u_black_to_alpha", UniformKind::Int),
                ("u_apply_color_scale", UniformKind::Int),
                ("u_apply_hillshading", UniformKind::Int),
                ("u_interpolation_type", UniformKind::Int),
                ("u_remap_colormap", UniformKind::Vec2),
                ("u_clamp_colormap", UniformKind::Vec2),
                ("u_elevation_scale", UniformKind::Float),
                ("u_pixel_scale", UniformKind::Float),
                ("u_sun_direction", UniformKind::Vec3),
                ("u_ambient_light_intensity", UniformKind::Float),
                ("u_diffuse_light_intensity", UniformKind::Float),
            ],
        }
    }

    fn shade(&self, fragment: &Fragment<'_>) -> Vec4 {
        let (x, y) = fragment.pixel();
        let data = fragment.texture(U_DATA);
        let texel = data.fetch(x, y);

        if fragment.flag(U_BLACK_TO_ALPHA) && is_black(texel) {
            return Vec4::ZERO;
        }

        let value = decode24(texel);
        let cut = fragment.vec2(U_CLAMP);
        if value < cut.x || value > cut.y {
            return Vec4::ZERO;
        }

        let mut color = if fragment.flag(U_APPLY_COLOR_SCALE) {
            let remap = fragment.vec2(U_REMAP);
            let t = remap.x + apply_scale(fragment.int(U_INTERPOLATION), value) * (remap.y - remap.x);
            let colormap = fragment.texture(U_COLORMAP);
            colormap_lookup(colormap, colormap.width() as f32, t)
        } else {
            texel
        };

        if fragment.flag(U_APPLY_HILLSHADING) {
            let scale = ELEVATION_RANGE * fragment.float(U_ELEVATION_SCALE);
            let height = |hx: i32, hy: i32| decode24(data.fetch(hx, hy)) * scale;
            let normal = central_normal(height, x, y, fragment.float(U_PIXEL_SCALE));
            let light = direct_light(
                normal,
                fragment.vec3(U_SUN),
                fragment.float(U_AMBIENT),
                fragment.float(U_DIFFUSE),
            );
            color = (color.truncate() * light).min(Vec3::ONE).extend(color.w);
        }
        color
    }
}
