use glam::{Vec3, Vec4};

use super::{apply_scale, central_normal, colormap_lookup, direct_light, terrain_rgb_height};
use crate::pipeline::{Fragment, FragmentProgram, ProgramInterface, UniformKind};

const U_DATA: usize = 0;
const U_COLORMAP: usize = 1;

const U_APPLY_COLOR_SCALE: usize = 1;
const U_APPLY_HILLSHADING: usize = 2;
const U_INTERPOLATION: usize = 3;
const U_VALUE_RANGE: usize = 4;
const U_MIN_VALUE: usize = 5;
const U_REMAP: usize = 6;
const U_CLAMP: usize = 7;
const U_ELEVATION_SCALE: usize = 8;
const U_PIXEL_SCALE: usize = 9;
const U_SUN: usize = 10;
const U_AMBIENT: usize = 11;
const U_DIFFUSE: usize = 12;

/// Colormap and lighting straight from a Mapbox terrain-RGB tile.
///
/// Heights are normalized against `u_min_value` and `u_value_range`; an
/// empty range maps everything to the start of the colormap. Pixels with
/// zero alpha are no-data and stay transparent.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerrainRgbProgram;

impl FragmentProgram for TerrainRgbProgram {
    fn name(&self) -> &'static str {
        "terrain_rgb"
    }

    fn interface(&self) -> ProgramInterface {
        ProgramInterface {
            samplers: &["u_data_texture", "u_colormap"],
            uniforms: &[
                ("u_resolution", UniformKind::Vec2),
                ("u_apply_color_scale", UniformKind::Int),
                ("u_apply_hillshading", UniformKind::Int),
                ("u_interpolation_type", UniformKind::Int),
                ("u_value_range", UniformKind::Float),
                ("u_min_value", UniformKind::Float),
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
        if texel.w == 0.0 {
            return Vec4::ZERO;
        }

        let height = terrain_rgb_height(texel);
        let range = fragment.float(U_VALUE_RANGE);
        let value = if range > 0.0 {
            (height - fragment.float(U_MIN_VALUE)) / range
        } else {
            0.0
        };

        let cut = fragment.vec2(U_CLAMP);
        if value < cut.x || value > cut.y {
            return Vec4::ZERO;
        }

        let mut color = if fragment.flag(U_APPLY_COLOR_SCALE) {
            let remap = fragment.vec2(U_REMAP);
            let t = remap.x
                + apply_scale(fragment.int(U_INTERPOLATION), value.clamp(0.0, 1.0))
                    * (remap.y - remap.x);
            let colormap = fragment.texture(U_COLORMAP);
            colormap_lookup(colormap, colormap.width() as f32, t)
        } else {
            Vec4::new(value, value, value, 1.0)
        };

        if fragment.flag(U_APPLY_HILLSHADING) {
            let scale = fragment.float(U_ELEVATION_SCALE);
            let height = |hx: i32, hy: i32| terrain_rgb_height(data.fetch(hx, hy)) * scale;
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
