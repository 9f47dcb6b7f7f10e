use glam::Vec4;

use super::{apply_scale, colormap_lookup, is_black};
use crate::pipeline::{Fragment, FragmentProgram, ProgramInterface, UniformKind};
use crate::texture::TexelBuffer;

/// Colormap lookup parameters, in uniform order after the samplers
struct Lookup {
    length: f32,
    scale_type: i32,
    min: f32,
    max: f32,
    black_to_alpha: bool,
}

impl Lookup {
    fn read(fragment: &Fragment<'_>, first_slot: usize) -> Self {
        Self {
            length: fragment.float(first_slot),
            scale_type: fragment.int(first_slot + 1),
            min: fragment.float(first_slot + 2),
            max: fragment.float(first_slot + 3),
            black_to_alpha: fragment.flag(first_slot + 4),
        }
    }

    /// Colour of a raw texel. The red channel (0..255) is the value.
    fn color(&self, raw: Vec4, colormap: &TexelBuffer) -> Vec4 {
        if self.black_to_alpha && is_black(raw) {
            return Vec4::ZERO;
        }
        let value = raw.x * 255.0;
        if value < self.min || value > self.max {
            return Vec4::ZERO;
        }
        let t = apply_scale(self.scale_type, value / 255.0);
        let color = colormap_lookup(colormap, self.length, t);
        color.truncate().extend(color.w * raw.w)
    }
}

const U_RAW_IMAGE: usize = 0;
const U_COLORMAP: usize = 1;

/// Maps the red channel of an image through a colormap
#[derive(Debug, Clone, Copy, Default)]
pub struct ColormapProgram;

impl FragmentProgram for ColormapProgram {
    fn name(&self) -> &'static str {
        "colormap"
    }

    fn interface(&self) -> ProgramInterface {
        ProgramInterface {
            samplers: &["u_raw_image", "u_colormap"],
            uniforms: &[
                ("u_colormap_length", UniformKind::Float),
                ("u_scale_type", UniformKind::Int),
                ("u_min_color_value", UniformKind::Float),
                ("u_max_color_value", UniformKind::Float),
                ("u_black_to_alpha", UniformKind::Int),
            ],
        }
    }

    fn shade(&self, fragment: &Fragment<'_>) -> Vec4 {
        let raw = fragment.sample(U_RAW_IMAGE, fragment.uv);
        Lookup::read(fragment, 0).color(raw, fragment.texture(U_COLORMAP))
    }
}

const S_LIGHT: usize = 0;
const S_RAW_IMAGE: usize = 1;
const S_COLORMAP: usize = 2;

/// Colormap lookup multiplied by a lighting image
#[derive(Debug, Clone, Copy, Default)]
pub struct ShadedColormapProgram;

impl FragmentProgram for ShadedColormapProgram {
    fn name(&self) -> &'static str {
        "shaded_colormap"
    }

    fn interface(&self) -> ProgramInterface {
        ProgramInterface {
            samplers: &["u_image", "u_raw_image", "u_colormap"],
            uniforms: &[
                ("u_colormap_length", UniformKind::Float),
                ("u_scale_type", UniformKind::Int),
                ("u_min_color_value", UniformKind::Float),
                ("u_max_color_value", UniformKind::Float),
                ("u_black_to_alpha", UniformKind::Int),
                ("u_resolution", UniformKind::Vec2),
            ],
        }
    }

    fn shade(&self, fragment: &Fragment<'_>) -> Vec4 {
        let raw = fragment.sample(S_RAW_IMAGE, fragment.uv);
        let color = Lookup::read(fragment, 0).color(raw, fragment.texture(S_COLORMAP));
        let light = fragment.sample(S_LIGHT, fragment.uv).x;
        (color.truncate() * light).extend(color.w)
    }
}
