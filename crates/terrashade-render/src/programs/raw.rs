use glam::Vec4;

use super::is_black;
use crate::pipeline::{Fragment, FragmentProgram, ProgramInterface, UniformKind};

const U_IMAGE: usize = 0;
const U_BLACK_TO_ALPHA: usize = 0;

/// Copies the image, optionally turning black pixels transparent
#[derive(Debug, Clone, Copy, Default)]
pub struct RawImageProgram;

impl FragmentProgram for RawImageProgram {
    fn name(&self) -> &'static str {
        "raw_image"
    }

    fn interface(&self) -> ProgramInterface {
        ProgramInterface {
            samplers: &["u_image"],
            uniforms: &[("u_black_to_alpha", UniformKind::Int)],
        }
    }

    fn shade(&self, fragment: &Fragment<'_>) -> Vec4 {
        let texel = fragment.sample(U_IMAGE, fragment.uv);
        if fragment.flag(U_BLACK_TO_ALPHA) && is_black(texel) {
            return Vec4::ZERO;
        }
        texel
    }
}
