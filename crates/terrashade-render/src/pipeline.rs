//! Shader commands
//!
//! A command is assembled with [`ShaderCommandBuilder`] from a vertex stage,
//! a fragment program, the `position` attribute, named texture and uniform
//! bindings, a viewport and an optional output framebuffer. `compile()`
//! checks every binding against the interface the program declares and
//! returns an immutable [`CompiledCommand`].
//!
//! Bindings can be left open as named variables and supplied per draw
//! through [`DrawProps`], which is how ping-pong loops reuse one command.
//!
//! Drawing clears the target, rasterizes the triangles inside the viewport
//! and shades every covered pixel, one row per rayon task.

use std::collections::HashMap;
use std::sync::Arc;

use glam::{Vec2, Vec3, Vec4};
use rayon::prelude::*;
use terrashade_core::{RenderError, Result};
use tracing::{debug, trace};

use crate::context::RenderContext;
use crate::framebuffer::FrameBuffer;
use crate::texture::{TexelBuffer, Texture};

/// Name of the vertex attribute holding clip-space positions
pub const POSITION_ATTRIBUTE: &str = "position";

/// Two triangles covering clip space
#[rustfmt::skip]
pub const FULLSCREEN_QUAD: [f32; 12] = [
    -1.0, -1.0, // bottom-left
     1.0, -1.0, // bottom-right
     1.0,  1.0, // top-right

    -1.0, -1.0, // bottom-left
     1.0,  1.0, // top-right
    -1.0,  1.0, // top-left
];

/// Type of a uniform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniformKind {
    /// `float`
    Float,
    /// `vec2`
    Vec2,
    /// `vec3`
    Vec3,
    /// `int`, also used for booleans
    Int,
}

/// Value of a uniform
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    /// `float`
    Float(f32),
    /// `vec2`
    Vec2(Vec2),
    /// `vec3`
    Vec3(Vec3),
    /// `int`
    Int(i32),
}

impl UniformValue {
    /// Type of the value
    pub fn kind(&self) -> UniformKind {
        match self {
            UniformValue::Float(_) => UniformKind::Float,
            UniformValue::Vec2(_) => UniformKind::Vec2,
            UniformValue::Vec3(_) => UniformKind::Vec3,
            UniformValue::Int(_) => UniformKind::Int,
        }
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::Float(v)
    }
}

impl From<Vec2> for UniformValue {
    fn from(v: Vec2) -> Self {
        UniformValue::Vec2(v)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        UniformValue::Vec2(Vec2::from(v))
    }
}

impl From<Vec3> for UniformValue {
    fn from(v: Vec3) -> Self {
        UniformValue::Vec3(v)
    }
}

impl From<i32> for UniformValue {
    fn from(v: i32) -> Self {
        UniformValue::Int(v)
    }
}

impl From<bool> for UniformValue {
    fn from(v: bool) -> Self {
        UniformValue::Int(v as i32)
    }
}

/// Samplers and uniforms a fragment program reads.
///
/// At draw time the program receives them in declaration order, so slot
/// `i` of [`Fragment::texture`] is `samplers[i]`.
#[derive(Debug, Clone, Copy)]
pub struct ProgramInterface {
    /// Sampler names
    pub samplers: &'static [&'static str],
    /// Uniform names and types
    pub uniforms: &'static [(&'static str, UniformKind)],
}

/// Per-pixel stage of a draw command
pub trait FragmentProgram: Send + Sync + 'static {
    /// Program name used in logs and errors
    fn name(&self) -> &'static str;

    /// Declared samplers and uniforms
    fn interface(&self) -> ProgramInterface;

    /// Colour of one pixel
    fn shade(&self, fragment: &Fragment<'_>) -> Vec4;
}

/// Vertex stage of a draw command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VertexStage {
    /// Pass clip-space positions through; `uv = position * 0.5 + 0.5`
    Position,
}

/// Inputs of one fragment program invocation
pub struct Fragment<'a> {
    /// Interpolated texture coordinate
    pub uv: Vec2,
    /// Window coordinate of the pixel centre
    pub coord: Vec2,
    samplers: &'a [&'a TexelBuffer],
    uniforms: &'a [UniformValue],
}

impl<'a> Fragment<'a> {
    /// Texture bound to sampler slot `slot`
    pub fn texture(&self, slot: usize) -> &'a TexelBuffer {
        self.samplers[slot]
    }

    /// Nearest sample of sampler `slot` at `uv`
    pub fn sample(&self, slot: usize, uv: Vec2) -> Vec4 {
        self.samplers[slot].sample(uv)
    }

    /// Integer pixel position
    pub fn pixel(&self) -> (i32, i32) {
        (self.coord.x.floor() as i32, self.coord.y.floor() as i32)
    }

    /// Float uniform at `slot`
    pub fn float(&self, slot: usize) -> f32 {
        match self.uniforms[slot] {
            UniformValue::Float(v) => v,
            UniformValue::Int(v) => v as f32,
            UniformValue::Vec2(v) => v.x,
            UniformValue::Vec3(v) => v.x,
        }
    }

    /// Vec2 uniform at `slot`
    pub fn vec2(&self, slot: usize) -> Vec2 {
        match self.uniforms[slot] {
            UniformValue::Vec2(v) => v,
            UniformValue::Vec3(v) => v.truncate(),
            UniformValue::Float(v) => Vec2::splat(v),
            UniformValue::Int(v) => Vec2::splat(v as f32),
        }
    }

    /// Vec3 uniform at `slot`
    pub fn vec3(&self, slot: usize) -> Vec3 {
        match self.uniforms[slot] {
            UniformValue::Vec3(v) => v,
            UniformValue::Vec2(v) => v.extend(0.0),
            UniformValue::Float(v) => Vec3::splat(v),
            UniformValue::Int(v) => Vec3::splat(v as f32),
        }
    }

    /// Int uniform at `slot`
    pub fn int(&self, slot: usize) -> i32 {
        match self.uniforms[slot] {
            UniformValue::Int(v) => v,
            UniformValue::Float(v) => v as i32,
            UniformValue::Vec2(v) => v.x as i32,
            UniformValue::Vec3(v) => v.x as i32,
        }
    }

    /// Boolean (int) uniform at `slot`
    pub fn flag(&self, slot: usize) -> bool {
        self.int(slot) != 0
    }
}

/// Rectangle of the target drawn into, in pixels from the bottom-left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    /// Left edge
    pub x: i32,
    /// Bottom edge
    pub y: i32,
    /// Width
    pub width: u32,
    /// Height
    pub height: u32,
}

#[derive(Debug, Clone)]
enum Binding<T> {
    Fixed(T),
    Variable(String),
}

/// Values for the variables of a compiled command
#[derive(Debug, Clone, Default)]
pub struct DrawProps {
    textures: HashMap<String, Texture>,
    uniforms: HashMap<String, UniformValue>,
    framebuffers: HashMap<String, FrameBuffer>,
}

impl DrawProps {
    /// Empty set of values
    pub fn new() -> Self {
        Self::default()
    }

    /// Supply a texture variable
    pub fn texture(mut self, name: &str, texture: &impl AsRef<Texture>) -> Self {
        self.textures
            .insert(name.to_string(), texture.as_ref().clone());
        self
    }

    /// Supply a uniform variable
    pub fn uniform(mut self, name: &str, value: impl Into<UniformValue>) -> Self {
        self.uniforms.insert(name.to_string(), value.into());
        self
    }

    /// Supply a framebuffer variable
    pub fn framebuffer(mut self, name: &str, framebuffer: &FrameBuffer) -> Self {
        self.framebuffers
            .insert(name.to_string(), framebuffer.clone());
        self
    }
}

/// Fluent assembler for draw commands
#[derive(Default)]
pub struct ShaderCommandBuilder {
    vertex: Option<VertexStage>,
    fragment: Option<Arc<dyn FragmentProgram>>,
    attributes: HashMap<String, Vec<f32>>,
    textures: Vec<(String, Binding<Texture>)>,
    uniforms: Vec<(String, Binding<UniformValue>)>,
    viewport: Option<Viewport>,
    framebuffer: Option<Binding<FrameBuffer>>,
    vertex_count: usize,
}

impl ShaderCommandBuilder {
    /// Empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the vertex stage
    pub fn vertex(mut self, stage: VertexStage) -> Self {
        self.vertex = Some(stage);
        self
    }

    /// Set the fragment program
    pub fn fragment(mut self, program: impl FragmentProgram) -> Self {
        self.fragment = Some(Arc::new(program));
        self
    }

    /// Attach a vertex attribute of 2-D positions
    pub fn attribute(mut self, name: &str, data: impl Into<Vec<f32>>) -> Self {
        self.attributes.insert(name.to_string(), data.into());
        self
    }

    /// Bind a texture or framebuffer to a sampler
    pub fn texture(mut self, name: &str, texture: &impl AsRef<Texture>) -> Self {
        self.textures.push((
            name.to_string(),
            Binding::Fixed(texture.as_ref().clone()),
        ));
        self
    }

    /// Leave a sampler to be supplied per draw under the same name
    pub fn texture_var(mut self, name: &str) -> Self {
        self.textures
            .push((name.to_string(), Binding::Variable(name.to_string())));
        self
    }

    /// Set a uniform
    pub fn uniform(mut self, name: &str, value: impl Into<UniformValue>) -> Self {
        self.uniforms
            .push((name.to_string(), Binding::Fixed(value.into())));
        self
    }

    /// Leave a uniform to be supplied per draw under the same name
    pub fn uniform_var(mut self, name: &str) -> Self {
        self.uniforms
            .push((name.to_string(), Binding::Variable(name.to_string())));
        self
    }

    /// Restrict drawing to a rectangle. Defaults to the whole target.
    pub fn viewport(mut self, x: i32, y: i32, width: u32, height: u32) -> Self {
        self.viewport = Some(Viewport {
            x,
            y,
            width,
            height,
        });
        self
    }

    /// Render into a framebuffer instead of the canvas
    pub fn framebuffer(mut self, framebuffer: &FrameBuffer) -> Self {
        self.framebuffer = Some(Binding::Fixed(framebuffer.clone()));
        self
    }

    /// Render into a framebuffer supplied per draw
    pub fn framebuffer_var(mut self, name: &str) -> Self {
        self.framebuffer = Some(Binding::Variable(name.to_string()));
        self
    }

    /// Number of vertices to draw
    pub fn vertex_count(mut self, count: usize) -> Self {
        self.vertex_count = count;
        self
    }

    /// Validate the bindings and produce an executable command
    pub fn compile(self) -> Result<CompiledCommand> {
        let program = self
            .fragment
            .ok_or_else(|| RenderError::shader_compile("<unset>", "no fragment program"))?;
        let name = program.name();
        let fail = |reason: String| RenderError::shader_compile(name, reason);

        if self.vertex.is_none() {
            return Err(fail("no vertex stage".to_string()));
        }
        if self.vertex_count == 0 || self.vertex_count % 3 != 0 {
            return Err(fail(format!(
                "vertex count {} is not a positive multiple of 3",
                self.vertex_count
            )));
        }

        let positions = self
            .attributes
            .get(POSITION_ATTRIBUTE)
            .ok_or_else(|| fail(format!("attribute '{}' is missing", POSITION_ATTRIBUTE)))?;
        if positions.len() < 2 * self.vertex_count {
            return Err(fail(format!(
                "attribute '{}' has {} floats, {} vertices need {}",
                POSITION_ATTRIBUTE,
                positions.len(),
                self.vertex_count,
                2 * self.vertex_count
            )));
        }
        let triangles = positions[..2 * self.vertex_count]
            .chunks_exact(6)
            .map(|t| {
                [
                    Vec2::new(t[0], t[1]),
                    Vec2::new(t[2], t[3]),
                    Vec2::new(t[4], t[5]),
                ]
            })
            .collect();

        let interface = program.interface();

        for (attribute, _) in &self.attributes {
            if attribute != POSITION_ATTRIBUTE {
                debug!("{}: ignoring unused attribute '{}'", name, attribute);
            }
        }
        for (texture, _) in &self.textures {
            if !interface.samplers.iter().any(|s| *s == texture.as_str()) {
                debug!("{}: ignoring undeclared sampler '{}'", name, texture);
            }
        }
        for (uniform, _) in &self.uniforms {
            if !interface.uniforms.iter().any(|(u, _)| *u == uniform.as_str()) {
                debug!("{}: ignoring undeclared uniform '{}'", name, uniform);
            }
        }

        let samplers = interface
            .samplers
            .iter()
            .map(|sampler| {
                self.textures
                    .iter()
                    .rev()
                    .find(|(bound, _)| bound.as_str() == *sampler)
                    .map(|(_, binding)| binding.clone())
                    .ok_or_else(|| fail(format!("sampler '{}' is not bound", sampler)))
            })
            .collect::<Result<Vec<_>>>()?;

        let uniforms = interface
            .uniforms
            .iter()
            .map(|(uniform, kind)| {
                let binding = self
                    .uniforms
                    .iter()
                    .rev()
                    .find(|(bound, _)| bound.as_str() == *uniform)
                    .map(|(_, binding)| binding.clone())
                    .ok_or_else(|| fail(format!("uniform '{}' is not set", uniform)))?;
                if let Binding::Fixed(value) = &binding {
                    if value.kind() != *kind {
                        return Err(fail(format!(
                            "uniform '{}' is declared {:?} but set to {:?}",
                            uniform,
                            kind,
                            value.kind()
                        )));
                    }
                }
                Ok((*uniform, *kind, binding))
            })
            .collect::<Result<Vec<_>>>()?;

        trace!(
            "Compiled '{}' with {} samplers and {} uniforms",
            name,
            samplers.len(),
            uniforms.len()
        );

        Ok(CompiledCommand {
            program,
            triangles,
            samplers,
            uniforms,
            viewport: self.viewport,
            target: self.framebuffer,
        })
    }
}

/// An immutable, validated draw command
pub struct CompiledCommand {
    program: Arc<dyn FragmentProgram>,
    triangles: Vec<[Vec2; 3]>,
    samplers: Vec<Binding<Texture>>,
    uniforms: Vec<(&'static str, UniformKind, Binding<UniformValue>)>,
    viewport: Option<Viewport>,
    target: Option<Binding<FrameBuffer>>,
}

impl std::fmt::Debug for CompiledCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledCommand")
            .field("program", &self.program.name())
            .field("triangles", &self.triangles.len())
            .field("viewport", &self.viewport)
            .finish()
    }
}

impl CompiledCommand {
    /// Name of the fragment program
    pub fn name(&self) -> &'static str {
        self.program.name()
    }

    /// Draw a command without variables
    pub fn draw(&self, ctx: &RenderContext) -> Result<()> {
        self.draw_with(ctx, &DrawProps::default())
    }

    /// Draw, taking variables from `props`
    pub fn draw_with(&self, ctx: &RenderContext, props: &DrawProps) -> Result<()> {
        ctx.check_cancelled()?;
        let name = self.program.name();
        let missing = |var: &str| RenderError::MissingBinding {
            command: name.to_string(),
            name: var.to_string(),
        };

        let textures = self
            .samplers
            .iter()
            .map(|binding| match binding {
                Binding::Fixed(texture) => Ok(texture.clone()),
                Binding::Variable(var) => props.textures.get(var).cloned().ok_or_else(|| missing(var)),
            })
            .collect::<Result<Vec<_>>>()?;

        let uniforms = self
            .uniforms
            .iter()
            .map(|(uniform, kind, binding)| match binding {
                Binding::Fixed(value) => Ok(*value),
                Binding::Variable(var) => {
                    let value = props.uniforms.get(var).copied().ok_or_else(|| missing(var))?;
                    if value.kind() != *kind {
                        return Err(RenderError::shader_compile(
                            name,
                            format!(
                                "uniform '{}' is declared {:?} but supplied as {:?}",
                                uniform,
                                kind,
                                value.kind()
                            ),
                        ));
                    }
                    Ok(value)
                }
            })
            .collect::<Result<Vec<_>>>()?;

        let target = match &self.target {
            None => None,
            Some(Binding::Fixed(fb)) => Some(fb.clone()),
            Some(Binding::Variable(var)) => {
                Some(props.framebuffers.get(var).cloned().ok_or_else(|| missing(var))?)
            }
        };

        if let Some(fb) = &target {
            if textures.iter().any(|t| t.id() == fb.texture().id()) {
                return Err(RenderError::FeedbackLoop(name.to_string()));
            }
        }

        let guards: Vec<_> = textures.iter().map(|t| t.read()).collect();
        let sampler_refs: Vec<&TexelBuffer> = guards.iter().map(|g| &**g).collect();

        match &target {
            Some(fb) => {
                let mut output = fb.texture().write();
                self.rasterize(&mut output, &sampler_refs, &uniforms);
            }
            None => {
                let mut output = ctx.canvas_mut();
                self.rasterize(&mut output, &sampler_refs, &uniforms);
            }
        }
        trace!("Drew '{}'", name);
        Ok(())
    }

    fn rasterize(&self, output: &mut TexelBuffer, samplers: &[&TexelBuffer], uniforms: &[UniformValue]) {
        output.clear();

        let width = output.width() as usize;
        let viewport = self.viewport.unwrap_or(Viewport {
            x: 0,
            y: 0,
            width: output.width(),
            height: output.height(),
        });
        if width == 0 || viewport.width == 0 || viewport.height == 0 {
            return;
        }

        let program = self.program.as_ref();
        let triangles = &self.triangles;

        output
            .texels_mut()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(row, texels)| {
                let py = row as i32;
                if py < viewport.y || py >= viewport.y + viewport.height as i32 {
                    return;
                }
                let ndc_y = ((py - viewport.y) as f32 + 0.5) / viewport.height as f32 * 2.0 - 1.0;

                for (px, texel) in texels.iter_mut().enumerate() {
                    let px = px as i32;
                    if px < viewport.x || px >= viewport.x + viewport.width as i32 {
                        continue;
                    }
                    let ndc_x = ((px - viewport.x) as f32 + 0.5) / viewport.width as f32 * 2.0 - 1.0;
                    let position = Vec2::new(ndc_x, ndc_y);
                    if !triangles.iter().any(|t| covers(t, position)) {
                        continue;
                    }

                    let fragment = Fragment {
                        uv: position * 0.5 + 0.5,
                        coord: Vec2::new(px as f32 + 0.5, py as f32 + 0.5),
                        samplers,
                        uniforms,
                    };
                    *texel = program.shade(&fragment);
                }
            });
    }
}

fn edge(a: Vec2, b: Vec2, p: Vec2) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Whether `p` lies inside the triangle, edges included, for either winding
fn covers(triangle: &[Vec2; 3], p: Vec2) -> bool {
    let [a, b, c] = *triangle;
    let e0 = edge(a, b, p);
    let e1 = edge(b, c, p);
    let e2 = edge(c, a, p);
    let area = edge(a, b, c);
    if area == 0.0 {
        return false;
    }
    (e0 >= 0.0 && e1 >= 0.0 && e2 >= 0.0) || (e0 <= 0.0 && e1 <= 0.0 && e2 <= 0.0)
}
