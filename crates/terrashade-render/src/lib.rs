//! Terrashade Render - Software Raster Pipeline
//!
//! This crate draws raster layers on the CPU with the structure of a GPU
//! pipeline:
//! - A render context owning the texture unit pool and the canvas
//! - Textures, framebuffers and ping-pong pairs
//! - Shader commands assembled from fragment programs and named bindings
//! - The fragment program catalog (colormaps, elevation, lighting)
//! - Draw commands and the pipeline dispatch of a layer

#![warn(missing_docs)]

pub mod commands;
pub mod context;
pub mod draw;
pub mod framebuffer;
pub mod pipeline;
pub mod programs;
pub mod texture;

pub use commands::{
    calc_iterations, default_sun_direction, draw_raw_image, draw_with_advanced_hillshading,
    draw_with_colormap, draw_with_onepass_hillshading, draw_with_terrain_rgb, ColorScaleOptions,
    HillshadingOptions, OnePassOptions, RawImageOptions, TerrainRgbOptions,
};
pub use context::{DeviceLimits, RenderContext};
pub use draw::{draw_layer, Pipeline};
pub use framebuffer::{FrameBuffer, PingPong};
pub use pipeline::{
    CompiledCommand, DrawProps, Fragment, FragmentProgram, ProgramInterface,
    ShaderCommandBuilder, UniformKind, UniformValue, VertexStage, FULLSCREEN_QUAD,
    POSITION_ATTRIBUTE,
};
pub use texture::{TexelBuffer, Texture, TextureUnitPool, UnitLease};

pub use terrashade_core::{RenderError, Result};
