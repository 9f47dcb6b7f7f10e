//! Terrashade Core - Domain Model Shared by the Renderer and Loaders
//!
//! This crate contains the pieces every other crate agrees on:
//! - The `RenderError` taxonomy and `Result` alias
//! - Cancellation tokens for draw requests
//! - Colormap construction (hex colours, stops, pre-rendered images)
//! - Layer configuration as deserialized from the host
//! - Logging configuration

#![warn(missing_docs)]

pub use glam::{Vec2, Vec3, Vec4};

pub mod cancel;
pub mod colormap;
pub mod config;
pub mod error;
pub mod logging;

pub use cancel::CancellationToken;
pub use colormap::{
    hex_to_rgba, interpolate_by_factor, interpolate_colors, ColorStop, Colormap,
    ColormapError, ColormapOptions, Rgba, DEFAULT_COLORMAP_WIDTH,
};
pub use config::{
    cut_off_points, deserialize_cross_origin, ColorEntry, ColorScaleConfig, ColorScaleSettings,
    ColormapSource, CrossOrigin, CutOffPoints, DrawOptions, LayerConfig, ScaleType, ShaderOptions,
};
pub use error::{RenderError, Result};
pub use logging::LogConfig;
