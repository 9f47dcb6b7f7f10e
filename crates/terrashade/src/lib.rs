//! Terrashade - Colormapped and hillshaded raster layers
//!
//! Application side of the workspace: the image overlay layer that keeps a
//! layer's options, loads its image and redraws it, the TOML settings of the
//! application and the logging setup.

#![warn(missing_docs)]

pub mod logging_setup;
pub mod overlay;
pub mod settings;

pub use overlay::{DrawOutcome, ImageOverlay, OverlayError};
pub use settings::{AppSettings, LoaderSettings, RenderSettings};
