//! Application settings
//!
//! Read from a TOML file. Every section and key has a default, so an empty
//! or partial file is valid:
//!
//! ```toml
//! [log]
//! level = "debug"
//!
//! [render]
//! max_texture_units = 16
//! draw_timeout_secs = 60
//!
//! [loader]
//! timeout_secs = 30
//! cross_origin = "anonymous"
//! page_origin = "https://maps.example.com"
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use terrashade_core::{CrossOrigin, LogConfig};
use terrashade_io::LoaderOptions;
use terrashade_render::DeviceLimits;

/// Renderer settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderSettings {
    /// Texture image units of the device, one of which is reserved
    pub max_texture_units: usize,
    /// Upper bound for one draw request, loading included
    pub draw_timeout_secs: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            max_texture_units: 16,
            draw_timeout_secs: 60,
        }
    }
}

/// Image loader settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Upper bound for one image load
    pub timeout_secs: u64,
    /// CORS mode for cross-origin images
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cross_origin: Option<CrossOrigin>,
    /// Origin requests are made from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_origin: Option<String>,
    /// `Cookie` header for `use-credentials` requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            cross_origin: None,
            page_origin: None,
            credentials: None,
        }
    }
}

/// All application settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Logging
    pub log: LogConfig,
    /// Rendering
    pub render: RenderSettings,
    /// Image loading
    pub loader: LoaderSettings,
}

impl AppSettings {
    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid settings")
    }

    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file {:?}", path))?;
        Self::from_toml(&text).with_context(|| format!("Failed to parse {:?}", path))
    }

    /// Device limits of the render contexts
    pub fn device_limits(&self) -> DeviceLimits {
        DeviceLimits {
            max_texture_image_units: self.render.max_texture_units,
        }
    }

    /// Deadline of a draw request
    pub fn draw_timeout(&self) -> Duration {
        Duration::from_secs(self.render.draw_timeout_secs)
    }

    /// Options of the image loader
    pub fn loader_options(&self) -> LoaderOptions {
        LoaderOptions {
            timeout: Duration::from_secs(self.loader.timeout_secs),
            cross_origin: self.loader.cross_origin,
            page_origin: self.loader.page_origin.clone(),
            credentials: self.loader.credentials.clone(),
        }
    }
}
