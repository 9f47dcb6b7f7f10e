//! Layer configuration
//!
//! The host hands each layer a free-form JSON options bag. This module gives
//! it a typed shape: the `shader` block selecting and tuning a pipeline, the
//! `colorScale` (an image source, a list of colours or an object), the value
//! range of the data and loader hints. Unknown keys are ignored.

use glam::Vec3;
use serde::{Deserialize, Deserializer, Serialize};

use crate::colormap::{ColorStop, Colormap, ColormapError, ColormapOptions};
use crate::error::{RenderError, Result};

/// How normalized values are mapped onto the colormap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScaleType {
    /// `t` is used as is
    #[default]
    Linear,
    /// `t` is mapped through `log10(1 + 9t)`
    Log,
}

impl ScaleType {
    /// Integer code passed to fragment programs
    pub fn as_uniform(self) -> i32 {
        match self {
            ScaleType::Linear => 0,
            ScaleType::Log => 1,
        }
    }

    /// Apply the scale to a normalized value
    pub fn apply(self, t: f32) -> f32 {
        match self {
            ScaleType::Linear => t,
            ScaleType::Log => (1.0 + 9.0 * t).log10(),
        }
    }
}

/// CORS mode used when fetching cross-origin images
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CrossOrigin {
    /// Request without credentials
    Anonymous,
    /// Request with the configured credentials
    UseCredentials,
}

impl CrossOrigin {
    /// Parse an attribute-style value. Empty and unknown values mean anonymous.
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("use-credentials") {
            CrossOrigin::UseCredentials
        } else {
            CrossOrigin::Anonymous
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CrossOriginRepr {
    Flag(bool),
    Mode(String),
}

/// Deserialize `crossOrigin` given as `true`/`false` or as a mode string.
pub fn deserialize_cross_origin<'de, D>(deserializer: D) -> std::result::Result<Option<CrossOrigin>, D::Error>
where
    D: Deserializer<'de>,
{
    let repr = Option::<CrossOriginRepr>::deserialize(deserializer)?;
    Ok(match repr {
        None | Some(CrossOriginRepr::Flag(false)) => None,
        Some(CrossOriginRepr::Flag(true)) => Some(CrossOrigin::Anonymous),
        Some(CrossOriginRepr::Mode(mode)) => Some(CrossOrigin::parse(&mode)),
    })
}

/// Tunables understood by the draw commands.
///
/// Every field is optional; each command falls back to its own defaults.
/// The same shape appears in `shader`, in a `colorScale` object and as the
/// merged result of both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrawOptions {
    /// Linear or logarithmic colormap lookup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_type: Option<ScaleType>,
    /// Lower cut point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut_point_min: Option<f32>,
    /// Upper cut point
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cut_point_max: Option<f32>,
    /// Start of the colormap sub-range values are remapped onto
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remap_point_min: Option<f32>,
    /// End of the colormap sub-range values are remapped onto
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remap_point_max: Option<f32>,
    /// Turn pure black pixels transparent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_black_to_alpha: Option<bool>,
    /// Colour values through the colormap
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_color_scale: Option<bool>,
    /// Light the surface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_hillshading: Option<bool>,
    /// Horizontal size of a pixel in elevation units
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pixel_scale: Option<f32>,
    /// Multiplier applied to decoded elevations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elevation_scale: Option<f32>,
    /// Direction the light comes from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sun_direction: Option<Vec3>,
    /// Brightness added to every pixel
    #[serde(
        default,
        alias = "ambientLightIntesity",
        skip_serializing_if = "Option::is_none"
    )]
    pub ambient_light_intensity: Option<f32>,
    /// Brightness of surfaces facing the light
    #[serde(
        default,
        alias = "diffuseLightIntesity",
        skip_serializing_if = "Option::is_none"
    )]
    pub diffuse_light_intensity: Option<f32>,
    /// Enable soft shadows and ambient occlusion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadows: Option<bool>,
    /// Number of soft shadow and ambient iterations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shadow_iterations: Option<u32>,
    /// Render the lighting only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_color: Option<bool>,
    /// Smallest data value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f32>,
    /// Largest data value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f32>,
    /// Seed for the Monte Carlo lighting passes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl DrawOptions {
    /// Overlay `other` on top of `self`; fields set in `other` win.
    pub fn merged_with(&self, other: &DrawOptions) -> DrawOptions {
        DrawOptions {
            scale_type: other.scale_type.or(self.scale_type),
            cut_point_min: other.cut_point_min.or(self.cut_point_min),
            cut_point_max: other.cut_point_max.or(self.cut_point_max),
            remap_point_min: other.remap_point_min.or(self.remap_point_min),
            remap_point_max: other.remap_point_max.or(self.remap_point_max),
            set_black_to_alpha: other.set_black_to_alpha.or(self.set_black_to_alpha),
            apply_color_scale: other.apply_color_scale.or(self.apply_color_scale),
            apply_hillshading: other.apply_hillshading.or(self.apply_hillshading),
            pixel_scale: other.pixel_scale.or(self.pixel_scale),
            elevation_scale: other.elevation_scale.or(self.elevation_scale),
            sun_direction: other.sun_direction.or(self.sun_direction),
            ambient_light_intensity: other
                .ambient_light_intensity
                .or(self.ambient_light_intensity),
            diffuse_light_intensity: other
                .diffuse_light_intensity
                .or(self.diffuse_light_intensity),
            shadows: other.shadows.or(self.shadows),
            shadow_iterations: other.shadow_iterations.or(self.shadow_iterations),
            no_color: other.no_color.or(self.no_color),
            min_value: other.min_value.or(self.min_value),
            max_value: other.max_value.or(self.max_value),
            seed: other.seed.or(self.seed),
        }
    }
}

/// The `shader` block: pipeline selector plus its tunables
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShaderOptions {
    /// Pipeline name (`"hillshading"`, `"onepass"`, ...)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Pipeline tunables
    #[serde(flatten)]
    pub params: DrawOptions,
}

/// One entry of a colour list: a hex colour or a positioned `[value, "#hex"]` stop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorEntry {
    /// `"#rrggbb"`
    Hex(String),
    /// `[0.5, "#rrggbb"]`
    Stop(f32, String),
}

/// Object form of `colorScale`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorScaleSettings {
    /// Colours to interpolate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<ColorEntry>>,
    /// Table width and alpha options
    #[serde(flatten)]
    pub colormap: ColormapOptions,
    /// Draw tunables that travel with the colour scale
    #[serde(flatten)]
    pub params: DrawOptions,
}

/// The `colorScale` value in any of its accepted forms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorScaleConfig {
    /// Source of a pre-rendered colormap image (URL, data URL or path)
    Image(String),
    /// Colours spread evenly over a default-sized table
    Colors(Vec<ColorEntry>),
    /// Colours plus options
    Settings(ColorScaleSettings),
}

/// Where the colormap of a layer comes from
#[derive(Debug, Clone, PartialEq)]
pub enum ColormapSource {
    /// Built from colours in the configuration
    Table(Colormap),
    /// Has to be loaded as an image first
    Image(String),
}

impl ColorScaleConfig {
    /// Resolve the colormap described by this colour scale.
    ///
    /// Returns `Ok(None)` when no colours are given.
    pub fn colormap_source(&self) -> std::result::Result<Option<ColormapSource>, ColormapError> {
        match self {
            ColorScaleConfig::Image(src) => Ok(Some(ColormapSource::Image(src.clone()))),
            ColorScaleConfig::Colors(entries) => {
                build_from_entries(entries, &ColormapOptions::default())
            }
            ColorScaleConfig::Settings(settings) => match &settings.colors {
                Some(entries) => build_from_entries(entries, &settings.colormap),
                None => Ok(None),
            },
        }
    }

    /// Draw tunables carried by the object form
    pub fn params(&self) -> Option<&DrawOptions> {
        match self {
            ColorScaleConfig::Settings(settings) => Some(&settings.params),
            _ => None,
        }
    }
}

fn build_from_entries(
    entries: &[ColorEntry],
    options: &ColormapOptions,
) -> std::result::Result<Option<ColormapSource>, ColormapError> {
    if entries.is_empty() {
        return Ok(None);
    }

    let hex: Vec<&str> = entries
        .iter()
        .filter_map(|entry| match entry {
            ColorEntry::Hex(hex) => Some(hex.as_str()),
            ColorEntry::Stop(..) => None,
        })
        .collect();

    let colormap = if hex.len() == entries.len() {
        Colormap::from_hex_colors(&hex, options)?
    } else if hex.is_empty() {
        let stops = entries
            .iter()
            .filter_map(|entry| match entry {
                ColorEntry::Stop(position, hex) => Some(ColorStop::from_hex(*position, hex)),
                ColorEntry::Hex(_) => None,
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Colormap::from_stops(&stops, options)?
    } else {
        return Err(ColormapError::InvalidStop(
            "colours and positioned stops cannot be mixed".to_string(),
        ));
    };

    Ok(Some(ColormapSource::Table(colormap)))
}

/// Normalized cut points in 0..1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CutOffPoints {
    /// Lower cut point
    pub min: f32,
    /// Upper cut point
    pub max: f32,
}

impl Default for CutOffPoints {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl CutOffPoints {
    /// Scale to byte values, rounding: `[0, 1] -> [0, 255]`
    pub fn to_byte_range(self) -> CutOffPoints {
        CutOffPoints {
            min: (self.min * 255.0).round(),
            max: (self.max * 255.0).round(),
        }
    }
}

/// Normalize cut points given in data units against the data range.
///
/// Without a range, or with an empty one, nothing is cut.
///
/// ```
/// use terrashade_core::cut_off_points;
/// let cut = cut_off_points(Some(0.0), Some(1000.0), Some(500.0), Some(1000.0));
/// assert_eq!((cut.min, cut.max), (0.5, 1.0));
/// ```
pub fn cut_off_points(
    min: Option<f64>,
    max: Option<f64>,
    cut_min: Option<f64>,
    cut_max: Option<f64>,
) -> CutOffPoints {
    let (min, max) = match (min, max) {
        (Some(min), Some(max)) if min.is_finite() && max.is_finite() && max > min => (min, max),
        _ => return CutOffPoints::default(),
    };

    let cut_min = cut_min.filter(|v| v.is_finite()).unwrap_or(min).max(min);
    let cut_max = cut_max.filter(|v| v.is_finite()).unwrap_or(max).min(max);
    let range = max - min;

    CutOffPoints {
        min: ((cut_min - min) / range) as f32,
        max: ((cut_max - min) / range) as f32,
    }
}

/// Options bag of an image layer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayerConfig {
    /// Pipeline selection and tunables
    #[serde(default)]
    pub shader: ShaderOptions,
    /// Colour scale
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_scale: Option<ColorScaleConfig>,
    /// Smallest data value
    #[serde(default, rename = "minvalue", skip_serializing_if = "Option::is_none")]
    pub min_value: Option<f64>,
    /// Largest data value
    #[serde(default, rename = "maxvalue", skip_serializing_if = "Option::is_none")]
    pub max_value: Option<f64>,
    /// Resample the input image by this factor before drawing
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_scale: Option<f64>,
    /// CORS mode for cross-origin images
    #[serde(
        default,
        deserialize_with = "deserialize_cross_origin",
        skip_serializing_if = "Option::is_none"
    )]
    pub cross_origin: Option<CrossOrigin>,
}

impl LayerConfig {
    /// Parse a JSON options bag
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RenderError::invalid_config(e.to_string()))
    }

    /// Convert an already parsed JSON value
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| RenderError::invalid_config(e.to_string()))
    }

    /// Pipeline name from `shader.type`
    pub fn pipeline_name(&self) -> Option<&str> {
        self.shader.kind.as_deref()
    }

    /// Cut points normalized against `minvalue`/`maxvalue`
    pub fn cut_off_points(&self) -> CutOffPoints {
        let params = self.color_scale.as_ref().and_then(ColorScaleConfig::params);
        cut_off_points(
            self.min_value,
            self.max_value,
            params.and_then(|p| p.cut_point_min).map(f64::from),
            params.and_then(|p| p.cut_point_max).map(f64::from),
        )
    }

    /// Flatten the configuration into the options a draw command reads.
    ///
    /// Later sources win: data range, colour scale, shader, cut points.
    /// The cut points are normalized to 0..1.
    pub fn draw_options(&self) -> DrawOptions {
        let base = DrawOptions {
            min_value: self.min_value.map(|v| v as f32),
            max_value: self.max_value.map(|v| v as f32),
            ..DrawOptions::default()
        };

        let mut merged = match self.color_scale.as_ref().and_then(ColorScaleConfig::params) {
            Some(params) => base.merged_with(params),
            None => base,
        };
        merged = merged.merged_with(&self.shader.params);

        let cut = self.cut_off_points();
        merged.cut_point_min = Some(cut.min);
        merged.cut_point_max = Some(cut.max);
        merged
    }

    /// Check values that would make drawing meaningless
    pub fn validate(&self) -> Result<()> {
        if let Some(scale) = self.image_scale {
            if !scale.is_finite() {
                return Err(RenderError::invalid_config(format!(
                    "imageScale must be finite, got {}",
                    scale
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min_value, self.max_value) {
            if min > max {
                return Err(RenderError::invalid_config(format!(
                    "minvalue {} is larger than maxvalue {}",
                    min, max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_off_points_without_range() {
        assert_eq!(cut_off_points(None, Some(10.0), Some(1.0), None), CutOffPoints::default());
        assert_eq!(
            cut_off_points(Some(5.0), Some(5.0), None, None),
            CutOffPoints::default()
        );
    }

    #[test]
    fn test_cut_off_points_clamps_to_range() {
        let cut = cut_off_points(Some(0.0), Some(100.0), Some(-50.0), Some(150.0));
        assert_eq!(cut, CutOffPoints { min: 0.0, max: 1.0 });

        let cut = cut_off_points(Some(100.0), Some(200.0), Some(125.0), Some(175.0));
        assert_eq!(cut, CutOffPoints { min: 0.25, max: 0.75 });
    }

    #[test]
    fn test_byte_range_rounds() {
        let bytes = CutOffPoints { min: 0.5, max: 1.0 }.to_byte_range();
        assert_eq!(bytes, CutOffPoints { min: 128.0, max: 255.0 });
    }

    #[test]
    fn test_scale_type_log() {
        assert_eq!(ScaleType::Log.apply(0.0), 0.0);
        assert!((ScaleType::Log.apply(1.0) - 1.0).abs() < 1e-6);
        assert_eq!(ScaleType::Linear.as_uniform(), 0);
        assert_eq!(ScaleType::Log.as_uniform(), 1);
    }

    #[test]
    fn test_layer_config_parses_host_options() {
        let config = LayerConfig::from_json(
            r##"{
                "shader": { "type": "hillshading", "shadows": true, "elevationScale": 2.0 },
                "colorScale": { "colors": ["#000000", "#ffffff"], "scaleType": "log", "cutPointMin": 250 },
                "minvalue": 0,
                "maxvalue": 1000,
                "crossOrigin": true,
                "someHostKey": 42
            }"##,
        )
        .unwrap();

        assert_eq!(config.pipeline_name(), Some("hillshading"));
        assert_eq!(config.shader.params.shadows, Some(true));
        assert_eq!(config.cross_origin, Some(CrossOrigin::Anonymous));
        assert_eq!(config.min_value, Some(0.0));

        let options = config.draw_options();
        assert_eq!(options.scale_type, Some(ScaleType::Log));
        assert_eq!(options.elevation_scale, Some(2.0));
        assert_eq!(options.cut_point_min, Some(0.25));
        assert_eq!(options.cut_point_max, Some(1.0));
    }

    #[test]
    fn test_shader_fields_override_color_scale() {
        let config = LayerConfig::from_json(
            r##"{
                "shader": { "scaleType": "linear" },
                "colorScale": { "colors": ["#000000"], "scaleType": "log" }
            }"##,
        )
        .unwrap();
        assert_eq!(config.draw_options().scale_type, Some(ScaleType::Linear));
    }

    #[test]
    fn test_misspelled_intensity_alias() {
        let config =
            LayerConfig::from_json(r#"{ "shader": { "ambientLightIntesity": 0.7 } }"#).unwrap();
        assert_eq!(config.shader.params.ambient_light_intensity, Some(0.7));
    }

    #[test]
    fn test_color_scale_forms() {
        let image: ColorScaleConfig = serde_json::from_str(r#""data:image/png;base64,AAAA""#).unwrap();
        assert!(matches!(
            image.colormap_source().unwrap(),
            Some(ColormapSource::Image(_))
        ));

        let list: ColorScaleConfig = serde_json::from_str(r##"["#ff0000", "#0000ff"]"##).unwrap();
        match list.colormap_source().unwrap() {
            Some(ColormapSource::Table(colormap)) => assert_eq!(colormap.len(), 256),
            other => panic!("unexpected source: {:?}", other),
        }

        let stops: ColorScaleConfig =
            serde_json::from_str(r##"[[0, "#000000"], [1, "#FFFFFF"]]"##).unwrap();
        assert!(matches!(
            stops.colormap_source().unwrap(),
            Some(ColormapSource::Table(_))
        ));

        let empty: ColorScaleConfig = serde_json::from_str("[]").unwrap();
        assert_eq!(empty.colormap_source().unwrap(), None);

        let object: ColorScaleConfig =
            serde_json::from_str(r##"{ "colors": ["#000000", "#ffffff"], "width": 16, "prefixZeroAlpha": true }"##)
                .unwrap();
        match object.colormap_source().unwrap() {
            Some(ColormapSource::Table(colormap)) => {
                assert_eq!(colormap.len(), 16);
                assert_eq!(colormap.colors()[0][3], 0);
            }
            other => panic!("unexpected source: {:?}", other),
        }
    }

    #[test]
    fn test_mixed_entries_rejected() {
        let mixed: ColorScaleConfig =
            serde_json::from_str(r##"["#000000", [1, "#FFFFFF"]]"##).unwrap();
        assert!(matches!(
            mixed.colormap_source(),
            Err(ColormapError::InvalidStop(_))
        ));
    }

    #[test]
    fn test_cross_origin_modes() {
        let config = LayerConfig::from_json(r#"{ "crossOrigin": "use-credentials" }"#).unwrap();
        assert_eq!(config.cross_origin, Some(CrossOrigin::UseCredentials));
        let config = LayerConfig::from_json(r#"{ "crossOrigin": false }"#).unwrap();
        assert_eq!(config.cross_origin, None);
        let config = LayerConfig::from_json(r#"{ "crossOrigin": "" }"#).unwrap();
        assert_eq!(config.cross_origin, Some(CrossOrigin::Anonymous));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let config = LayerConfig {
            min_value: Some(10.0),
            max_value: Some(1.0),
            ..LayerConfig::default()
        };
        assert!(matches!(config.validate(), Err(RenderError::InvalidConfig(_))));
    }
}
