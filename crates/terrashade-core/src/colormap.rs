//! Colormap construction
//!
//! A colormap is a 1-D lookup table of RGBA colours. It is built from a list
//! of hex colours (spread evenly), from positioned colour stops, or taken
//! from the first row of a pre-rendered image, and uploaded to the renderer
//! as an N x 1 texture.

use image::{Rgba as ImageRgba, RgbaImage};
use serde::{Deserialize, Serialize};

/// Default number of entries in a generated colormap
pub const DEFAULT_COLORMAP_WIDTH: usize = 256;

/// An RGBA colour with 8 bits per channel
pub type Rgba = [u8; 4];

/// Colormap construction errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ColormapError {
    /// The string is not a `#rgb`, `#rrggbb` or `#rrggbbaa` colour
    #[error("Invalid hex colour: {0}")]
    InvalidHex(String),

    /// No colours were given
    #[error("Colormap needs at least one colour")]
    Empty,

    /// A stop had a non-finite position, or stops and plain colours were mixed
    #[error("Invalid colour stop: {0}")]
    InvalidStop(String),

    /// A colormap of width zero was requested
    #[error("Colormap width must be positive")]
    ZeroWidth,
}

/// Convert a colour in hex format to RGBA. Alpha defaults to 255.
///
/// ```
/// use terrashade_core::hex_to_rgba;
/// assert_eq!(hex_to_rgba("#ffeeaa80").unwrap(), [255, 238, 170, 128]);
/// ```
pub fn hex_to_rgba(hex: &str) -> Result<Rgba, ColormapError> {
    let invalid = || ColormapError::InvalidHex(hex.to_string());
    let digits = hex.trim().strip_prefix('#').ok_or_else(invalid)?;
    if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }

    let expanded: String = match digits.len() {
        3 => digits.chars().flat_map(|c| [c, c]).collect(),
        6 | 8 => digits.to_string(),
        _ => return Err(invalid()),
    };

    let channel = |i: usize| u8::from_str_radix(&expanded[i..i + 2], 16).map_err(|_| invalid());
    let alpha = if expanded.len() == 8 { channel(6)? } else { 255 };
    Ok([channel(0)?, channel(2)?, channel(4)?, alpha])
}

/// Interpolate `color1` towards `color2` by `factor` (0..1), rounding each channel.
pub fn interpolate_by_factor(color1: Rgba, color2: Rgba, factor: f32) -> Rgba {
    let mut result = color1;
    for i in 0..4 {
        let a = color1[i] as f32;
        let b = color2[i] as f32;
        result[i] = (a + factor * (b - a)).round().clamp(0.0, 255.0) as u8;
    }
    result
}

/// Linearly interpolate a list of colours into exactly `steps` entries.
///
/// Each segment between two neighbouring colours gets `steps / segments`
/// entries; the remainder is handed out one at a time starting from the
/// centre segment and alternating outwards. Both ends of every segment are
/// included, so neighbouring segments repeat their shared colour.
pub fn interpolate_colors(colors: &[Rgba], steps: usize) -> Vec<Rgba> {
    match colors.len() {
        0 => return Vec::new(),
        1 => return vec![colors[0]; steps],
        _ => {}
    }

    let segments = colors.len() - 1;
    let mut per_segment = vec![steps / segments; segments];
    let mut sum: usize = per_segment.iter().sum();

    let center = (segments / 2) as isize;
    let mut cur = center;
    let mut dir = -1isize;
    let mut jump = 1isize;
    while sum < steps {
        per_segment[cur as usize] += 1;
        sum += 1;
        cur += dir * jump;
        dir = -dir;
        jump += 1;
        if cur < 0 || cur >= segments as isize {
            cur = center;
        }
    }

    let mut interpolated = Vec::with_capacity(steps);
    for (col, &count) in per_segment.iter().enumerate() {
        let step_factor = if count > 1 {
            1.0 / (count - 1) as f32
        } else {
            0.0
        };
        for i in 0..count {
            interpolated.push(interpolate_by_factor(
                colors[col],
                colors[col + 1],
                step_factor * i as f32,
            ));
        }
    }
    interpolated
}

/// A colour pinned to a position on the colormap
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorStop {
    /// Position, usually in 0..1
    pub position: f32,
    /// Colour at the position
    pub color: Rgba,
}

impl ColorStop {
    /// Create a stop from a position and a hex colour
    pub fn from_hex(position: f32, hex: &str) -> Result<Self, ColormapError> {
        if !position.is_finite() {
            return Err(ColormapError::InvalidStop(format!(
                "position {} for {}",
                position, hex
            )));
        }
        Ok(Self {
            position,
            color: hex_to_rgba(hex)?,
        })
    }
}

/// Options applied when generating a colormap
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ColormapOptions {
    /// Number of entries
    pub width: usize,
    /// Make the first entry fully transparent
    pub prefix_zero_alpha: bool,
    /// Make the last entry fully transparent
    pub suffix_zero_alpha: bool,
}

impl Default for ColormapOptions {
    fn default() -> Self {
        Self {
            width: DEFAULT_COLORMAP_WIDTH,
            prefix_zero_alpha: false,
            suffix_zero_alpha: false,
        }
    }
}

/// 1-D colour lookup table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Colormap {
    colors: Vec<Rgba>,
}

impl Colormap {
    /// Wrap an explicit list of table entries
    pub fn from_colors(colors: Vec<Rgba>) -> Result<Self, ColormapError> {
        if colors.is_empty() {
            return Err(ColormapError::Empty);
        }
        Ok(Self { colors })
    }

    /// Build a table from hex colours spread evenly over `options.width` entries
    pub fn from_hex_colors<S: AsRef<str>>(
        hex_colors: &[S],
        options: &ColormapOptions,
    ) -> Result<Self, ColormapError> {
        if options.width == 0 {
            return Err(ColormapError::ZeroWidth);
        }
        let colors = hex_colors
            .iter()
            .map(|hex| hex_to_rgba(hex.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        if colors.is_empty() {
            return Err(ColormapError::Empty);
        }

        let mut colormap = Self::from_colors(interpolate_colors(&colors, options.width))?;
        colormap.apply_alpha_options(options);
        Ok(colormap)
    }

    /// Build a table by sampling positioned stops linearly.
    ///
    /// Entry `i` samples position `min + (max - min) * i / (width - 1)`
    /// where min and max are the outermost stop positions.
    pub fn from_stops(stops: &[ColorStop], options: &ColormapOptions) -> Result<Self, ColormapError> {
        if options.width == 0 {
            return Err(ColormapError::ZeroWidth);
        }
        if stops.is_empty() {
            return Err(ColormapError::Empty);
        }

        let mut sorted = stops.to_vec();
        sorted.sort_by(|a, b| a.position.total_cmp(&b.position));
        let first = sorted[0].position;
        let last = sorted[sorted.len() - 1].position;

        let colors = (0..options.width)
            .map(|i| {
                let t = if options.width > 1 {
                    i as f32 / (options.width - 1) as f32
                } else {
                    0.0
                };
                sample_stops(&sorted, first + (last - first) * t)
            })
            .collect();

        let mut colormap = Self::from_colors(colors)?;
        colormap.apply_alpha_options(options);
        Ok(colormap)
    }

    /// Take the first row of a pre-rendered colormap image
    pub fn from_image(image: &RgbaImage) -> Result<Self, ColormapError> {
        let colors = (0..image.width())
            .filter(|_| image.height() > 0)
            .map(|x| image.get_pixel(x, 0).0)
            .collect();
        Self::from_colors(colors)
    }

    /// A black to white ramp
    pub fn grayscale(width: usize) -> Self {
        let width = width.max(1);
        let colors = interpolate_colors(&[[0, 0, 0, 255], [255, 255, 255, 255]], width);
        Self { colors }
    }

    fn apply_alpha_options(&mut self, options: &ColormapOptions) {
        if options.prefix_zero_alpha {
            if let Some(first) = self.colors.first_mut() {
                first[3] = 0;
            }
        }
        if options.suffix_zero_alpha {
            if let Some(last) = self.colors.last_mut() {
                last[3] = 0;
            }
        }
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Always false; a colormap has at least one entry
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// All entries
    pub fn colors(&self) -> &[Rgba] {
        &self.colors
    }

    /// Nearest-entry lookup of a normalized value in 0..1
    pub fn lookup(&self, t: f32) -> Rgba {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let index = (t * (self.colors.len() - 1) as f32).floor() as usize;
        self.colors[index.min(self.colors.len() - 1)]
    }

    /// Render the table as an N x 1 image
    pub fn to_image(&self) -> RgbaImage {
        RgbaImage::from_fn(self.colors.len() as u32, 1, |x, _| {
            ImageRgba(self.colors[x as usize])
        })
    }
}

fn sample_stops(sorted: &[ColorStop], position: f32) -> Rgba {
    let first = &sorted[0];
    if position <= first.position {
        return first.color;
    }
    for pair in sorted.windows(2) {
        let (a, b) = (&pair[0], &pair[1]);
        if position <= b.position {
            let span = b.position - a.position;
            let factor = if span > 0.0 {
                (position - a.position) / span
            } else {
                1.0
            };
            return interpolate_by_factor(a.color, b.color, factor);
        }
    }
    sorted[sorted.len() - 1].color
}
