//! Where an image comes from

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;
use serde::Deserialize;

/// An image to load
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "String")]
pub enum ImageSource {
    /// `http://` or `https://` URL
    Url(String),
    /// `data:` URI
    DataUrl(String),
    /// File on disk
    Path(PathBuf),
    /// Already decoded
    Image(Arc<RgbaImage>),
}

impl ImageSource {
    /// Classify a source string. Anything that is not a URL is a path.
    pub fn parse(src: &str) -> Self {
        let lower = src.trim_start().to_ascii_lowercase();
        if lower.starts_with("data:") {
            ImageSource::DataUrl(src.trim().to_string())
        } else if lower.starts_with("http://") || lower.starts_with("https://") {
            ImageSource::Url(src.trim().to_string())
        } else if let Some(path) = src.strip_prefix("file://") {
            ImageSource::Path(PathBuf::from(path))
        } else {
            ImageSource::Path(PathBuf::from(src))
        }
    }

    /// Short description for logs and errors; data URIs are truncated
    pub fn describe(&self) -> String {
        match self {
            ImageSource::Url(url) => url.clone(),
            ImageSource::DataUrl(url) => {
                let head: String = url.chars().take(32).collect();
                format!("{}... ({} bytes)", head, url.len())
            }
            ImageSource::Path(path) => path.display().to_string(),
            ImageSource::Image(image) => format!("<decoded {}x{}>", image.width(), image.height()),
        }
    }
}

impl From<String> for ImageSource {
    fn from(src: String) -> Self {
        ImageSource::parse(&src)
    }
}

impl From<&str> for ImageSource {
    fn from(src: &str) -> Self {
        ImageSource::parse(src)
    }
}

impl From<RgbaImage> for ImageSource {
    fn from(image: RgbaImage) -> Self {
        ImageSource::Image(Arc::new(image))
    }
}

impl fmt::Display for ImageSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_kinds() {
        assert!(matches!(ImageSource::parse("https://example.com/a.png"), ImageSource::Url(_)));
        assert!(matches!(ImageSource::parse("HTTP://example.com/a.png"), ImageSource::Url(_)));
        assert!(matches!(ImageSource::parse("data:image/png;base64,AA"), ImageSource::DataUrl(_)));
        match ImageSource::parse("file:///tmp/a.png") {
            ImageSource::Path(path) => assert_eq!(path, PathBuf::from("/tmp/a.png")),
            other => panic!("unexpected source: {:?}", other),
        }
        assert!(matches!(ImageSource::parse("tiles/0/0.png"), ImageSource::Path(_)));
    }

    #[test]
    fn test_describe_truncates_data_urls() {
        let url = format!("data:image/png;base64,{}", "A".repeat(1000));
        let description = ImageSource::parse(&url).describe();
        assert!(description.len() < 64);
        assert!(description.contains("1022 bytes"));
    }

    #[test]
    fn test_deserialize_from_string() {
        let source: ImageSource = serde_json::from_str(r#""https://example.com/t.png""#).unwrap();
        assert!(matches!(source, ImageSource::Url(_)));
    }
}
