//! Error types for rendering, loading and configuration.
//!
//! Every failure the pipeline can run into is surfaced as a `RenderError`
//! value. Nothing is swallowed into the log only.

use std::time::Duration;

use crate::colormap::ColormapError;

/// Result type alias for rendering operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Uniform error type for the rendering core.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// A shader command could not be assembled into an executable program
    #[error("Shader compilation failed for '{program}': {reason}")]
    ShaderCompileFailed {
        /// Name of the fragment program
        program: String,
        /// What was wrong with the command
        reason: String,
    },

    /// The requested pipeline (`shader.type`) is not known
    #[error("Unsupported pipeline: {0}")]
    UnsupportedPipeline(String),

    /// A bounded resource such as the texture unit pool ran out
    #[error("Resource exhausted: {resource} (capacity {capacity})")]
    ResourceExhausted {
        /// The exhausted resource
        resource: &'static str,
        /// Total capacity of the resource
        capacity: usize,
    },

    /// An image could not be fetched or decoded
    #[error("Failed to load image '{src}': {reason}")]
    ImageLoadFailed {
        /// Description of the image source
        src: String,
        /// Why loading failed
        reason: String,
    },

    /// A per-invocation variable was not supplied when drawing
    #[error("Draw command '{command}' is missing variable '{name}'")]
    MissingBinding {
        /// Name of the fragment program of the command
        command: String,
        /// Name of the missing variable
        name: String,
    },

    /// A pass samples the framebuffer it renders into
    #[error("Draw command '{0}' reads from its own render target")]
    FeedbackLoop(String),

    /// Image data was malformed (zero size, wrong length, ...)
    #[error("Invalid image: {0}")]
    InvalidImage(String),

    /// Configuration values were out of range or inconsistent
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Colormap construction failed
    #[error("Colormap error: {0}")]
    Colormap(#[from] ColormapError),

    /// The draw request was cancelled by a newer request or by the caller
    #[error("Render cancelled")]
    Cancelled,

    /// The draw request did not finish within its deadline
    #[error("Render timed out after {0:?}")]
    TimedOut(Duration),
}

impl RenderError {
    /// Creates an image load error.
    pub fn image_load(src: impl Into<String>, reason: impl ToString) -> Self {
        Self::ImageLoadFailed {
            src: src.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a shader compile error.
    pub fn shader_compile(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ShaderCompileFailed {
            program: program.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid configuration error.
    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Returns true if the error means the request was abandoned rather than failed.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled | Self::TimedOut(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RenderError::UnsupportedPipeline("sparkle".to_string());
        assert_eq!(err.to_string(), "Unsupported pipeline: sparkle");
    }

    #[test]
    fn test_resource_exhausted_display() {
        let err = RenderError::ResourceExhausted {
            resource: "texture units",
            capacity: 15,
        };
        let err_str = err.to_string();
        assert!(err_str.contains("texture units"));
        assert!(err_str.contains("15"));
    }

    #[test]
    fn test_cancellation_classification() {
        assert!(RenderError::Cancelled.is_cancellation());
        assert!(RenderError::TimedOut(Duration::from_secs(1)).is_cancellation());
        assert!(!RenderError::image_load("a.png", "404").is_cancellation());
    }
}
