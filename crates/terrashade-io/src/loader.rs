//! Async image loading
//!
//! Every load honours a timeout and the cancellation token of the request
//! that asked for it. Failures come back as `ImageLoadFailed`; nothing is
//! retried.

use std::time::Duration;

use image::RgbaImage;
use reqwest::header::{COOKIE, ORIGIN};
use terrashade_core::{CancellationToken, CrossOrigin, RenderError, Result};
use tracing::{debug, trace};

use crate::cors::cors_mode;
use crate::data_url::decode_data_url;
use crate::source::ImageSource;

/// How remote images are fetched
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderOptions {
    /// Upper bound for a single load
    pub timeout: Duration,
    /// CORS mode for cross-origin URLs; `None` sends plain requests
    pub cross_origin: Option<CrossOrigin>,
    /// Origin of the page the layer lives on, e.g. `https://maps.example.com`
    pub page_origin: Option<String>,
    /// `Cookie` header sent with `use-credentials` requests
    pub credentials: Option<String>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            cross_origin: None,
            page_origin: None,
            credentials: None,
        }
    }
}

/// Loads and decodes images into RGBA8
#[derive(Debug, Clone)]
pub struct ImageLoader {
    client: reqwest::Client,
    options: LoaderOptions,
}

impl ImageLoader {
    /// Create a loader with its own HTTP client
    pub fn new(options: LoaderOptions) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| RenderError::image_load("http client", e))?;
        Ok(Self { client, options })
    }

    /// Loader options
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// A loader sharing this one's HTTP client with another CORS mode
    pub fn with_cross_origin(&self, cross_origin: Option<CrossOrigin>) -> Self {
        Self {
            client: self.client.clone(),
            options: LoaderOptions {
                cross_origin,
                ..self.options.clone()
            },
        }
    }

    /// The CORS mode `url` would be requested with
    pub fn cors_mode(&self, url: &str) -> Option<CrossOrigin> {
        cors_mode(
            url,
            self.options.cross_origin,
            self.options.page_origin.as_deref(),
        )
    }

    /// Load and decode `source`, giving up when `cancel` fires or the timeout passes
    pub async fn load(&self, source: &ImageSource, cancel: &CancellationToken) -> Result<RgbaImage> {
        cancel.check()?;
        let timeout = self.options.timeout;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Load of {} cancelled", source);
                Err(RenderError::Cancelled)
            }
            result = tokio::time::timeout(timeout, self.load_inner(source)) => match result {
                Ok(image) => image,
                Err(_) => {
                    debug!("Load of {} timed out after {:?}", source, timeout);
                    Err(RenderError::TimedOut(timeout))
                }
            },
        }
    }

    async fn load_inner(&self, source: &ImageSource) -> Result<RgbaImage> {
        let bytes = match source {
            ImageSource::Image(image) => return Ok(image.as_ref().clone()),
            ImageSource::DataUrl(url) => decode_data_url(url)?,
            ImageSource::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|e| RenderError::image_load(source.describe(), e))?,
            ImageSource::Url(url) => self.fetch(url).await?,
        };
        trace!("Decoding {} bytes from {}", bytes.len(), source);

        let image = image::load_from_memory(&bytes)
            .map_err(|e| RenderError::image_load(source.describe(), e))?
            .to_rgba8();
        if image.width() == 0 || image.height() == 0 {
            return Err(RenderError::image_load(source.describe(), "image is empty"));
        }
        debug!("Loaded {}x{} image from {}", image.width(), image.height(), source);
        Ok(image)
    }

    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let mut request = self.client.get(url);

        if let Some(mode) = self.cors_mode(url) {
            trace!("Requesting {} with CORS mode {:?}", url, mode);
            if let Some(origin) = &self.options.page_origin {
                request = request.header(ORIGIN, origin.as_str());
            }
            if let (CrossOrigin::UseCredentials, Some(credentials)) = (mode, &self.options.credentials) {
                request = request.header(COOKIE, credentials.as_str());
            }
        }

        let response = request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| RenderError::image_load(url, e))?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| RenderError::image_load(url, e))?;
        Ok(bytes.to_vec())
    }
}

/// Load a single image with a one-off loader
pub async fn load_image(
    src: impl Into<ImageSource>,
    options: LoaderOptions,
    cancel: &CancellationToken,
) -> Result<RgbaImage> {
    ImageLoader::new(options)?.load(&src.into(), cancel).await
}
