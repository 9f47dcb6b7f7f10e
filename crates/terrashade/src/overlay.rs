//! Image overlay layer
//!
//! An overlay owns the options bag of one raster layer, the image it points
//! to and the canvas last drawn for it. Options are patched with
//! [`ImageOverlay::update_options`], which redraws.
//!
//! Each draw request runs under its own cancellation token. Starting a new
//! request cancels the one in flight, and only the newest request may commit
//! its canvas; an older one reports [`DrawOutcome::Superseded`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use terrashade_core::{
    CancellationToken, ColorScaleConfig, Colormap, ColormapSource, CrossOrigin, LayerConfig,
    RenderError,
};
use terrashade_io::{scale_image, ImageLoader, ImageSource};
use terrashade_render::{draw_layer, DeviceLimits, RenderContext};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::settings::AppSettings;

/// Errors of an overlay
#[derive(Debug, Error)]
pub enum OverlayError {
    /// Loading, configuration or rendering failed
    #[error(transparent)]
    Render(#[from] RenderError),

    /// Options were not a JSON object
    #[error("Layer options must be a JSON object, got: {0}")]
    InvalidOptions(String),

    /// The render task panicked or was aborted
    #[error("Render task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Result type of overlay operations
pub type Result<T> = std::result::Result<T, OverlayError>;

/// What happened to a draw request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// The canvas of this request is now the overlay's canvas
    Committed {
        /// Request number
        generation: u64,
    },
    /// A newer request started before this one finished
    Superseded {
        /// Request number
        generation: u64,
    },
}

#[derive(Debug, Clone, PartialEq)]
struct ImageKey {
    url: String,
    scale: Option<f64>,
    cross_origin: Option<CrossOrigin>,
}

#[derive(Debug)]
struct Layer {
    url: String,
    options: Map<String, Value>,
    config: LayerConfig,
}

#[derive(Debug, Default)]
struct Cache {
    image: Option<(ImageKey, Arc<RgbaImage>)>,
    colormap: Option<(Option<ColorScaleConfig>, Option<Arc<Colormap>>)>,
}

/// A raster layer drawn through the render pipelines
#[derive(Debug)]
pub struct ImageOverlay {
    layer: Mutex<Layer>,
    cache: Mutex<Cache>,
    loader: ImageLoader,
    limits: DeviceLimits,
    timeout: Duration,
    generation: AtomicU64,
    in_flight: Mutex<Option<CancellationToken>>,
    canvas: RwLock<Option<Arc<RgbaImage>>>,
    committed: watch::Sender<u64>,
}

fn into_object(options: Value) -> Result<Map<String, Value>> {
    match options {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(OverlayError::InvalidOptions(other.to_string())),
    }
}

fn parse_config(options: &Map<String, Value>) -> Result<LayerConfig> {
    let config = LayerConfig::from_value(Value::Object(options.clone()))?;
    config.validate()?;
    Ok(config)
}

impl ImageOverlay {
    /// Create an overlay for the image at `url`. Nothing is loaded until the first draw.
    pub fn new(url: impl Into<String>, options: Value, settings: &AppSettings) -> Result<Self> {
        let options = into_object(options)?;
        let config = parse_config(&options)?;
        let (committed, _) = watch::channel(0);

        Ok(Self {
            layer: Mutex::new(Layer {
                url: url.into(),
                options,
                config,
            }),
            cache: Mutex::new(Cache::default()),
            loader: ImageLoader::new(settings.loader_options())?,
            limits: settings.device_limits(),
            timeout: settings.draw_timeout(),
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(None),
            canvas: RwLock::new(None),
            committed,
        })
    }

    /// URL of the image
    pub fn url(&self) -> String {
        self.layer.lock().url.clone()
    }

    /// Current options bag
    pub fn options(&self) -> Value {
        Value::Object(self.layer.lock().options.clone())
    }

    /// Current options, parsed
    pub fn config(&self) -> LayerConfig {
        self.layer.lock().config.clone()
    }

    /// Number of the latest draw request
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// The last committed canvas
    pub fn canvas(&self) -> Option<Arc<RgbaImage>> {
        self.canvas.read().clone()
    }

    /// Loader for the current options; a layer `crossOrigin` overrides the configured mode
    pub fn loader(&self) -> ImageLoader {
        self.loader_for(&self.layer.lock().config)
    }

    fn loader_for(&self, config: &LayerConfig) -> ImageLoader {
        let cross_origin = config.cross_origin.or(self.loader.options().cross_origin);
        self.loader.with_cross_origin(cross_origin)
    }

    /// Receives the generation of every committed draw
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.committed.subscribe()
    }

    /// Cancel the draw request in flight, if any
    pub fn cancel(&self) {
        if let Some(token) = self.in_flight.lock().as_ref() {
            token.cancel();
        }
    }

    /// Merge `patch` into the options and redraw.
    ///
    /// Keys of `patch` replace keys of the current options. An object
    /// `colorScale` is merged into a previous object `colorScale` instead. A
    /// `url` key points the overlay at another image. Invalid options are
    /// rejected and leave the overlay unchanged.
    pub async fn update_options(&self, patch: Value) -> Result<DrawOutcome> {
        let mut patch = into_object(patch)?;
        {
            let mut layer = self.layer.lock();

            let merged_color_scale = match (patch.get("colorScale"), layer.options.get("colorScale")) {
                (Some(Value::Object(new)), Some(Value::Object(old))) => {
                    let mut merged = old.clone();
                    merged.extend(new.clone());
                    Some(Value::Object(merged))
                }
                _ => None,
            };
            if let Some(color_scale) = merged_color_scale {
                patch.insert("colorScale".to_string(), color_scale);
            }

            let mut url = layer.url.clone();
            let mut options = layer.options.clone();
            for (key, value) in patch {
                match value {
                    Value::String(new_url) if key == "url" => url = new_url,
                    value => {
                        options.insert(key, value);
                    }
                }
            }

            let config = parse_config(&options)?;
            if url != layer.url {
                info!("Overlay image changed to {}", url);
            }
            *layer = Layer {
                url,
                options,
                config,
            };
        }

        self.draw().await
    }

    /// Load what is missing and draw the layer.
    ///
    /// Cancels the request in flight. The canvas is only replaced when no
    /// newer request started in the meantime.
    pub async fn draw(&self) -> Result<DrawOutcome> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();
        if let Some(previous) = self.in_flight.lock().replace(token.clone()) {
            previous.cancel();
        }

        let (url, config) = {
            let layer = self.layer.lock();
            (layer.url.clone(), layer.config.clone())
        };
        debug!("Draw request {} for {}", generation, url);

        let result = match tokio::time::timeout(self.timeout, self.render(&url, config, &token)).await {
            Ok(result) => result,
            Err(_) => {
                token.cancel();
                Err(RenderError::TimedOut(self.timeout).into())
            }
        };

        let superseded = DrawOutcome::Superseded { generation };
        match result {
            Ok(image) => {
                let mut canvas = self.canvas.write();
                if self.generation() != generation {
                    debug!("Draw request {} superseded", generation);
                    return Ok(superseded);
                }
                *canvas = Some(Arc::new(image));
                drop(canvas);
                self.committed.send_replace(generation);
                debug!("Draw request {} committed", generation);
                Ok(DrawOutcome::Committed { generation })
            }
            Err(OverlayError::Render(e)) if e.is_cancellation() && self.generation() != generation => {
                debug!("Draw request {} superseded", generation);
                Ok(superseded)
            }
            Err(e) => Err(e),
        }
    }

    async fn render(
        &self,
        url: &str,
        config: LayerConfig,
        token: &CancellationToken,
    ) -> Result<RgbaImage> {
        let loader = self.loader_for(&config);
        let image = self.source_image(&loader, url, config.image_scale, token).await?;
        let colormap = self.colormap(&loader, &config, token).await?;

        let limits = self.limits;
        let task_token = token.clone();
        let canvas = tokio::task::spawn_blocking(move || {
            let ctx = RenderContext::with_cancellation(limits, task_token);
            draw_layer(&ctx, &image, colormap.as_deref(), &config)
        })
        .await??;
        Ok(canvas)
    }

    async fn source_image(
        &self,
        loader: &ImageLoader,
        url: &str,
        scale: Option<f64>,
        token: &CancellationToken,
    ) -> Result<Arc<RgbaImage>> {
        let key = ImageKey {
            url: url.to_string(),
            scale,
            cross_origin: loader.options().cross_origin,
        };
        let cached = self
            .cache
            .lock()
            .image
            .as_ref()
            .filter(|(cached, _)| *cached == key)
            .map(|(_, image)| Arc::clone(image));
        if let Some(image) = cached {
            return Ok(image);
        }

        let mut image = loader.load(&ImageSource::parse(url), token).await?;
        if let Some(scale) = scale.filter(|s| *s > 0.0 && *s != 1.0) {
            image = scale_image(&image, scale, scale)?;
        }

        let image = Arc::new(image);
        self.cache.lock().image = Some((key, Arc::clone(&image)));
        Ok(image)
    }

    async fn colormap(
        &self,
        loader: &ImageLoader,
        config: &LayerConfig,
        token: &CancellationToken,
    ) -> Result<Option<Arc<Colormap>>> {
        let cached = self
            .cache
            .lock()
            .colormap
            .as_ref()
            .filter(|(color_scale, _)| *color_scale == config.color_scale)
            .map(|(_, colormap)| colormap.clone());
        if let Some(colormap) = cached {
            return Ok(colormap);
        }

        let source = config
            .color_scale
            .as_ref()
            .map(ColorScaleConfig::colormap_source)
            .transpose()
            .map_err(RenderError::from)?
            .flatten();
        let colormap = match source {
            None => None,
            Some(ColormapSource::Table(colormap)) => Some(Arc::new(colormap)),
            Some(ColormapSource::Image(src)) => {
                let image = loader.load(&ImageSource::parse(&src), token).await?;
                Some(Arc::new(Colormap::from_image(&image).map_err(RenderError::from)?))
            }
        };

        self.cache.lock().colormap = Some((config.color_scale.clone(), colormap.clone()));
        Ok(colormap)
    }
}
