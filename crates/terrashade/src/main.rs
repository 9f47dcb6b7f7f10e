//! Terrashade command line
//!
//! Renders raster layers to PNG files.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use terrashade::{logging_setup, AppSettings, DrawOutcome, ImageOverlay};
use terrashade_core::CancellationToken;
use terrashade_io::{scale_image, tiles_to_image, ImageLoader, ImageSource, Tile};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "terrashade", version, about = "Colormap and hillshade raster images")]
struct Cli {
    /// TOML settings file
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Draw an image through the pipeline selected by a layer configuration
    Render {
        /// Image URL, data URL or path
        #[arg(long)]
        image: String,
        /// Colormap image; overrides the layer's colorScale
        #[arg(long)]
        colormap: Option<String>,
        /// Layer configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output PNG
        #[arg(long)]
        output: PathBuf,
    },
    /// Stitch the tiles of a JSON manifest into one image
    Tiles {
        /// `[{ "coords": { "x": 0, "y": 0 }, "image": "..." }, ...]`
        #[arg(long)]
        manifest: PathBuf,
        /// Output PNG
        #[arg(long)]
        output: PathBuf,
    },
    /// Resample an image
    Scale {
        /// Image URL, data URL or path
        #[arg(long)]
        image: String,
        /// Horizontal factor
        #[arg(long)]
        scale_x: f64,
        /// Vertical factor
        #[arg(long)]
        scale_y: f64,
        /// Output PNG
        #[arg(long)]
        output: PathBuf,
    },
}

fn read_json(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse {:?}", path))
}

async fn render(
    settings: &AppSettings,
    image: String,
    colormap: Option<String>,
    config: Option<PathBuf>,
    output: &Path,
) -> Result<()> {
    let mut options = match config {
        Some(path) => read_json(&path)?,
        None => Value::Object(Default::default()),
    };
    if let (Some(colormap), Value::Object(map)) = (colormap, &mut options) {
        map.insert("colorScale".to_string(), Value::String(colormap));
    }

    let overlay = ImageOverlay::new(image, options, settings)?;
    match overlay.draw().await? {
        DrawOutcome::Committed { .. } => {}
        DrawOutcome::Superseded { generation } => bail!("Draw request {} was superseded", generation),
    }

    let canvas = overlay.canvas().context("Nothing was drawn")?;
    canvas
        .save(output)
        .with_context(|| format!("Failed to write {:?}", output))?;
    info!("Wrote {}x{} image to {:?}", canvas.width(), canvas.height(), output);
    Ok(())
}

async fn tiles(settings: &AppSettings, manifest: &Path, output: &Path) -> Result<()> {
    let tiles: Vec<Tile> = serde_json::from_value(read_json(manifest)?)
        .with_context(|| format!("Invalid tile manifest {:?}", manifest))?;
    let loader = ImageLoader::new(settings.loader_options())?;

    let Some(mosaic) = tiles_to_image(&tiles, &loader, &CancellationToken::new()).await? else {
        bail!("The manifest lists no tiles");
    };
    if !mosaic.is_complete() {
        warn!("Missing tiles: {:?}", mosaic.missing);
    }

    mosaic
        .image
        .save(output)
        .with_context(|| format!("Failed to write {:?}", output))?;
    info!(
        "Wrote {} tiles of {} px to {:?}",
        mosaic.loaded, mosaic.tile_size, output
    );
    Ok(())
}

async fn scale(
    settings: &AppSettings,
    image: &str,
    scale_x: f64,
    scale_y: f64,
    output: &Path,
) -> Result<()> {
    let loader = ImageLoader::new(settings.loader_options())?;
    let image = loader
        .load(&ImageSource::parse(image), &CancellationToken::new())
        .await?;
    let scaled = scale_image(&image, scale_x, scale_y)?;
    scaled
        .save(output)
        .with_context(|| format!("Failed to write {:?}", output))?;
    info!("Wrote {}x{} image to {:?}", scaled.width(), scaled.height(), output);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => AppSettings::load(path)?,
        None => AppSettings::default(),
    };
    let _log_guard = logging_setup::init(&settings.log)?;

    match cli.command {
        Command::Render {
            image,
            colormap,
            config,
            output,
        } => render(&settings, image, colormap, config, &output).await,
        Command::Tiles { manifest, output } => tiles(&settings, &manifest, &output).await,
        Command::Scale {
            image,
            scale_x,
            scale_y,
            output,
        } => scale(&settings, &image, scale_x, scale_y, &output).await,
    }
}
