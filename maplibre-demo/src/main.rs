use std::{error::Error, fs, path::PathBuf, process::ExitCode, sync::Arc};

use clap::Parser;
use maplibre_raster::{
    coords::TileCoordinate,
    render::{FontCache, RasterEncoding, RenderOptions, RendererSettings, TileRenderer},
    style::{resolve::to_skia_color, StyleSheet},
    tile::VectorTile,
};

/// Render one vector tile to a PNG or JPEG file
#[derive(Parser, Debug)]
#[command(name = "maplibre-raster-demo", version, about)]
struct Cli {
    /// Tile in JSON form
    #[arg(long, value_name = "FILE")]
    tile: PathBuf,

    /// MapLibre style document. The built-in style is used if omitted
    #[arg(long, value_name = "FILE")]
    style: Option<PathBuf>,

    /// Renderer settings in JSON form
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Font to register, as `family=path` (repeatable)
    #[arg(long = "font", value_name = "FAMILY=PATH", value_parser = parse_font)]
    fonts: Vec<(String, PathBuf)>,

    #[arg(long, default_value_t = 0)]
    x: i32,

    #[arg(long, default_value_t = 0)]
    y: i32,

    #[arg(long, default_value_t = 14.0)]
    zoom: f64,

    /// Tile size in logical pixels
    #[arg(long, default_value_t = 512)]
    size: u32,

    /// Device pixel ratio
    #[arg(long, default_value_t = 1.0)]
    scale: f32,

    /// The tile data is magnified from a lower zoom level
    #[arg(long)]
    over_zoomed: bool,

    /// CSS color replacing the color of background rules
    #[arg(long, value_name = "COLOR")]
    background: Option<String>,

    /// Only render these source layers (repeatable)
    #[arg(long = "source-layer", value_name = "NAME")]
    source_layers: Vec<String>,

    /// Write a JPEG of this quality instead of a PNG
    #[arg(long, value_name = "QUALITY")]
    jpeg_quality: Option<u8>,

    /// Output file
    #[arg(long, value_name = "FILE")]
    out: PathBuf,
}

fn parse_font(value: &str) -> Result<(String, PathBuf), String> {
    let (family, path) = value
        .split_once('=')
        .ok_or_else(|| format!("expected FAMILY=PATH, got {value}"))?;
    Ok((family.to_string(), PathBuf::from(path)))
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let tile: VectorTile = serde_json::from_str(&fs::read_to_string(&cli.tile)?)?;
    let style = match &cli.style {
        Some(path) => StyleSheet::load(path)?,
        None => StyleSheet::default(),
    };
    let settings = match &cli.settings {
        Some(path) => serde_json::from_str(&fs::read_to_string(path)?)?,
        None => RendererSettings::default(),
    };

    let fonts = Arc::new(FontCache::new());
    for (family, path) in &cli.fonts {
        fonts.register_file(family, path)?;
    }

    let mut coords = TileCoordinate::new(cli.x, cli.y, cli.zoom, cli.size, cli.size, cli.scale)?;
    if !cli.source_layers.is_empty() {
        coords = coords.with_source_layers(cli.source_layers.iter().cloned());
    }

    let background_override = cli
        .background
        .as_deref()
        .map(csscolorparser::parse)
        .transpose()?
        .map(|color| to_skia_color(&color, 1.0));
    let options = RenderOptions {
        over_zoomed: cli.over_zoomed,
        background_override,
    };

    let renderer = TileRenderer::new(Arc::new(style), fonts, settings);
    log::info!("rendering {} with {} layers", coords, tile.layers.len());
    let image = renderer.render(&tile, &coords, &options)?;

    let encoding = match cli.jpeg_quality {
        Some(quality) => RasterEncoding::Jpeg { quality },
        None => RasterEncoding::Png,
    };
    fs::write(&cli.out, image.encode(encoding)?)?;
    log::info!(
        "wrote {}x{} image to {}",
        image.width(),
        image.height(),
        cli.out.display()
    );

    Ok(())
}

fn main() -> ExitCode {
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
