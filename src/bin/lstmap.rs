//! lstmap command-line interface

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use lstmap::core::canopy::CanopyHeightProcessor;
use lstmap::io::geotiff;
use lstmap::io::{GeoTiffExporter, HttpJobSubmitter, JobSubmitter, LandsatDirectoryStore, ManifestSubmitter};
use lstmap::{AreaOfInterest, HeatMapPipeline, PipelineConfig};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Parser)]
#[command(name = "lstmap", version, about = "Landsat land surface temperature heat maps")]
struct Cli {
    /// Configuration file (JSON). Defaults to the user config directory.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build per-scene Celsius heat maps from unpacked Level-2 products
    Heat {
        /// Directory holding `<ID>_MTL.xml` and `<ID>_<BAND>.TIF` files
        #[arg(long)]
        scenes: PathBuf,
        /// Output root for GeoTIFF exports
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Append export jobs to a JSON-lines manifest instead of writing GeoTIFFs
        #[arg(long, conflicts_with = "endpoint")]
        manifest: Option<PathBuf>,
        /// Submit export jobs to an HTTP endpoint instead of writing GeoTIFFs
        #[arg(long)]
        endpoint: Option<String>,
        /// Override the AOI cloud threshold (percent)
        #[arg(long)]
        max_cloud: Option<f64>,
        /// Print the export descriptors without submitting anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Mosaic canopy height tiles, mask low vegetation and export over the AOI
    Canopy {
        /// Directory of canopy height GeoTIFF tiles
        #[arg(long)]
        tiles: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write the default configuration
    InitConfig {
        /// Destination, defaults to the user config directory
        path: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Heat {
            scenes,
            output,
            manifest,
            endpoint,
            max_cloud,
            dry_run,
        } => {
            let mut config = load_config(cli.config.as_deref())?;
            if let Some(pct) = max_cloud {
                config.cloud.max_cloud_pct = pct;
            }
            run_heat(config, &scenes, output, manifest, endpoint, dry_run)
        }
        Command::Canopy { tiles, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_canopy(config, &tiles, output)
        }
        Command::InitConfig { path, force } => init_config(path, force),
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => PipelineConfig::default_path().filter(|p| p.exists()),
    };
    match path {
        Some(p) => PipelineConfig::from_json_file(&p)
            .with_context(|| format!("Failed to load configuration {}", p.display())),
        None => {
            log::info!("No configuration file, using defaults");
            Ok(PipelineConfig::default())
        }
    }
}

fn default_output() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("lstmap")
        .join("exports")
}

fn run_heat(
    config: PipelineConfig,
    scenes: &Path,
    output: Option<PathBuf>,
    manifest: Option<PathBuf>,
    endpoint: Option<String>,
    dry_run: bool,
) -> Result<()> {
    let store = LandsatDirectoryStore::open(scenes)?;
    if store.is_empty() {
        bail!("No Landsat products found under {}", scenes.display());
    }

    let aoi = if config.aoi_crs.eq_ignore_ascii_case("EPSG:4326") {
        store.project_aoi(&config.aoi)?
    } else {
        AreaOfInterest::from_ring(&config.aoi)?
    };

    let pipeline = HeatMapPipeline::new(config)?;
    let result = pipeline.run_with_aoi(&store, &aoi)?;

    for s in &result.screening {
        println!(
            "{}  AOI cloud {:>5.1}%  {}",
            s.scene_id,
            s.cloud.pct(),
            if s.retained { "kept" } else { "rejected" }
        );
    }
    println!(
        "Temperature range: {:.2} °C .. {:.2} °C{}",
        result.global_range.min,
        result.global_range.max,
        if result.global_range.fallback { " (default)" } else { "" }
    );

    let classes = pipeline.config().classes()?;
    let labels = classes.labels();
    for artifact in &result.exports {
        let counts = classes.histogram(&artifact.raster);
        let summary: Vec<String> = labels
            .iter()
            .zip(&counts)
            .map(|(label, n)| format!("{}: {}", label, n))
            .collect();
        println!("{}  [{}]", artifact.descriptor.name, summary.join(", "));
    }

    if dry_run {
        for d in result.descriptors() {
            println!("{}", serde_json::to_string(d)?);
        }
        return Ok(());
    }

    let submitter: Box<dyn JobSubmitter> = if let Some(path) = manifest {
        Box::new(ManifestSubmitter::new(path)?)
    } else if let Some(url) = endpoint {
        Box::new(HttpJobSubmitter::new(&url)?)
    } else {
        let band = pipeline.config().export.source_band.clone();
        Box::new(GeoTiffExporter::new(
            output.unwrap_or_else(default_output),
            store.projection_wkt(&band)?,
        ))
    };

    let jobs = pipeline.submit_all(&result.exports, submitter.as_ref())?;
    for (artifact, job) in result.exports.iter().zip(&jobs) {
        println!("{}  ->  {}", artifact.descriptor.name, job);
    }
    Ok(())
}

fn run_canopy(config: PipelineConfig, tiles_dir: &Path, output: Option<PathBuf>) -> Result<()> {
    let mut paths: Vec<PathBuf> = fs::read_dir(tiles_dir)?
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"))
        })
        .collect();
    paths.sort();
    if paths.is_empty() {
        bail!("No GeoTIFF tiles under {}", tiles_dir.display());
    }

    let tiles = paths
        .iter()
        .map(geotiff::read_band)
        .collect::<Result<Vec<_>, _>>()?;
    let projection = geotiff::read_projection(&paths[0])?;

    let aoi = config.aoi()?;
    let processor = CanopyHeightProcessor::with_params(config.canopy.clone());
    let artifact = processor.process(&tiles, &aoi)?;

    let exporter = GeoTiffExporter::new(output.unwrap_or_else(default_output), Some(projection));
    let path = exporter.submit(&artifact.descriptor, &artifact.raster)?;
    println!("{}", path);
    Ok(())
}

fn init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = match path.or_else(PipelineConfig::default_path) {
        Some(p) => p,
        None => bail!("No user config directory; pass a path"),
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, PipelineConfig::default().to_json_string()?)?;
    println!("Wrote {}", path.display());
    Ok(())
}
