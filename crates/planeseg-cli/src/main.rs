//! planeseg CLI: command-line interface for plane extraction.

use clap::{Args, Parser, Subcommand, ValueEnum};
use planeseg::{
    Connectivity, HeightGrid, PlaneExtractionConfig, SegmentedPlanesMap,
    SlidingWindowPlaneExtractor,
};
use serde::Serialize;
use std::path::PathBuf;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "planeseg")]
#[command(about = "Extract planar regions from elevation grids")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract planes from a grid and write a JSON report.
    Extract(CliExtractArgs),

    /// Print the default configuration as JSON.
    DefaultConfig,
}

#[derive(Debug, Clone, Args)]
struct CliExtractArgs {
    #[command(flatten)]
    input: CliInputArgs,

    /// Height layer to segment.
    #[arg(long, default_value = "elevation")]
    layer: String,

    /// Path to write the extraction report (JSON).
    #[arg(long)]
    out: PathBuf,

    /// Configuration file (JSON); command-line overrides apply on top.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Sliding-window size in cells (odd, >= 3).
    #[arg(long)]
    kernel_size: Option<usize>,

    /// Erosion radius applied to the planarity mask.
    #[arg(long)]
    erosion: Option<usize>,

    /// Disable RANSAC refinement of non-planar regions.
    #[arg(long)]
    no_refine: bool,

    /// Connectivity used for region labelling.
    #[arg(long, value_enum)]
    connectivity: Option<ConnectivityArg>,

    /// Base seed for RANSAC refinement.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Args)]
struct CliInputArgs {
    /// Elevation grid in JSON form.
    #[arg(long, required_unless_present = "heightmap", conflicts_with = "heightmap")]
    grid: Option<PathBuf>,

    /// 16-bit grayscale height map (PNG).
    #[arg(long)]
    heightmap: Option<PathBuf>,

    #[command(flatten)]
    heightmap_opts: CliHeightmapArgs,
}

#[derive(Debug, Clone, Args)]
struct CliHeightmapArgs {
    /// Height map cell size in meters.
    #[arg(long, default_value = "0.02")]
    resolution: f64,

    /// Height in meters of a full-scale pixel value.
    #[arg(long, default_value = "1.0")]
    height_scale: f32,

    /// Height in meters of a zero pixel value.
    #[arg(long, default_value = "0.0")]
    height_offset: f32,

    /// World x of the top-left pixel.
    #[arg(long, default_value = "0.0")]
    origin_x: f64,

    /// World y of the top-left pixel.
    #[arg(long, default_value = "0.0")]
    origin_y: f64,

    /// Treat zero-valued pixels as missing cells.
    #[arg(long)]
    zero_is_missing: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ConnectivityArg {
    Four,
    Eight,
}

impl ConnectivityArg {
    fn to_core(self) -> Connectivity {
        match self {
            Self::Four => Connectivity::Four,
            Self::Eight => Connectivity::Eight,
        }
    }
}

impl CliExtractArgs {
    fn to_config(&self) -> CliResult<PlaneExtractionConfig> {
        let mut config = match &self.config {
            Some(path) => PlaneExtractionConfig::from_json_file(path).map_err(|e| -> CliError {
                format!("Failed to load config {}: {}", path.display(), e).into()
            })?,
            None => PlaneExtractionConfig::default(),
        };

        if let Some(k) = self.kernel_size {
            config.extractor.kernel_size = k;
        }
        if let Some(e) = self.erosion {
            config.extractor.planarity_erosion = e;
        }
        if self.no_refine {
            config.extractor.include_ransac_refinement = false;
        }
        if let Some(c) = self.connectivity {
            config.extractor.connectivity = c.to_core();
        }
        if let Some(seed) = self.seed {
            config.ransac.seed = seed;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Extract(args) => run_extract(&args),
        Commands::DefaultConfig => run_default_config(),
    }
}

// ── default-config ─────────────────────────────────────────────────────

fn run_default_config() -> CliResult<()> {
    let json = serde_json::to_string_pretty(&PlaneExtractionConfig::default())?;
    println!("{}", json);
    Ok(())
}

// ── extract ────────────────────────────────────────────────────────────

fn load_grid(input: &CliInputArgs, layer: &str) -> CliResult<HeightGrid> {
    if let Some(path) = &input.grid {
        tracing::info!("Loading grid: {}", path.display());
        return HeightGrid::from_json_file(path).map_err(|e| -> CliError {
            format!("Failed to load grid {}: {}", path.display(), e).into()
        });
    }
    let Some(path) = &input.heightmap else {
        return Err("one of --grid or --heightmap is required".into());
    };

    tracing::info!("Loading height map: {}", path.display());
    let img = image::open(path).map_err(|e| -> CliError {
        format!("Failed to open height map {}: {}", path.display(), e).into()
    })?;
    let gray = img.to_luma16();
    grid_from_heightmap(&gray, &input.heightmap_opts, layer)
}

fn grid_from_heightmap(
    gray: &image::ImageBuffer<image::Luma<u16>, Vec<u16>>,
    opts: &CliHeightmapArgs,
    layer: &str,
) -> CliResult<HeightGrid> {
    let (w, h) = gray.dimensions();
    let data = gray
        .pixels()
        .map(|p| {
            let v = p[0];
            if opts.zero_is_missing && v == 0 {
                f32::NAN
            } else {
                opts.height_offset + opts.height_scale * v as f32 / u16::MAX as f32
            }
        })
        .collect();
    let grid = HeightGrid::from_layer(
        h as usize,
        w as usize,
        opts.resolution,
        [opts.origin_x, opts.origin_y],
        layer,
        data,
    )?;
    Ok(grid)
}

#[derive(Debug, Serialize)]
struct PlaneReport {
    label: u32,
    position: [f64; 3],
    normal: [f64; 3],
    /// Rows of the world-to-terrain rotation.
    rotation_world_to_terrain: [[f64; 3]; 3],
    cells: usize,
}

#[derive(Debug, Serialize)]
struct ExtractionReport {
    rows: u32,
    cols: u32,
    resolution: f64,
    origin: [f64; 2],
    highest_label: u32,
    planes: Vec<PlaneReport>,
    /// Row-major label per cell, 0 for background.
    labels: Vec<u32>,
}

impl From<&SegmentedPlanesMap> for ExtractionReport {
    fn from(map: &SegmentedPlanesMap) -> Self {
        let (cols, rows) = map.labeled_image.dimensions();
        let planes = map
            .label_plane_parameters
            .iter()
            .map(|(label, plane)| {
                let p = plane.position_in_world;
                let n = plane.surface_normal_in_world();
                let m = plane.orientation_world_to_terrain.matrix();
                PlaneReport {
                    label: *label,
                    position: [p.x, p.y, p.z],
                    normal: [n.x, n.y, n.z],
                    rotation_world_to_terrain: [
                        [m[(0, 0)], m[(0, 1)], m[(0, 2)]],
                        [m[(1, 0)], m[(1, 1)], m[(1, 2)]],
                        [m[(2, 0)], m[(2, 1)], m[(2, 2)]],
                    ],
                    cells: map.cell_count(*label),
                }
            })
            .collect();
        Self {
            rows,
            cols,
            resolution: map.resolution,
            origin: [map.map_origin.x, map.map_origin.y],
            highest_label: map.highest_label,
            planes,
            labels: map.labeled_image.as_raw().clone(),
        }
    }
}

fn run_extract(args: &CliExtractArgs) -> CliResult<()> {
    let config = args.to_config()?;
    let grid = load_grid(&args.input, &args.layer)?;
    tracing::info!(
        "Grid size: {}x{} cells at {} m",
        grid.rows(),
        grid.cols(),
        grid.resolution()
    );

    let mut extractor = SlidingWindowPlaneExtractor::new(config)?;
    let map = extractor.run_extraction(&grid, &args.layer)?;

    let report = ExtractionReport::from(map);
    for plane in &report.planes {
        tracing::info!(
            "Plane {}: {} cells at ({:.3}, {:.3}, {:.3})",
            plane.label,
            plane.cells,
            plane.position[0],
            plane.position[1],
            plane.position[2],
        );
    }

    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&args.out, &json)?;
    tracing::info!("Results written to {}", args.out.display());

    Ok(())
}
