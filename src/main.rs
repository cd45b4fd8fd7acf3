use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{filter::LevelFilter, EnvFilter, FmtSubscriber};

use terrain_synth::config::{InterpolationMethod, TerrainConfig};
use terrain_synth::error::{Result, TerrainError};
use terrain_synth::export;
use terrain_synth::geo::GeoBounds;
use terrain_synth::providers::{
    ElevationProvider, FeatureClassifier, HttpElevationConfig, HttpElevationProvider,
    ImageClassifier,
};
use terrain_synth::terrain::Terrain;
use terrain_synth::vegetation::VegetationInstance;
use terrain_synth::CancelToken;

#[derive(Parser, Debug)]
#[command(name = "terrain_synth")]
#[command(about = "Synthesize a displaced terrain mesh and vegetation for a map region")]
struct Args {
    /// Southern latitude of the region
    #[arg(long, allow_hyphen_values = true)]
    south: Option<f64>,

    /// Western longitude of the region
    #[arg(long, allow_hyphen_values = true)]
    west: Option<f64>,

    /// Northern latitude of the region
    #[arg(long, allow_hyphen_values = true)]
    north: Option<f64>,

    /// Eastern longitude of the region
    #[arg(long, allow_hyphen_values = true)]
    east: Option<f64>,

    /// Center latitude for a virtual (noise) terrain
    #[arg(long, allow_hyphen_values = true)]
    center_lat: Option<f64>,

    /// Center longitude for a virtual (noise) terrain
    #[arg(long, allow_hyphen_values = true)]
    center_lon: Option<f64>,

    /// Side length of a virtual terrain in meters
    #[arg(long, default_value = "2000")]
    size: f64,

    /// Grid resolution in cells per side (derived from --zoom if not set)
    #[arg(short, long)]
    resolution: Option<i64>,

    /// Map zoom level used to pick a resolution
    #[arg(short, long, default_value = "13")]
    zoom: f32,

    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Open-Elevation compatible service (procedural heights if not set)
    #[arg(long)]
    elevation_url: Option<String>,

    /// Satellite image of the region, used for texture and vegetation
    #[arg(long)]
    satellite: Option<PathBuf>,

    /// Classify every n-th satellite pixel
    #[arg(long, default_value = "4")]
    feature_stride: u32,

    /// Random seed for virtual terrain and vegetation
    #[arg(short, long)]
    seed: Option<u64>,

    /// Stride between sampled rows/columns
    #[arg(long)]
    sampling_rate: Option<usize>,

    /// Use Catmull-Rom instead of bilinear reconstruction
    #[arg(long)]
    bicubic: bool,

    /// Vertical exaggeration
    #[arg(long)]
    vertical_scale: Option<f32>,

    /// Output mesh (Wavefront OBJ)
    #[arg(short, long, default_value = "terrain.obj")]
    output: PathBuf,

    /// Write placed vegetation to a JSON file
    #[arg(long)]
    vegetation_out: Option<PathBuf>,

    /// Write the point-level diagnostic dump to a JSON file
    #[arg(long)]
    diagnostics: Option<PathBuf>,

    /// Write a heightmap preview PNG
    #[arg(long)]
    heightmap: Option<PathBuf>,
}

fn main() {
    init_logging();
    let args = Args::parse();

    if let Err(e) = run(args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Library logs stay at warn unless RUST_LOG asks for more
fn init_logging() {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::WARN.into())
        .from_env_lossy();
    FmtSubscriber::builder().with_env_filter(filter).init();
}

fn run(args: Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => TerrainConfig::load(path)?,
        None => TerrainConfig::default(),
    };
    if let Some(rate) = args.sampling_rate {
        config.sampling_rate = rate;
    }
    if args.bicubic {
        config.interpolation = InterpolationMethod::Bicubic;
    }
    if let Some(scale) = args.vertical_scale {
        config.vertical_scale = scale;
    }
    let seed = args.seed.or(config.seed).unwrap_or_else(rand::random);
    config.seed = Some(seed);

    let resolution = args
        .resolution
        .unwrap_or_else(|| config.resolution_for_zoom(args.zoom) as i64);

    let elevation: Option<Arc<dyn ElevationProvider>> = match &args.elevation_url {
        Some(url) => {
            let provider_config = HttpElevationConfig {
                base_url: url.clone(),
                ..Default::default()
            };
            println!("Using elevation service {}", url);
            Some(Arc::new(HttpElevationProvider::new(provider_config)))
        }
        None => None,
    };

    let classifier: Option<Arc<dyn FeatureClassifier>> = match &args.satellite {
        Some(path) => {
            println!("Classifying satellite image {}...", path.display());
            Some(Arc::new(ImageClassifier::open(path, args.feature_stride)?))
        }
        None => None,
    };

    println!("Seed: {}", seed);
    println!(
        "Resolution: {} ({} points, sampling every {})",
        resolution,
        (resolution.max(0) + 1).pow(2),
        config.sampling_rate
    );

    let mut terrain = Terrain::new(config, elevation, None, classifier);
    let runtime = tokio::runtime::Runtime::new()?;
    let cancel = CancelToken::new();

    match (args.south, args.west, args.north, args.east) {
        (Some(south), Some(west), Some(north), Some(east)) => {
            let bounds = GeoBounds::new(south, west, north, east)?;
            println!("Generating terrain for {:.5},{:.5} .. {:.5},{:.5}...", south, west, north, east);
            runtime.block_on(terrain.generate_terrain(bounds, resolution, &cancel))?;
        }
        _ => {
            let (Some(lat), Some(lon)) = (args.center_lat, args.center_lon) else {
                return Err(TerrainError::InvalidBounds(
                    "give --south/--west/--north/--east or --center-lat/--center-lon".to_string(),
                ));
            };
            println!("Generating {:.0}m virtual terrain around {:.5},{:.5}...", args.size, lat, lon);
            runtime.block_on(terrain.generate_virtual_terrain(
                lat,
                lon,
                args.size,
                resolution,
                seed as u32,
                &cancel,
            ))?;
        }
    }

    if args.satellite.is_some() {
        println!("Placing vegetation...");
        let mut placed: Vec<VegetationInstance> = Vec::new();
        let report = runtime.block_on(terrain.place_vegetation(&mut placed, &cancel))?;
        println!(
            "Placed {} instances from {} features ({} errors)",
            report.placed, report.considered, report.errors
        );
        for (kind, count) in &report.by_type {
            println!("  {}: {}", kind, count);
        }
        if let Some(path) = &args.vegetation_out {
            export::export_vegetation_json(&placed, path)?;
            println!("Saved vegetation to {}", path.display());
        }
    }

    let Some(generation) = terrain.generation() else {
        return Err(TerrainError::EmptyInput("no terrain was generated".to_string()));
    };

    if generation.sampling.batch_timed_out {
        println!("Elevation service timed out, procedural heights were used");
    }
    println!("{}", generation.stats);

    export::export_obj(&generation.mesh, &args.output)?;
    println!(
        "Saved mesh to {} ({} vertices, {} triangles)",
        args.output.display(),
        generation.mesh.vertex_count(),
        generation.mesh.triangle_count()
    );

    if let Some(path) = &args.heightmap {
        export::export_heightmap(&generation.points, generation.grid.resolution, path)?;
        println!("Saved heightmap to {}", path.display());
    }

    if let Some(path) = &args.diagnostics {
        if let Some(diagnostics) = terrain.diagnostics() {
            export::export_diagnostics(&diagnostics, path)?;
            println!("Saved diagnostics to {}", path.display());
        }
    }

    Ok(())
}
