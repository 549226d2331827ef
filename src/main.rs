use anyhow::{Context, Result, bail};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

use terramesh::config::heights::LAYER_HEIGHT;
use terramesh::config::{FileConfig, PipelineConfig};
use terramesh::domain::{ElevationGrid, FillRule, PredicateSet, TagGroup};
use terramesh::export::{ExportFormat, estimate_stl_size, write_solid};
use terramesh::source::{read_ascii_grid, read_boundary, read_features};
use terramesh::{PipelineInput, PipelineOutput, run};

/// Generate watertight, 3D-printable terrain models from elevation grids
///
/// Examples:
///   # Terrain only, 150mm on the long side
///   terramesh --dem tile_a.asc tile_b.asc --max-length 150
///
///   # Clip to a region and add water and building layers
///   terramesh --dem dtm.asc --boundary region.geojson --features osm.geojson \
///     --group '{"natural": "water"}' --group '{"building": true}' -o valley.3mf
///
///   # Building heights from a surface model
///   terramesh --dem dtm.asc --dsm dsm.asc --features buildings.geojson \
///     --group '{"building": true}'
///
///   # Use a config file
///   terramesh --config alps.toml
#[derive(Parser, Debug)]
#[command(name = "terramesh")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to config file (optional, auto-searches terramesh.toml if not provided)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Terrain elevation tiles (ESRI ASCII grid), highest priority first
    #[arg(long, num_args = 1..)]
    dem: Vec<PathBuf>,

    /// Surface model tiles used to derive feature heights
    #[arg(long, num_args = 1..)]
    dsm: Vec<PathBuf>,

    /// GeoJSON polygon to clip the terrain to
    #[arg(short = 'b', long)]
    boundary: Option<PathBuf>,

    /// GeoJSON features to raise as overlay layers
    #[arg(short = 'f', long)]
    features: Option<PathBuf>,

    /// Overlay group as JSON: one predicate object, or an array of them.
    /// Repeat for more groups; earlier groups win.
    #[arg(short = 'g', long = "group")]
    groups: Vec<String>,

    /// Output file; .stl merges all layers, anything else is written as 3MF
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Length of the longer model side in mm
    #[arg(short = 'l', long)]
    max_length: Option<f64>,

    /// Relief height from lowest to highest point in mm
    #[arg(long)]
    max_height: Option<f64>,

    /// Floor thickness under the lowest point in mm
    #[arg(long)]
    base_height: Option<f64>,

    /// Boundary fill rule: even-odd or non-zero
    #[arg(long)]
    fill_rule: Option<FillRule>,

    /// Accept elevation tiles that leave part of the area uncovered
    #[arg(long)]
    allow_partial: bool,

    /// Enable verbose logging
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);
    let total_start = Instant::now();

    let file_config = if let Some(ref config_path) = args.config {
        if config_path.exists() {
            let contents = std::fs::read_to_string(config_path)
                .context(format!("Failed to read config file: {:?}", config_path))?;
            Some(toml::from_str(&contents).context("Failed to parse config file")?)
        } else {
            bail!("Config file not found: {:?}", config_path);
        }
    } else {
        FileConfig::load()
    };
    let file_config: FileConfig = file_config.unwrap_or_default();

    let dem = if args.dem.is_empty() {
        file_config.dem.clone()
    } else {
        args.dem.clone()
    };
    let dsm = if args.dsm.is_empty() {
        file_config.dsm.clone()
    } else {
        args.dsm.clone()
    };
    let boundary_path = args.boundary.clone().or_else(|| file_config.boundary.clone());
    let features_path = args.features.clone().or_else(|| file_config.features.clone());
    let output_path = args
        .output
        .clone()
        .or_else(|| file_config.output.clone())
        .unwrap_or_else(|| PathBuf::from("terrain.3mf"));
    let verbose = args.verbose || file_config.verbose;

    let config = resolve_config(&args, file_config.pipeline)?;

    if dem.is_empty() {
        bail!("Must provide at least one elevation tile with --dem (or `dem` in the config file)");
    }

    println!("terramesh - Terrain Model Generator");
    println!("===================================");
    println!();

    if verbose {
        println!("Configuration:");
        println!("  Elevation tiles: {}", dem.len());
        if !dsm.is_empty() {
            println!("  Surface tiles: {}", dsm.len());
        }
        if let Some(ref b) = boundary_path {
            println!("  Boundary: {}", b.display());
        }
        if let Some(ref f) = features_path {
            println!("  Features: {}", f.display());
        }
        println!("  Max length: {}mm", config.dimensions.max_length_mm);
        println!("  Max height: {}mm", config.dimensions.max_height_mm);
        println!("  Base height: {}mm", config.dimensions.base_height_mm);
        println!("  Fill rule: {:?}", config.fill_rule);
        println!("  Partial coverage: {}", config.allow_partial_coverage);
        println!(
            "  Overlay height: {}mm (min {}mm, key '{}')",
            config.overlay.nominal_height_mm,
            config.overlay.min_height_mm,
            config.overlay.height_key
        );
        for (i, group) in config.groups.iter().enumerate() {
            println!("  Group {}: {} ({} rule sets)", i + 1, group.name, group.predicates.len());
        }
        println!("  Output: {}", output_path.display());
        println!();
    }

    let spinner = create_spinner("Reading elevation tiles...");
    let start = Instant::now();
    let tiles = read_tiles(&dem)?;
    let surface_tiles = read_tiles(&dsm)?;
    spinner.finish_with_message(format!(
        "Read {} elevation tiles{} [{:.1}s]",
        tiles.len(),
        if surface_tiles.is_empty() {
            String::new()
        } else {
            format!(" and {} surface tiles", surface_tiles.len())
        },
        start.elapsed().as_secs_f32()
    ));

    let boundary = match boundary_path {
        Some(ref path) => {
            let spinner = create_spinner("Reading boundary...");
            let boundary = read_boundary(path)?;
            spinner.finish_with_message(format!(
                "Boundary: {} polygons, {:.0} x {:.0} units",
                boundary.polygons().0.len(),
                boundary.extent().width(),
                boundary.extent().height()
            ));
            Some(boundary)
        }
        None => None,
    };

    let features = match features_path {
        Some(ref path) => {
            let spinner = create_spinner("Reading features...");
            let features = read_features(path)?;
            spinner.finish_with_message(format!("Read {} features", features.len()));
            if config.groups.is_empty() {
                println!("  No groups configured; features will not be used");
            }
            features
        }
        None => Vec::new(),
    };

    let spinner = create_spinner("Building terrain and overlay meshes...");
    let start = Instant::now();
    let input = PipelineInput {
        tiles,
        surface_tiles,
        boundary,
        features,
    };
    let output = run(input, &config).context("Failed to build model")?;
    spinner.finish_with_message(format!(
        "Built {} components, {} triangles [{:.1}s]",
        output.solid.components().len(),
        output.solid.triangle_count(),
        start.elapsed().as_secs_f32()
    ));

    if verbose {
        let stats = &output.stats;
        println!(
            "  Grid: {}x{} cells, {} valid",
            stats.grid_width, stats.grid_height, stats.valid_cells
        );
        println!(
            "  Elevation: {:.1} -> {:.1}",
            stats.elevation_range.0, stats.elevation_range.1
        );
        println!(
            "  Scale: {:.4} mm/unit horizontal, {:.4} mm/unit vertical",
            stats.horizontal_scale, stats.vertical_scale
        );
        if stats.surface_heights > 0 {
            println!("  Surface heights: {} features", stats.surface_heights);
        }
        for (name, report) in &stats.reports {
            println!("  {}: {}", name, report.summary());
        }
    }

    let spinner = create_spinner("Writing model file...");
    let start = Instant::now();
    let format = write_solid(&output_path, &output.solid)?;
    let file_size = match format {
        ExportFormat::Stl => estimate_stl_size(output.solid.triangle_count()) as u64,
        ExportFormat::ThreeMf => std::fs::metadata(&output_path).map(|m| m.len()).unwrap_or(0),
    };
    spinner.finish_with_message(format!(
        "Wrote {:?} ({:.1} KB) [{:.1}s]",
        format,
        file_size as f64 / 1024.0,
        start.elapsed().as_secs_f32()
    ));

    println!();
    println!(
        "Done! Total time: {:.1}s",
        total_start.elapsed().as_secs_f32()
    );
    println!();
    println!("Output: {}", output_path.display());
    println!();
    print_layer_guide(&output, format);

    Ok(())
}

/// Merge CLI flags over file settings; CLI wins
fn resolve_config(args: &Args, mut config: PipelineConfig) -> Result<PipelineConfig> {
    if let Some(v) = args.max_length {
        config.dimensions.max_length_mm = v;
    }
    if let Some(v) = args.max_height {
        config.dimensions.max_height_mm = v;
    }
    if let Some(v) = args.base_height {
        config.dimensions.base_height_mm = v;
    }
    if let Some(rule) = args.fill_rule {
        config.fill_rule = rule;
    }
    config.allow_partial_coverage |= args.allow_partial;

    if !args.groups.is_empty() {
        config.groups = args
            .groups
            .iter()
            .enumerate()
            .map(|(i, json)| parse_group(i + 1, json))
            .collect::<Result<Vec<_>>>()?;
    }
    Ok(config)
}

/// Parse a `--group` argument into a group named `group-<n>`
fn parse_group(index: usize, json: &str) -> Result<TagGroup> {
    let value: serde_json::Value = serde_json::from_str(json)
        .with_context(|| format!("--group {index} is not valid JSON: {json}"))?;
    let predicates: Vec<PredicateSet> = if value.is_array() {
        serde_json::from_value(value)
    } else {
        serde_json::from_value::<PredicateSet>(value).map(|set| vec![set])
    }
    .with_context(|| format!("--group {index} must be an object of tag values or an array of them"))?;
    Ok(TagGroup::new(format!("group-{index}"), predicates))
}

fn read_tiles(paths: &[PathBuf]) -> Result<Vec<ElevationGrid>> {
    paths.iter().map(|p| read_ascii_grid(p)).collect()
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn print_layer_guide(output: &PipelineOutput, format: ExportFormat) {
    let components = output.solid.components();
    let layers = |z: f32| (f64::from(z) / LAYER_HEIGHT).round() as i32;

    println!("Model Layers ({:.1}mm layer height)", LAYER_HEIGHT);
    println!("==================================");
    println!();
    let (x, y) = output.stats.footprint_mm;
    println!("Footprint: {:.1}mm x {:.1}mm", x, y);
    println!(
        "Total height: {:.1}mm = {} layers",
        output.solid.max_z(),
        layers(output.solid.max_z())
    );
    println!();

    for component in components {
        println!(
            "  {:<12} layer {}  {:>8} triangles, tops out at {:.1}mm ({} layers)",
            component.name(),
            component.layer().unwrap_or(0),
            component.triangles().len(),
            component.max_z(),
            layers(component.max_z())
        );
    }
    println!();

    match format {
        ExportFormat::ThreeMf if components.len() > 1 => {
            println!("Each layer is a separate object in the 3MF file.");
            println!("Assign one filament per object in your slicer for a multi-color print.");
        }
        ExportFormat::Stl if components.len() > 1 => {
            println!("NOTE: STL merges all layers into one body.");
            println!("Write a .3mf file to keep layers separate for multi-color printing.");
        }
        _ => {}
    }
    println!();
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}
