use serde::Deserialize;
use std::path::PathBuf;
use tracing::warn;

use crate::domain::{FillRule, TagGroup};
use crate::geometry::PrintDimensions;

/// Print height constants in mm, aligned to a 0.2mm FDM layer height.
///
/// The terrain stands on the bed (z = 0) with at least `BASE_HEIGHT` of solid
/// floor under its lowest sample. Overlay solids sit on the terrain surface
/// and rise `NOMINAL_FEATURE_HEIGHT` above it unless a feature carries its
/// own height, which is never thinner than one layer.
pub mod heights {
    pub const LAYER_HEIGHT: f64 = 0.2;

    pub const BASE_HEIGHT: f64 = 1.0;

    pub const NOMINAL_FEATURE_HEIGHT: f64 = 1.0;
    pub const MIN_FEATURE_HEIGHT: f64 = LAYER_HEIGHT;
}

fn default_nominal_height() -> f64 {
    heights::NOMINAL_FEATURE_HEIGHT
}
fn default_min_height() -> f64 {
    heights::MIN_FEATURE_HEIGHT
}
fn default_height_key() -> String {
    "height".to_string()
}

/// How overlay features are extruded above the terrain
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OverlayConfig {
    /// Extrusion for features without a usable height attribute
    #[serde(default = "default_nominal_height")]
    pub nominal_height_mm: f64,
    /// Lower clamp for attribute-derived extrusions
    #[serde(default = "default_min_height")]
    pub min_height_mm: f64,
    /// Attribute holding a per-feature height in elevation units
    #[serde(default = "default_height_key")]
    pub height_key: String,
    /// Corridor half width for line features in CRS units; one cell if unset
    #[serde(default)]
    pub line_half_width: Option<f64>,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            nominal_height_mm: default_nominal_height(),
            min_height_mm: default_min_height(),
            height_key: default_height_key(),
            line_half_width: None,
        }
    }
}

/// Typed options for one pipeline run, resolved once before any stage runs
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PipelineConfig {
    #[serde(flatten)]
    pub dimensions: PrintDimensions,
    #[serde(default)]
    pub fill_rule: FillRule,
    #[serde(default)]
    pub allow_partial_coverage: bool,
    #[serde(default)]
    pub overlay: OverlayConfig,
    /// Overlay groups in priority order
    #[serde(default)]
    pub groups: Vec<TagGroup>,
}

/// Settings read from `terramesh.toml`
#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub dem: Vec<PathBuf>,
    #[serde(default)]
    pub dsm: Vec<PathBuf>,
    #[serde(default)]
    pub boundary: Option<PathBuf>,
    #[serde(default)]
    pub features: Option<PathBuf>,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(flatten)]
    pub pipeline: PipelineConfig,
}

impl FileConfig {
    pub fn load() -> Option<Self> {
        let config_paths = get_config_paths();

        for path in config_paths {
            if path.exists()
                && let Ok(contents) = std::fs::read_to_string(&path)
            {
                match toml::from_str(&contents) {
                    Ok(config) => return Some(config),
                    Err(e) => {
                        warn!("Failed to parse config file {:?}: {}", path, e);
                    }
                }
            }
        }
        None
    }
}

fn get_config_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("terramesh.toml"));
    paths.push(PathBuf::from(".terramesh.toml"));

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("terramesh").join("config.toml"));
        paths.push(config_dir.join("terramesh.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(".terramesh.toml"));
    }

    paths
}
