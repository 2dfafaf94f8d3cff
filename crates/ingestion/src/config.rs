//! Ingestion configuration.
//!
//! Loaded from a YAML file with `${VAR}` and `${VAR:-default}` substitution,
//! then overridden by environment variables:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `TILE_GRID_PATH` | `tile_grid.path` |
//! | `TILE_DIR` | `storage.tile_dir` |
//! | `CATALOG_PATH` | `storage.catalog_path` |
//! | `PARALLEL_SCENES` | `parallel_scenes` |
//! | `LOG_LEVEL` | `logging.level` |
//! | `LOG_FORMAT` | `logging.format` |
//! | `COMPOSITE_MODE`, `RECORD_NO_CHANGE`, `MASK_SOURCE_NODATA` | `compositing.*` |

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use compositor::CompositingConfig;
use tile_grid::GridLattice;

use crate::error::{IngestionError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionConfig {
    pub tile_grid: TileGridConfig,
    pub storage: StorageConfig,
    #[serde(default)]
    pub compositing: CompositingConfig,
    /// Scenes ingested concurrently by the service.
    #[serde(default = "default_parallel_scenes")]
    pub parallel_scenes: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileGridConfig {
    /// GeoJSON FeatureCollection of tile polygons.
    pub path: PathBuf,
    /// Feature property holding the tile id.
    #[serde(default = "default_id_property")]
    pub id_property: String,
    #[serde(default = "default_pixel_size")]
    pub pixel_size: f64,
    #[serde(default)]
    pub origin_x: f64,
    #[serde(default)]
    pub origin_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory holding one `<tile_id>.tile` file per tile.
    pub tile_dir: PathBuf,
    /// JSON lines ingestion log; disabled when absent.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// `pretty` or `json`.
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

fn default_parallel_scenes() -> usize {
    4
}

fn default_id_property() -> String {
    "tile_id".to_string()
}

fn default_pixel_size() -> f64 {
    30.0
}

impl IngestionConfig {
    /// Load, apply environment overrides and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            IngestionError::Configuration(format!("failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml_str(&content)?.with_env_overrides();
        config.validate()?;
        debug!(path = %path.display(), "Loaded ingestion config");
        Ok(config)
    }

    /// Parse YAML after `${VAR}` substitution, without overrides or validation.
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let expanded = shellexpand::env(content).map_err(|e| {
            IngestionError::Configuration(format!("variable substitution failed: {}", e))
        })?;
        serde_yaml::from_str(&expanded)
            .map_err(|e| IngestionError::Configuration(format!("invalid config: {}", e)))
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("TILE_GRID_PATH") {
            self.tile_grid.path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("TILE_DIR") {
            self.storage.tile_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("CATALOG_PATH") {
            self.storage.catalog_path = if val.is_empty() {
                None
            } else {
                Some(PathBuf::from(val))
            };
        }
        if let Ok(val) = std::env::var("PARALLEL_SCENES") {
            if let Ok(n) = val.parse() {
                self.parallel_scenes = n;
            }
        }
        if let Ok(val) = std::env::var("LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("LOG_FORMAT") {
            self.logging.format = val;
        }
        self.compositing = self.compositing.with_env_overrides();
        self
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| IngestionError::Configuration(msg);

        if self.tile_grid.id_property.trim().is_empty() {
            return Err(invalid("tile_grid.id_property must not be empty".to_string()));
        }
        self.lattice()
            .validate()
            .map_err(|e| invalid(format!("tile_grid: {}", e)))?;
        self.compositing
            .validate()
            .map_err(|e| invalid(format!("compositing: {}", e)))?;
        if self.parallel_scenes == 0 {
            return Err(invalid("parallel_scenes must be at least 1".to_string()));
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(invalid(format!(
                "logging.format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            )));
        }
        Ok(())
    }

    /// Pixel lattice shared by every tile raster.
    pub fn lattice(&self) -> GridLattice {
        GridLattice::new(
            self.tile_grid.pixel_size,
            self.tile_grid.origin_x,
            self.tile_grid.origin_y,
        )
    }
}
