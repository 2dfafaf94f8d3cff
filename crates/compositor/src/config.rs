//! Compositing behaviour settings.

use serde::{Deserialize, Serialize};

use crate::merge::CompositeMode;

/// Settings for [`TileCompositor`](crate::TileCompositor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositingConfig {
    /// Mode used when a request does not name one.
    pub default_mode: CompositeMode,

    /// Record a source in an existing tile's provenance even when it changed
    /// no pixels, so the scene is not reconsidered on a later run.
    pub record_no_change: bool,

    /// Treat source pixels equal to the scene's no-data value as invalid
    /// when no explicit mask is supplied.
    pub mask_source_nodata: bool,

    /// Relative tolerance when comparing tile and source pixel sizes.
    pub resolution_tolerance: f64,
}

impl Default for CompositingConfig {
    fn default() -> Self {
        Self {
            default_mode: CompositeMode::OverwriteNoDataOnly,
            record_no_change: true,
            mask_source_nodata: false,
            resolution_tolerance: crate::clip::DEFAULT_RESOLUTION_TOLERANCE,
        }
    }
}

impl CompositingConfig {
    /// Apply overrides from environment variables.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(val) = std::env::var("COMPOSITE_MODE") {
            if let Ok(mode) = val.parse() {
                self.default_mode = mode;
            }
        }

        if let Ok(val) = std::env::var("RECORD_NO_CHANGE") {
            self.record_no_change = parse_flag(&val);
        }

        if let Ok(val) = std::env::var("MASK_SOURCE_NODATA") {
            self.mask_source_nodata = parse_flag(&val);
        }

        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !(self.resolution_tolerance.is_finite() && self.resolution_tolerance >= 0.0) {
            return Err(format!(
                "resolution_tolerance must be >= 0, got {}",
                self.resolution_tolerance
            ));
        }
        Ok(())
    }
}

fn parse_flag(val: &str) -> bool {
    matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}
