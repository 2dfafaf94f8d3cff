//! Sensor profiles for the supported acquisition platforms.
//!
//! Profiles are a closed, typed table keyed by [`Sensor`]. Configuration
//! and scene headers name a sensor by string; the name is resolved here
//! once, so an unknown sensor is rejected at load time instead of at the
//! point where its bands are used.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::TileError;
use crate::raster::DataType;

/// Acquisition platform of a source scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sensor {
    Landsat5Tm,
    Landsat7Etm,
    Landsat8Oli,
    Sentinel2Msi,
}

/// Static description of what a sensor's surface-reflectance scenes look like.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorProfile {
    pub sensor: Sensor,
    /// Short identifier stored in tile headers.
    pub code: &'static str,
    pub band_names: &'static [&'static str],
    pub data_type: DataType,
    pub nodata: f64,
    /// Nominal pixel size in metres after reprojection to the tile grid.
    pub pixel_size: f64,
}

const LANDSAT_TM_BANDS: &[&str] = &["blue", "green", "red", "nir", "swir1", "swir2"];
const LANDSAT_OLI_BANDS: &[&str] = &["coastal", "blue", "green", "red", "nir", "swir1", "swir2"];
const SENTINEL2_BANDS: &[&str] = &[
    "blue", "green", "red", "rededge1", "rededge2", "rededge3", "nir", "nir08", "swir1", "swir2",
];

static PROFILES: [SensorProfile; 4] = [
    SensorProfile {
        sensor: Sensor::Landsat5Tm,
        code: "LT05",
        band_names: LANDSAT_TM_BANDS,
        data_type: DataType::Int16,
        nodata: -9999.0,
        pixel_size: 30.0,
    },
    SensorProfile {
        sensor: Sensor::Landsat7Etm,
        code: "LE07",
        band_names: LANDSAT_TM_BANDS,
        data_type: DataType::Int16,
        nodata: -9999.0,
        pixel_size: 30.0,
    },
    SensorProfile {
        sensor: Sensor::Landsat8Oli,
        code: "LC08",
        band_names: LANDSAT_OLI_BANDS,
        data_type: DataType::Int16,
        nodata: -9999.0,
        pixel_size: 30.0,
    },
    SensorProfile {
        sensor: Sensor::Sentinel2Msi,
        code: "S2",
        band_names: SENTINEL2_BANDS,
        data_type: DataType::UInt16,
        nodata: 0.0,
        pixel_size: 30.0,
    },
];

impl Sensor {
    pub fn profile(&self) -> &'static SensorProfile {
        match self {
            Sensor::Landsat5Tm => &PROFILES[0],
            Sensor::Landsat7Etm => &PROFILES[1],
            Sensor::Landsat8Oli => &PROFILES[2],
            Sensor::Sentinel2Msi => &PROFILES[3],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Sensor::Landsat5Tm => "landsat5_tm",
            Sensor::Landsat7Etm => "landsat7_etm",
            Sensor::Landsat8Oli => "landsat8_oli",
            Sensor::Sentinel2Msi => "sentinel2_msi",
        }
    }

    /// All known sensors, in table order.
    pub fn all() -> impl Iterator<Item = Sensor> {
        PROFILES.iter().map(|p| p.sensor)
    }

    /// Guess the sensor from a scene identifier prefix (e.g. `LC08_...`).
    pub fn from_scene_id(scene_id: &str) -> Option<Sensor> {
        let upper = scene_id.to_uppercase();
        PROFILES
            .iter()
            .find(|p| upper.starts_with(p.code))
            .map(|p| p.sensor)
    }
}

impl FromStr for Sensor {
    type Err = TileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Sensor::all()
            .find(|sensor| sensor.as_str() == lower || sensor.profile().code.eq_ignore_ascii_case(&lower))
            .ok_or_else(|| TileError::UnknownSensor(s.to_string()))
    }
}

impl std::fmt::Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl SensorProfile {
    pub fn band_count(&self) -> usize {
        self.band_names.len()
    }
}
