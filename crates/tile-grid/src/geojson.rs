//! Loading the tile grid from a GeoJSON FeatureCollection.
//!
//! Each feature must carry a `Polygon` geometry and a string (or integer)
//! identifier under a configurable property name. Coordinates must already
//! be in the CRS used by ingested scenes.

use std::collections::HashMap;
use std::path::Path;

use geo::{LineString, Polygon};
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument};

use crate::error::{Result, TileGridError};
use crate::grid::{TileGrid, TilePolygon};

/// Top-level GeoJSON document of a tile grid.
#[derive(Debug, Deserialize)]
struct FeatureCollection {
    #[serde(rename = "type")]
    type_: String,
    features: Vec<Feature>,
}

#[derive(Debug, Deserialize)]
struct Feature {
    #[serde(default)]
    properties: Option<HashMap<String, Value>>,
    #[serde(default)]
    geometry: Option<Geometry>,
}

/// Geometry of one tile; anything but a polygon is rejected after parsing.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum Geometry {
    Polygon {
        /// Linear rings, exterior first. Positions may carry extra ordinates.
        coordinates: Vec<Vec<Vec<f64>>>,
    },
    #[serde(other)]
    Unsupported,
}

impl TileGrid {
    /// Read a tile grid from a GeoJSON file on disk.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn from_geojson_path(path: impl AsRef<Path>, id_property: &str) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            TileGridError::configuration(format!(
                "cannot read tile grid {}: {}",
                path.display(),
                e
            ))
        })?;

        let grid = Self::from_geojson_str(&text, id_property)?;
        info!(tiles = grid.len(), "Loaded tile grid");
        Ok(grid)
    }

    /// Parse a tile grid from GeoJSON text.
    pub fn from_geojson_str(text: &str, id_property: &str) -> Result<Self> {
        let collection: FeatureCollection = serde_json::from_str(text)
            .map_err(|e| TileGridError::configuration(format!("invalid GeoJSON: {}", e)))?;

        if collection.type_ != "FeatureCollection" {
            return Err(TileGridError::configuration(format!(
                "tile grid must be a GeoJSON FeatureCollection, got '{}'",
                collection.type_
            )));
        }

        let tiles = collection
            .features
            .into_iter()
            .enumerate()
            .map(|(index, feature)| feature.into_tile(index, id_property))
            .collect::<Result<Vec<_>>>()?;

        TileGrid::new(tiles)
    }
}

impl Feature {
    fn into_tile(self, index: usize, id_property: &str) -> Result<TilePolygon> {
        let id = match self.properties.as_ref().and_then(|p| p.get(id_property)) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(TileGridError::configuration(format!(
                    "feature {} has no '{}' property",
                    index, id_property
                )))
            }
        };

        let rings = match self.geometry {
            Some(Geometry::Polygon { coordinates }) => coordinates,
            Some(Geometry::Unsupported) => {
                return Err(TileGridError::configuration(format!(
                    "tile '{}' geometry must be a Polygon",
                    id
                )))
            }
            None => {
                return Err(TileGridError::configuration(format!(
                    "tile '{}' has no geometry",
                    id
                )))
            }
        };

        let mut rings = rings
            .into_iter()
            .map(|ring| to_line_string(&id, ring))
            .collect::<Result<Vec<_>>>()?
            .into_iter();

        let exterior = rings
            .next()
            .ok_or_else(|| TileGridError::configuration(format!("tile '{}' has no rings", id)))?;
        let polygon = Polygon::new(exterior, rings.collect());

        TilePolygon::new(id, polygon).map_err(|e| TileGridError::configuration(e.to_string()))
    }
}

fn to_line_string(id: &str, ring: Vec<Vec<f64>>) -> Result<LineString<f64>> {
    if ring.len() < 4 {
        return Err(TileGridError::configuration(format!(
            "tile '{}' ring has fewer than 4 positions",
            id
        )));
    }

    let coords = ring
        .into_iter()
        .map(|position| match position.as_slice() {
            [x, y, ..] => Ok((*x, *y)),
            _ => Err(TileGridError::configuration(format!(
                "tile '{}' has a malformed position {:?}",
                id, position
            ))),
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(LineString::from(coords))
}
