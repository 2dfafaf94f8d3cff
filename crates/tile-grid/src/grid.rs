//! Tile polygons and intersection queries.

use geo::{BoundingRect, Intersects, LineString, Polygon};
use tracing::debug;

use tile_common::BoundingBox;

use crate::error::{Result, TileGridError};

/// One named tile of the national grid. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct TilePolygon {
    id: String,
    polygon: Polygon<f64>,
    envelope: BoundingBox,
}

impl TilePolygon {
    /// Create a tile from its identifier and outline.
    ///
    /// Identifiers are short codes made of ASCII letters, digits, `_` or `-`.
    pub fn new(id: impl Into<String>, polygon: Polygon<f64>) -> Result<Self> {
        let id = id.into();
        validate_tile_id(&id)?;

        let rect = polygon
            .bounding_rect()
            .ok_or_else(|| TileGridError::invalid_tile(&id, "polygon has no vertices"))?;
        let envelope = BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y);

        if !(envelope.width() > 0.0 && envelope.height() > 0.0) {
            return Err(TileGridError::invalid_tile(&id, "polygon has zero area"));
        }

        Ok(Self {
            id,
            polygon,
            envelope,
        })
    }

    /// Rectangular tile covering `bbox`.
    pub fn from_bbox(id: impl Into<String>, bbox: BoundingBox) -> Result<Self> {
        Self::new(id, polygon_from_corners(&bbox.corners()))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn polygon(&self) -> &Polygon<f64> {
        &self.polygon
    }

    /// Bounding envelope of the tile outline.
    pub fn envelope(&self) -> BoundingBox {
        self.envelope
    }
}

/// Closed polygon through the given corners.
pub fn polygon_from_corners(corners: &[(f64, f64)]) -> Polygon<f64> {
    Polygon::new(LineString::from(corners.to_vec()), vec![])
}

fn validate_tile_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(TileGridError::invalid_tile(
            id,
            "identifier must be a non-empty alphanumeric code",
        ))
    }
}

/// Ordered collection of tiles. Iteration order is by tile id, so repeated
/// queries against the same grid return tiles in the same order.
#[derive(Debug, Clone)]
pub struct TileGrid {
    tiles: Vec<TilePolygon>,
}

impl TileGrid {
    /// Build a grid, rejecting empty grids and duplicate identifiers.
    pub fn new(mut tiles: Vec<TilePolygon>) -> Result<Self> {
        if tiles.is_empty() {
            return Err(TileGridError::configuration("tile grid contains no tiles"));
        }

        tiles.sort_by(|a, b| a.id.cmp(&b.id));
        if let Some(pair) = tiles.windows(2).find(|w| w[0].id == w[1].id) {
            return Err(TileGridError::configuration(format!(
                "duplicate tile id '{}'",
                pair[0].id
            )));
        }

        Ok(Self { tiles })
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TilePolygon> {
        self.tiles.iter()
    }

    /// Look up a tile by identifier.
    pub fn tile(&self, id: &str) -> Option<&TilePolygon> {
        self.tiles
            .binary_search_by(|t| t.id.as_str().cmp(id))
            .ok()
            .map(|idx| &self.tiles[idx])
    }

    /// Every tile whose polygon intersects `extent`, in tile-id order.
    ///
    /// `extent` must already be in the grid's CRS.
    pub fn tiles_intersecting(&self, extent: &Polygon<f64>) -> Vec<&TilePolygon> {
        let Some(rect) = extent.bounding_rect() else {
            return Vec::new();
        };
        let query = BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y);

        let hits: Vec<&TilePolygon> = self
            .tiles
            .iter()
            .filter(|tile| envelopes_touch(&tile.envelope, &query))
            .filter(|tile| tile.polygon.intersects(extent))
            .collect();

        debug!(
            candidates = self.tiles.len(),
            hits = hits.len(),
            "Resolved intersecting tiles"
        );
        hits
    }

    /// Tiles intersecting the quadrilateral through four raster corners.
    pub fn tiles_intersecting_footprint(&self, corners: &[(f64, f64); 4]) -> Vec<&TilePolygon> {
        self.tiles_intersecting(&polygon_from_corners(corners))
    }
}

/// Closed-interval envelope test, used only as a prefilter.
fn envelopes_touch(a: &BoundingBox, b: &BoundingBox) -> bool {
    a.min_x <= b.max_x && a.max_x >= b.min_x && a.min_y <= b.max_y && a.max_y >= b.min_y
}
