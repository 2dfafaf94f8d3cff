//! The fixed tile grid that partitions the area of interest.
//!
//! Tiles are named polygons in the same projected CRS as every ingested
//! scene. The grid answers "which tiles does this footprint touch" and
//! derives the pixel layout each tile raster uses on the shared lattice.

pub mod error;
pub mod geojson;
pub mod grid;
pub mod layout;

pub use error::{Result, TileGridError};
pub use grid::{TileGrid, TilePolygon};
pub use layout::{GridLattice, TileLayout};
