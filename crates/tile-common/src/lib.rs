//! Common types shared across the tile mosaic crates.
//!
//! Covers geographic extents, the affine pixel/world mapping, in-memory
//! raster datasets with their element types, validity masks and the
//! static sensor profile table.

pub mod bbox;
pub mod error;
pub mod geotransform;
pub mod raster;
pub mod sensor;

pub use bbox::BoundingBox;
pub use error::{TileError, TileResult};
pub use geotransform::GeoTransform;
pub use raster::{BoolGrid, DataType, NoDataMatcher, Pixel, RasterDataset};
pub use sensor::{Sensor, SensorProfile};
