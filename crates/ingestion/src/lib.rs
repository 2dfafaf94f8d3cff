//! Scene ingestion into the tile mosaic.
//!
//! # Architecture
//!
//! ```text
//! scene file ──load_scene──► IngestionRequest
//!                                 │
//!                                 ▼
//!                  IngestionDriver::ingest
//!                                 │
//!          ├─► TileGrid::tiles_intersecting_footprint
//!          ├─► GridLattice::layout_for (per tile)
//!          ├─► TileCompositor::composite (under the tile's lock)
//!          └─► CatalogSink::notify
//!                                 │
//!                                 ▼
//!                         IngestionReport
//! ```
//!
//! Configuration comes from YAML with environment overrides, see
//! [`IngestionConfig`].

pub mod config;
pub mod driver;
pub mod error;
pub mod locks;
pub mod report;
pub mod request;
pub mod scene;

pub use config::{IngestionConfig, LoggingConfig, StorageConfig, TileGridConfig};
pub use driver::IngestionDriver;
pub use error::{IngestionError, Result};
pub use locks::TileLocks;
pub use report::{IngestionReport, PerTileResult, TileStatus};
pub use request::IngestionRequest;
pub use scene::{load_mask, load_scene, mask_path};
