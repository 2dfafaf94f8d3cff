//! Persistence for tile mosaics.
//!
//! Provides:
//! - [`HeaderFields`], the immutable key/value header of a tile file
//! - the single-file tile codec (header, `end header` marker, payload)
//! - [`TileStorage`] with an atomic filesystem backend and an in-memory one
//! - [`ProvenanceRecord`] and [`ProvenanceLedger`] for per-tile source tracking
//! - catalog sinks notified after ingestion

pub mod catalog;
pub mod codec;
pub mod error;
pub mod header;
pub mod provenance;
pub mod tile_store;

pub use catalog::{CatalogEntry, CatalogSink, JsonLinesCatalog, NullCatalog};
pub use error::{Result, StorageError};
pub use header::{HeaderFields, RasterLayout};
pub use provenance::{ProvenanceLedger, ProvenanceRecord};
pub use tile_store::{FsTileStore, MemoryTileStore, StoredTile, TileStorage, TILE_EXTENSION};
