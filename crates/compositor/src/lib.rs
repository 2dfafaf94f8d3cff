//! Compositing of source scenes into persistent tile rasters.
//!
//! # Architecture
//!
//! ```text
//! Scene + TileLayout
//!      │
//!      ▼
//! FootprintClipper::clip ──► aligned pixel windows (or no overlap)
//!      │
//!      ▼
//! TileCompositor::composite
//!      │
//!      ├─► ProvenanceLedger::contains (header-only read)
//!      ├─► load tile or synthesize an all no-data tile
//!      ├─► merge_bands (pure merge_band per band, in parallel)
//!      └─► TileStorage::write (pixels and provenance together)
//! ```

pub mod clip;
pub mod compositor;
pub mod config;
pub mod error;
pub mod merge;

pub use clip::{ClipError, ClipWindows, FootprintClipper, PixelWindow};
pub use compositor::{CompositeOutcome, CompositeRequest, SkipReason, TileCompositor};
pub use config::CompositingConfig;
pub use error::{CompositeError, Result};
pub use merge::{merge_band, merge_bands, CompositeMode, MergePlan, MergedBand};
