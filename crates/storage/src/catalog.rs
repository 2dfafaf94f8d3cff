//! Catalog notification after successful ingestion.
//!
//! The catalog is an index of which scenes touched which tiles. It is not
//! needed for compositing correctness, so sinks are best-effort.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::{Result, StorageError};

/// One ingestion event: a scene and the tiles it updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub source_id: String,
    /// Tiles whose pixels changed.
    pub merged_tiles: Vec<String>,
    /// Tiles where the scene was recorded without changing pixels.
    pub recorded_tiles: Vec<String>,
    pub ingested_at: DateTime<Utc>,
}

impl CatalogEntry {
    pub fn new(
        source_id: impl Into<String>,
        merged_tiles: Vec<String>,
        recorded_tiles: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source_id: source_id.into(),
            merged_tiles,
            recorded_tiles,
            ingested_at: Utc::now(),
        }
    }

    /// True when the entry lists no tiles at all.
    pub fn is_empty(&self) -> bool {
        self.merged_tiles.is_empty() && self.recorded_tiles.is_empty()
    }
}

/// Receiver of ingestion events.
pub trait CatalogSink: Send + Sync {
    fn notify(&self, entry: &CatalogEntry) -> Result<()>;
}

/// Appends one JSON object per line to a local file.
#[derive(Debug)]
pub struct JsonLinesCatalog {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All entries written so far; an absent file holds none.
    pub fn entries(&self) -> Result<Vec<CatalogEntry>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).map_err(StorageError::from))
            .collect()
    }
}

impl CatalogSink for JsonLinesCatalog {
    fn notify(&self, entry: &CatalogEntry) -> Result<()> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let _guard = self
            .lock
            .lock()
            .map_err(|_| StorageError::Catalog("catalog lock poisoned".to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;

        debug!(source_id = %entry.source_id, tiles = entry.merged_tiles.len(), "Catalog entry appended");
        Ok(())
    }
}

/// Sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCatalog;

impl CatalogSink for NullCatalog {
    fn notify(&self, _entry: &CatalogEntry) -> Result<()> {
        Ok(())
    }
}
