//! Persistent tile storage backends.
//!
//! Every backend replaces a tile's header and pixels in one step: a reader
//! sees either the previous tile file or the new one, never a mix.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use tempfile::NamedTempFile;
use tracing::{debug, instrument};

use tile_common::RasterDataset;

use crate::codec;
use crate::error::{Result, StorageError};
use crate::header::HeaderFields;
use crate::provenance::ProvenanceRecord;

/// File extension of tile files.
pub const TILE_EXTENSION: &str = "tile";

/// A tile raster together with its header metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTile {
    pub raster: RasterDataset,
    pub header: HeaderFields,
}

impl StoredTile {
    pub fn new(raster: RasterDataset, header: HeaderFields) -> Self {
        Self { raster, header }
    }

    /// Source identifiers recorded in the header.
    pub fn provenance(&self) -> ProvenanceRecord {
        self.header.sources()
    }
}

/// Storage for tile files keyed by tile identifier.
pub trait TileStorage: Send + Sync {
    /// Header of a stored tile without reading its pixels.
    fn read_header(&self, tile_id: &str) -> Result<Option<HeaderFields>>;

    /// Full tile, or `None` when it has never been written.
    fn read(&self, tile_id: &str) -> Result<Option<StoredTile>>;

    /// Atomically create or replace a tile.
    fn write(&self, tile_id: &str, tile: &StoredTile) -> Result<()>;

    /// Identifiers of all stored tiles, sorted.
    fn tile_ids(&self) -> Result<Vec<String>>;

    fn exists(&self, tile_id: &str) -> Result<bool> {
        Ok(self.read_header(tile_id)?.is_some())
    }
}

/// Tile files in a local directory, one `<tile_id>.tile` file per tile.
///
/// Writes go to a temporary file in the same directory which is then
/// renamed over the tile path.
#[derive(Debug, Clone)]
pub struct FsTileStore {
    root: PathBuf,
}

impl FsTileStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the file backing `tile_id`.
    pub fn tile_path(&self, tile_id: &str) -> PathBuf {
        self.root.join(format!("{}.{}", tile_id, TILE_EXTENSION))
    }

    fn open_existing(&self, tile_id: &str) -> Result<Option<File>> {
        match File::open(self.tile_path(tile_id)) {
            Ok(file) => Ok(Some(file)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl TileStorage for FsTileStore {
    fn read_header(&self, tile_id: &str) -> Result<Option<HeaderFields>> {
        let Some(file) = self.open_existing(tile_id)? else {
            return Ok(None);
        };
        let mut reader = BufReader::new(file);
        codec::read_header(&mut reader).map(Some)
    }

    #[instrument(skip(self), fields(root = %self.root.display()))]
    fn read(&self, tile_id: &str) -> Result<Option<StoredTile>> {
        let bytes = match fs::read(self.tile_path(tile_id)) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        debug!(size = bytes.len(), "Read tile file");
        codec::decode_tile(&bytes).map(Some)
    }

    #[instrument(skip(self, tile), fields(root = %self.root.display()))]
    fn write(&self, tile_id: &str, tile: &StoredTile) -> Result<()> {
        let path = self.tile_path(tile_id);
        let temp = NamedTempFile::new_in(&self.root)?;

        let mut writer = BufWriter::new(temp);
        codec::write_tile(tile, &mut writer)?;
        let temp = writer
            .into_inner()
            .map_err(|e| StorageError::Io(e.into_error()))?;
        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| StorageError::Io(e.error))?;

        debug!(path = %path.display(), bytes = tile.raster.payload_len(), "Wrote tile file");
        Ok(())
    }

    fn tile_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(TILE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// In-memory store holding encoded tile files.
///
/// Tiles pass through the same codec as [`FsTileStore`], so reads return
/// independent copies.
#[derive(Debug, Default)]
pub struct MemoryTileStore {
    tiles: RwLock<HashMap<String, Vec<u8>>>,
    writes: AtomicUsize,
}

impl MemoryTileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful writes since creation.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Encoded file bytes of a tile.
    pub fn raw_bytes(&self, tile_id: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.guard_read()?.get(tile_id).cloned())
    }

    fn guard_read(
        &self,
    ) -> Result<std::sync::RwLockReadGuard<'_, HashMap<String, Vec<u8>>>> {
        self.tiles
            .read()
            .map_err(|_| StorageError::Backend("tile map lock poisoned".to_string()))
    }
}

impl TileStorage for MemoryTileStore {
    fn read_header(&self, tile_id: &str) -> Result<Option<HeaderFields>> {
        let tiles = self.guard_read()?;
        match tiles.get(tile_id) {
            Some(bytes) => codec::read_header(&mut bytes.as_slice()).map(Some),
            None => Ok(None),
        }
    }

    fn read(&self, tile_id: &str) -> Result<Option<StoredTile>> {
        let tiles = self.guard_read()?;
        tiles
            .get(tile_id)
            .map(|bytes| codec::decode_tile(bytes))
            .transpose()
    }

    fn write(&self, tile_id: &str, tile: &StoredTile) -> Result<()> {
        let bytes = codec::encode_tile(tile)?;
        let mut tiles = self
            .tiles
            .write()
            .map_err(|_| StorageError::Backend("tile map lock poisoned".to_string()))?;
        tiles.insert(tile_id.to_string(), bytes);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn tile_ids(&self) -> Result<Vec<String>> {
        let mut ids: Vec<String> = self.guard_read()?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}
