//! Provenance: the set of source scenes already merged into a tile.

use std::collections::BTreeSet;

use tracing::debug;

use crate::error::{Result, StorageError};
use crate::tile_store::TileStorage;

/// Characters that would break the comma-delimited list form.
const RESERVED: &[char] = &[',', '{', '}', '\n', '\r'];

/// Membership set of source identifiers merged into one tile.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProvenanceRecord {
    sources: BTreeSet<String>,
}

impl ProvenanceRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a comma-delimited list, with or without surrounding braces.
    ///
    /// Entries are trimmed; empty entries and repeats are dropped.
    pub fn parse_list(text: &str) -> Self {
        let trimmed = text.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|t| t.strip_suffix('}'))
            .unwrap_or(trimmed);
        inner.split(',').collect()
    }

    /// Comma-delimited list without braces, in sorted order.
    pub fn to_list_string(&self) -> String {
        self.sources
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// True when `source_id` can be stored without changing on a round trip.
    pub fn is_valid_source_id(source_id: &str) -> bool {
        let trimmed = source_id.trim();
        !trimmed.is_empty() && trimmed == source_id && !source_id.contains(RESERVED)
    }

    pub fn contains(&self, source_id: &str) -> bool {
        self.sources.contains(source_id.trim())
    }

    /// Add a source; returns false if it was already present.
    pub fn insert(&mut self, source_id: &str) -> bool {
        let trimmed = source_id.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.sources.insert(trimmed.to_string())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for ProvenanceRecord {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut record = Self::new();
        for source in iter {
            record.insert(source.as_ref());
        }
        record
    }
}

/// Provenance queries and updates against tiles held in a [`TileStorage`].
pub struct ProvenanceLedger<'a, S: TileStorage + ?Sized> {
    store: &'a S,
}

impl<'a, S: TileStorage + ?Sized> ProvenanceLedger<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Provenance of a tile; empty when the tile does not exist.
    pub fn sources(&self, tile_id: &str) -> Result<ProvenanceRecord> {
        Ok(self
            .store
            .read_header(tile_id)?
            .map(|header| header.sources())
            .unwrap_or_default())
    }

    /// Whether `source_id` has already been merged into `tile_id`.
    ///
    /// Reads only the tile header.
    pub fn contains(&self, tile_id: &str, source_id: &str) -> Result<bool> {
        Ok(self.sources(tile_id)?.contains(source_id))
    }

    /// Idempotently add `source_id` to an existing tile's provenance.
    ///
    /// The pixel payload is rewritten unchanged together with the new header
    /// in one atomic write. Returns false when the source was already present.
    pub fn record(&self, tile_id: &str, source_id: &str) -> Result<bool> {
        let mut tile = self
            .store
            .read(tile_id)?
            .ok_or_else(|| StorageError::NotFound(tile_id.to_string()))?;

        let mut sources = tile.provenance();
        if !sources.insert(source_id) {
            return Ok(false);
        }

        tile.header = tile.header.with_sources(&sources);
        self.store.write(tile_id, &tile)?;
        debug!(tile_id = %tile_id, source_id = %source_id, sources = sources.len(), "Recorded provenance");
        Ok(true)
    }
}
