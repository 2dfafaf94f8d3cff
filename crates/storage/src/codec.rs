//! Single-file tile format.
//!
//! ```text
//! RASTER TILE
//! samples = 5000
//! lines = 5000
//! ...
//! source ids = {LC08_..., LE07_...}
//! end header
//! <band 0 bytes><band 1 bytes>...
//! ```
//!
//! The header and the little-endian band-sequential payload share one file,
//! so pixels and provenance are always replaced together.

use std::io::{BufRead, Write};

use tile_common::RasterDataset;

use crate::error::{Result, StorageError};
use crate::header::HeaderFields;
use crate::tile_store::StoredTile;

/// First line of every tile file.
pub const MAGIC: &str = "RASTER TILE";
/// Line terminating the header block.
pub const END_HEADER: &str = "end header";

/// Upper bound on header size, to fail fast on non-tile files.
const MAX_HEADER_BYTES: usize = 1 << 20;

/// Write a tile, with structural header fields derived from its raster.
pub fn write_tile<W: Write>(tile: &StoredTile, mut out: W) -> Result<()> {
    let header = tile.header.clone().with_raster(&tile.raster);
    out.write_all(MAGIC.as_bytes())?;
    out.write_all(b"\n")?;
    out.write_all(header.to_text().as_bytes())?;
    out.write_all(END_HEADER.as_bytes())?;
    out.write_all(b"\n")?;
    for band in tile.raster.bands() {
        out.write_all(band)?;
    }
    out.flush()?;
    Ok(())
}

/// Encode a tile into a byte vector.
pub fn encode_tile(tile: &StoredTile) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(tile.raster.payload_len() + 512);
    write_tile(tile, &mut out)?;
    Ok(out)
}

/// Read only the header block, leaving `reader` positioned at the payload.
pub fn read_header<R: BufRead>(reader: &mut R) -> Result<HeaderFields> {
    let mut text = String::new();
    let mut line = Vec::new();
    let mut first = true;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Err(StorageError::Format(format!(
                "missing '{}' marker",
                END_HEADER
            )));
        }
        let decoded = std::str::from_utf8(&line)
            .map_err(|_| StorageError::Format("header is not valid UTF-8".to_string()))?
            .trim();

        if first {
            if decoded != MAGIC {
                return Err(StorageError::Format(format!(
                    "expected '{}' on the first line, found {:?}",
                    MAGIC, decoded
                )));
            }
            first = false;
            continue;
        }
        if decoded.eq_ignore_ascii_case(END_HEADER) {
            break;
        }

        text.push_str(decoded);
        text.push('\n');
        if text.len() > MAX_HEADER_BYTES {
            return Err(StorageError::Format("header exceeds size limit".to_string()));
        }
    }

    HeaderFields::parse(&text)
}

/// Decode a complete tile file.
pub fn decode_tile(bytes: &[u8]) -> Result<StoredTile> {
    let mut reader = bytes;
    let header = read_header(&mut reader)?;
    let raster = raster_from_payload(&header, reader)?;
    Ok(StoredTile { raster, header })
}

/// Rebuild the raster described by `header` from its payload bytes.
pub fn raster_from_payload(header: &HeaderFields, payload: &[u8]) -> Result<RasterDataset> {
    let layout = header.raster_layout()?;
    let band_len = layout.band_len()?;
    let expected = band_len.checked_mul(layout.band_count).ok_or_else(|| {
        StorageError::Format(format!(
            "{} band(s) of {} bytes exceed the addressable size",
            layout.band_count, band_len
        ))
    })?;
    if payload.len() != expected {
        return Err(StorageError::Format(format!(
            "payload holds {} bytes, expected {} for {} band(s) of {}x{} {}",
            payload.len(),
            expected,
            layout.band_count,
            layout.width,
            layout.height,
            layout.data_type
        )));
    }

    let bands = if band_len == 0 {
        Vec::new()
    } else {
        payload.chunks_exact(band_len).map(<[u8]>::to_vec).collect()
    };

    Ok(RasterDataset::new(
        layout.width,
        layout.height,
        layout.data_type,
        layout.geotransform,
        layout.nodata,
        bands,
    )?)
}
