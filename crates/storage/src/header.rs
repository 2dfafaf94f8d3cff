//! Key/value header carried at the top of every tile file.
//!
//! A [`HeaderFields`] value is immutable: each `with_*` method consumes the
//! header and returns an updated copy, so a header is assembled in one
//! expression and handed to the codec at write time.
//!
//! Text form is one `key = value` pair per line. List values are written as
//! `{a, b, c}`. Keys are case-insensitive and stored lowercased; unknown keys
//! survive a parse/serialize cycle untouched.

use tile_common::{DataType, GeoTransform, RasterDataset, Sensor};

use crate::error::{Result, StorageError};
use crate::provenance::ProvenanceRecord;

pub const KEY_SAMPLES: &str = "samples";
pub const KEY_LINES: &str = "lines";
pub const KEY_BANDS: &str = "bands";
pub const KEY_DATA_TYPE: &str = "data type";
pub const KEY_BYTE_ORDER: &str = "byte order";
pub const KEY_INTERLEAVE: &str = "interleave";
pub const KEY_GEOTRANSFORM: &str = "geotransform";
pub const KEY_NODATA: &str = "data ignore value";
pub const KEY_SOURCE_IDS: &str = "source ids";
pub const KEY_SOURCE_ID: &str = "source id";
pub const KEY_SENSOR: &str = "sensor";
pub const KEY_BAND_NAMES: &str = "band names";

/// Little-endian, the only byte order written.
const BYTE_ORDER_LE: &str = "0";
/// Band-sequential layout, the only interleave written.
const INTERLEAVE_BSQ: &str = "bsq";

/// Ordered key/value header of a tile or scene file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderFields {
    fields: Vec<(String, String)>,
}

impl HeaderFields {
    pub fn new() -> Self {
        Self::default()
    }

    /// Structural description of `raster`: shape, type, layout and georeferencing.
    pub fn describe(raster: &RasterDataset) -> Self {
        Self::new().with_raster(raster)
    }

    /// Replace the structural fields with those of `raster`, keeping all others.
    pub fn with_raster(self, raster: &RasterDataset) -> Self {
        let gt = raster.geotransform().coefficients();
        self.with_field(KEY_SAMPLES, raster.width().to_string())
            .with_field(KEY_LINES, raster.height().to_string())
            .with_field(KEY_BANDS, raster.band_count().to_string())
            .with_field(KEY_DATA_TYPE, raster.data_type().as_str())
            .with_field(KEY_BYTE_ORDER, BYTE_ORDER_LE)
            .with_field(KEY_INTERLEAVE, INTERLEAVE_BSQ)
            .with_list(KEY_GEOTRANSFORM, gt.iter().map(|c| c.to_string()))
            .with_field(KEY_NODATA, raster.nodata().to_string())
    }

    /// Set the provenance list.
    pub fn with_sources(self, sources: &ProvenanceRecord) -> Self {
        self.with_field(KEY_SOURCE_IDS, format!("{{{}}}", sources.to_list_string()))
    }

    /// Tag with a sensor and its band names.
    pub fn with_sensor(self, sensor: Sensor) -> Self {
        let profile = sensor.profile();
        self.with_field(KEY_SENSOR, sensor.as_str())
            .with_list(KEY_BAND_NAMES, profile.band_names.iter().copied())
    }

    /// Set a list-valued field.
    pub fn with_list<I, S>(self, key: &str, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = values
            .into_iter()
            .map(|v| v.as_ref().trim().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        self.with_field(key, format!("{{{}}}", joined))
    }

    /// Set a field, replacing any existing value for the same key.
    ///
    /// Line breaks in values are folded to spaces.
    pub fn with_field(mut self, key: &str, value: impl Into<String>) -> Self {
        let key = normalize_key(key);
        let value = value.into().replace(['\r', '\n'], " ").trim().to_string();
        match self.fields.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        let key = normalize_key(key);
        self.fields
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Provenance recorded in this header (empty when absent).
    pub fn sources(&self) -> ProvenanceRecord {
        self.get(KEY_SOURCE_IDS)
            .map(ProvenanceRecord::parse_list)
            .unwrap_or_default()
    }

    /// Sensor tag, if any.
    pub fn sensor(&self) -> Result<Option<Sensor>> {
        self.get(KEY_SENSOR)
            .map(|name| name.parse::<Sensor>().map_err(StorageError::from))
            .transpose()
    }

    /// Serialize as `key = value` lines.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push_str(" = ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Parse `key = value` lines. Blank lines are ignored.
    pub fn parse(text: &str) -> Result<Self> {
        text.lines().try_fold(Self::new(), |header, line| {
            let line = line.trim();
            if line.is_empty() {
                return Ok(header);
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                StorageError::Format(format!("header line without '=': {:?}", line))
            })?;
            if key.trim().is_empty() {
                return Err(StorageError::Format(format!(
                    "header line without key: {:?}",
                    line
                )));
            }
            Ok(header.with_field(key, value))
        })
    }

    /// Shape, type and georeferencing described by the structural fields.
    pub fn raster_layout(&self) -> Result<RasterLayout> {
        let byte_order = self.get(KEY_BYTE_ORDER).unwrap_or(BYTE_ORDER_LE);
        if byte_order != BYTE_ORDER_LE {
            return Err(StorageError::Format(format!(
                "unsupported byte order {}",
                byte_order
            )));
        }
        let interleave = self.get(KEY_INTERLEAVE).unwrap_or(INTERLEAVE_BSQ);
        if !interleave.eq_ignore_ascii_case(INTERLEAVE_BSQ) {
            return Err(StorageError::Format(format!(
                "unsupported interleave {}",
                interleave
            )));
        }

        let coeffs = self
            .require_list(KEY_GEOTRANSFORM)?
            .iter()
            .map(|c| parse_number::<f64>(KEY_GEOTRANSFORM, c))
            .collect::<Result<Vec<_>>>()?;
        let coeffs: [f64; 6] = coeffs.try_into().map_err(|v: Vec<f64>| {
            StorageError::Format(format!("geotransform has {} coefficients, expected 6", v.len()))
        })?;

        Ok(RasterLayout {
            width: parse_number(KEY_SAMPLES, self.require(KEY_SAMPLES)?)?,
            height: parse_number(KEY_LINES, self.require(KEY_LINES)?)?,
            band_count: parse_number(KEY_BANDS, self.require(KEY_BANDS)?)?,
            data_type: DataType::from_name(self.require(KEY_DATA_TYPE)?)?,
            geotransform: GeoTransform::from_coefficients(coeffs)?,
            nodata: parse_number(KEY_NODATA, self.require(KEY_NODATA)?)?,
        })
    }

    fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| StorageError::Format(format!("missing header field '{}'", key)))
    }

    fn require_list(&self, key: &str) -> Result<Vec<String>> {
        self.require(key).map(split_list)
    }
}

/// Structural description parsed from a header.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterLayout {
    pub width: usize,
    pub height: usize,
    pub band_count: usize,
    pub data_type: DataType,
    pub geotransform: GeoTransform,
    pub nodata: f64,
}

impl RasterLayout {
    /// Bytes of one band; fails when the dimensions overflow `usize`.
    pub fn band_len(&self) -> Result<usize> {
        self.width
            .checked_mul(self.height)
            .and_then(|n| n.checked_mul(self.data_type.size_bytes()))
            .ok_or_else(|| {
                StorageError::Format(format!(
                    "raster {}x{} {} is too large",
                    self.width, self.height, self.data_type
                ))
            })
    }
}

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

fn split_list(value: &str) -> Vec<String> {
    let inner = value
        .trim()
        .strip_prefix('{')
        .and_then(|v| v.strip_suffix('}'))
        .unwrap_or(value);
    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| StorageError::Format(format!("invalid value for '{}': {:?}", key, value)))
}
