//! In-memory raster datasets.
//!
//! Pixel payloads are kept as little-endian bytes, one buffer per band in
//! row-major order, tagged with a [`DataType`]. Typed access goes through
//! the [`Pixel`] trait.

use serde::{Deserialize, Serialize};

use crate::bbox::BoundingBox;
use crate::error::{TileError, TileResult};
use crate::geotransform::GeoTransform;

/// Numeric element type shared by every band of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    UInt8,
    Int8,
    UInt16,
    Int16,
    UInt32,
    Int32,
    UInt64,
    Int64,
    Float32,
    Float64,
    /// Pair of `f32` (real, imaginary).
    Complex32,
    /// Pair of `f64` (real, imaginary).
    Complex64,
}

impl DataType {
    /// Size of one element in bytes.
    pub fn size_bytes(&self) -> usize {
        match self {
            DataType::UInt8 | DataType::Int8 => 1,
            DataType::UInt16 | DataType::Int16 => 2,
            DataType::UInt32 | DataType::Int32 | DataType::Float32 => 4,
            DataType::UInt64 | DataType::Int64 | DataType::Float64 | DataType::Complex32 => 8,
            DataType::Complex64 => 16,
        }
    }

    /// Stable name used in tile headers and configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::UInt8 => "uint8",
            DataType::Int8 => "int8",
            DataType::UInt16 => "uint16",
            DataType::Int16 => "int16",
            DataType::UInt32 => "uint32",
            DataType::Int32 => "int32",
            DataType::UInt64 => "uint64",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Complex32 => "complex32",
            DataType::Complex64 => "complex64",
        }
    }

    /// Parse a name produced by [`DataType::as_str`] (case-insensitive).
    pub fn from_name(name: &str) -> TileResult<Self> {
        let parsed = match name.trim().to_lowercase().as_str() {
            "uint8" => DataType::UInt8,
            "int8" => DataType::Int8,
            "uint16" => DataType::UInt16,
            "int16" => DataType::Int16,
            "uint32" => DataType::UInt32,
            "int32" => DataType::Int32,
            "uint64" => DataType::UInt64,
            "int64" => DataType::Int64,
            "float32" => DataType::Float32,
            "float64" => DataType::Float64,
            "complex32" => DataType::Complex32,
            "complex64" => DataType::Complex64,
            other => return Err(TileError::UnknownDataType(other.to_string())),
        };
        Ok(parsed)
    }

    /// True for types whose (real) component is floating point.
    pub fn is_floating(&self) -> bool {
        matches!(
            self,
            DataType::Float32 | DataType::Float64 | DataType::Complex32 | DataType::Complex64
        )
    }

    /// Encode a scalar into one element of this type.
    ///
    /// Integer targets saturate; complex targets get a zero imaginary part.
    pub fn encode_value(&self, value: f64) -> Vec<u8> {
        match self {
            DataType::UInt8 => (value as u8).to_le_bytes().to_vec(),
            DataType::Int8 => (value as i8).to_le_bytes().to_vec(),
            DataType::UInt16 => (value as u16).to_le_bytes().to_vec(),
            DataType::Int16 => (value as i16).to_le_bytes().to_vec(),
            DataType::UInt32 => (value as u32).to_le_bytes().to_vec(),
            DataType::Int32 => (value as i32).to_le_bytes().to_vec(),
            DataType::UInt64 => (value as u64).to_le_bytes().to_vec(),
            DataType::Int64 => (value as i64).to_le_bytes().to_vec(),
            DataType::Float32 => (value as f32).to_le_bytes().to_vec(),
            DataType::Float64 => value.to_le_bytes().to_vec(),
            DataType::Complex32 => {
                let mut out = (value as f32).to_le_bytes().to_vec();
                out.extend_from_slice(&0f32.to_le_bytes());
                out
            }
            DataType::Complex64 => {
                let mut out = value.to_le_bytes().to_vec();
                out.extend_from_slice(&0f64.to_le_bytes());
                out
            }
        }
    }

    /// Real component of one encoded element as `f64`.
    fn real_part(&self, elem: &[u8]) -> f64 {
        match self {
            DataType::Float32 | DataType::Complex32 => {
                f32::from_le_bytes([elem[0], elem[1], elem[2], elem[3]]) as f64
            }
            DataType::Float64 | DataType::Complex64 => f64::from_le_bytes([
                elem[0], elem[1], elem[2], elem[3], elem[4], elem[5], elem[6], elem[7],
            ]),
            _ => f64::NAN,
        }
    }

    /// Imaginary component of one encoded complex element; `None` otherwise.
    fn imaginary_part(&self, elem: &[u8]) -> Option<f64> {
        match self {
            DataType::Complex32 => {
                Some(f32::from_le_bytes([elem[4], elem[5], elem[6], elem[7]]) as f64)
            }
            DataType::Complex64 => Some(f64::from_le_bytes([
                elem[8], elem[9], elem[10], elem[11], elem[12], elem[13], elem[14], elem[15],
            ])),
            _ => None,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Element types that can be read from and written to band buffers.
pub trait Pixel: Copy + PartialEq + Send + Sync + 'static {
    const DATA_TYPE: DataType;

    fn write_le(self, out: &mut Vec<u8>);

    /// Decode from exactly `DATA_TYPE.size_bytes()` bytes.
    fn read_le(bytes: &[u8]) -> Self;
}

macro_rules! impl_scalar_pixel {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Pixel for $ty {
                const DATA_TYPE: DataType = DataType::$variant;

                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                fn read_le(bytes: &[u8]) -> Self {
                    let mut buf = [0u8; std::mem::size_of::<$ty>()];
                    buf.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(buf)
                }
            }
        )*
    };
}

impl_scalar_pixel!(
    u8 => UInt8,
    i8 => Int8,
    u16 => UInt16,
    i16 => Int16,
    u32 => UInt32,
    i32 => Int32,
    u64 => UInt64,
    i64 => Int64,
    f32 => Float32,
    f64 => Float64,
);

impl Pixel for [f32; 2] {
    const DATA_TYPE: DataType = DataType::Complex32;

    fn write_le(self, out: &mut Vec<u8>) {
        self[0].write_le(out);
        self[1].write_le(out);
    }

    fn read_le(bytes: &[u8]) -> Self {
        [f32::read_le(&bytes[..4]), f32::read_le(&bytes[4..8])]
    }
}

impl Pixel for [f64; 2] {
    const DATA_TYPE: DataType = DataType::Complex64;

    fn write_le(self, out: &mut Vec<u8>) {
        self[0].write_le(out);
        self[1].write_le(out);
    }

    fn read_le(bytes: &[u8]) -> Self {
        [f64::read_le(&bytes[..8]), f64::read_le(&bytes[8..16])]
    }
}

/// Tests encoded elements against a dataset's no-data sentinel.
///
/// Integer types compare encoded bytes. Floating types compare decoded
/// values, so `-0.0` matches a `0.0` sentinel and a NaN sentinel matches
/// every NaN, whatever its payload bits.
#[derive(Debug, Clone, PartialEq)]
pub struct NoDataMatcher {
    data_type: DataType,
    sentinel: Vec<u8>,
    nan: bool,
}

impl NoDataMatcher {
    pub fn new(data_type: DataType, nodata: f64) -> Self {
        Self {
            data_type,
            sentinel: data_type.encode_value(nodata),
            nan: nodata.is_nan() && data_type.is_floating(),
        }
    }

    /// Encoded sentinel element.
    pub fn sentinel(&self) -> &[u8] {
        &self.sentinel
    }

    pub fn matches(&self, elem: &[u8]) -> bool {
        if !self.data_type.is_floating() {
            return elem == self.sentinel.as_slice();
        }
        let real = self.data_type.real_part(elem);
        if self.nan {
            return real.is_nan();
        }
        real == self.data_type.real_part(&self.sentinel)
            && self.data_type.imaginary_part(elem).map_or(true, |im| im == 0.0)
    }
}

/// Bytes of one `width` x `height` band, checked against `usize` overflow.
fn band_len(width: usize, height: usize, data_type: DataType) -> TileResult<usize> {
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(data_type.size_bytes()))
        .ok_or_else(|| {
            TileError::InvalidRaster(format!(
                "raster {}x{} {} is too large",
                width, height, data_type
            ))
        })
}

/// A B x R x C grid sharing one element type, geotransform and no-data value.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterDataset {
    width: usize,
    height: usize,
    data_type: DataType,
    geotransform: GeoTransform,
    nodata: f64,
    bands: Vec<Vec<u8>>,
}

impl RasterDataset {
    /// Wrap existing band buffers, checking every band has `width * height` elements.
    pub fn new(
        width: usize,
        height: usize,
        data_type: DataType,
        geotransform: GeoTransform,
        nodata: f64,
        bands: Vec<Vec<u8>>,
    ) -> TileResult<Self> {
        if width == 0 || height == 0 {
            return Err(TileError::InvalidRaster(format!(
                "empty raster {}x{}",
                width, height
            )));
        }
        if bands.is_empty() {
            return Err(TileError::InvalidRaster("raster has no bands".to_string()));
        }

        let expected = band_len(width, height, data_type)?;
        if let Some((index, band)) = bands.iter().enumerate().find(|(_, b)| b.len() != expected) {
            return Err(TileError::InvalidRaster(format!(
                "band {} holds {} bytes, expected {} for {}x{} {}",
                index,
                band.len(),
                expected,
                width,
                height,
                data_type
            )));
        }

        Ok(Self {
            width,
            height,
            data_type,
            geotransform,
            nodata,
            bands,
        })
    }

    /// A raster whose every pixel in every band is the no-data sentinel.
    pub fn filled_with_nodata(
        width: usize,
        height: usize,
        band_count: usize,
        data_type: DataType,
        geotransform: GeoTransform,
        nodata: f64,
    ) -> TileResult<Self> {
        band_len(width, height, data_type)?;
        let sentinel = data_type.encode_value(nodata);
        let band = sentinel.repeat(width * height);
        Self::new(
            width,
            height,
            data_type,
            geotransform,
            nodata,
            vec![band; band_count],
        )
    }

    /// Build from typed band values in row-major order.
    pub fn from_bands<T: Pixel>(
        width: usize,
        height: usize,
        geotransform: GeoTransform,
        nodata: f64,
        bands: Vec<Vec<T>>,
    ) -> TileResult<Self> {
        let size = T::DATA_TYPE.size_bytes();
        let encoded = bands
            .into_iter()
            .map(|values| {
                let mut out = Vec::with_capacity(values.len() * size);
                for v in values {
                    v.write_le(&mut out);
                }
                out
            })
            .collect();

        Self::new(width, height, T::DATA_TYPE, geotransform, nodata, encoded)
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn geotransform(&self) -> &GeoTransform {
        &self.geotransform
    }

    pub fn nodata(&self) -> f64 {
        self.nodata
    }

    pub fn band_count(&self) -> usize {
        self.bands.len()
    }

    /// Raw little-endian bytes of one band.
    pub fn band(&self, index: usize) -> Option<&[u8]> {
        self.bands.get(index).map(Vec::as_slice)
    }

    pub fn bands(&self) -> &[Vec<u8>] {
        &self.bands
    }

    /// Replace all band buffers, keeping shape, type and georeferencing.
    pub fn with_bands(self, bands: Vec<Vec<u8>>) -> TileResult<Self> {
        Self::new(
            self.width,
            self.height,
            self.data_type,
            self.geotransform,
            self.nodata,
            bands,
        )
    }

    /// Decode one band as typed values; `None` on type mismatch or bad index.
    pub fn band_values<T: Pixel>(&self, index: usize) -> Option<Vec<T>> {
        if T::DATA_TYPE != self.data_type {
            return None;
        }
        let size = self.data_type.size_bytes();
        let band = self.bands.get(index)?;
        Some(band.chunks_exact(size).map(T::read_le).collect())
    }

    /// Encoded bytes of a single element.
    pub fn pixel(&self, band: usize, col: usize, row: usize) -> Option<&[u8]> {
        if col >= self.width || row >= self.height {
            return None;
        }
        let size = self.data_type.size_bytes();
        let offset = (row * self.width + col) * size;
        self.bands.get(band).map(|b| &b[offset..offset + size])
    }

    /// Map-space envelope of the raster.
    pub fn extent(&self) -> BoundingBox {
        self.geotransform.extent(self.width, self.height)
    }

    pub fn nodata_matcher(&self) -> NoDataMatcher {
        NoDataMatcher::new(self.data_type, self.nodata)
    }

    /// Total payload size in bytes across all bands.
    pub fn payload_len(&self) -> usize {
        self.bands.iter().map(Vec::len).sum()
    }
}

/// Per-pixel boolean grid, used as a validity mask over a scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoolGrid {
    width: usize,
    height: usize,
    cells: Vec<bool>,
}

impl BoolGrid {
    pub fn new(width: usize, height: usize, cells: Vec<bool>) -> TileResult<Self> {
        if cells.len() != width * height {
            return Err(TileError::InvalidRaster(format!(
                "mask holds {} cells, expected {}x{}",
                cells.len(),
                width,
                height
            )));
        }
        Ok(Self {
            width,
            height,
            cells,
        })
    }

    /// A grid where every cell has the same value.
    pub fn filled(width: usize, height: usize, value: bool) -> Self {
        Self {
            width,
            height,
            cells: vec![value; width * height],
        }
    }

    /// Valid wherever at least one band differs from the raster's no-data value.
    pub fn from_nodata(raster: &RasterDataset) -> Self {
        let matcher = raster.nodata_matcher();
        let size = raster.data_type().size_bytes();
        let mut cells = vec![false; raster.width() * raster.height()];

        for band in raster.bands() {
            for (cell, elem) in cells.iter_mut().zip(band.chunks_exact(size)) {
                if !*cell && !matcher.matches(elem) {
                    *cell = true;
                }
            }
        }

        Self {
            width: raster.width(),
            height: raster.height(),
            cells,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, col: usize, row: usize) -> Option<bool> {
        if col >= self.width || row >= self.height {
            return None;
        }
        self.cells.get(row * self.width + col).copied()
    }

    pub fn count_valid(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gt() -> GeoTransform {
        GeoTransform::north_up(0.0, 60.0, 30.0, -30.0).unwrap()
    }

    #[test]
    fn test_data_type_names() {
        for dt in [
            DataType::UInt8,
            DataType::Int8,
            DataType::UInt16,
            DataType::Int16,
            DataType::UInt32,
            DataType::Int32,
            DataType::UInt64,
            DataType::Int64,
            DataType::Float32,
            DataType::Float64,
            DataType::Complex32,
            DataType::Complex64,
        ] {
            assert_eq!(DataType::from_name(dt.as_str()).unwrap(), dt);
            assert_eq!(dt.encode_value(0.0).len(), dt.size_bytes());
        }
        assert!(DataType::from_name("uint128").is_err());
        assert_eq!(
            serde_json::to_string(&DataType::Complex64).unwrap(),
            "\"complex64\""
        );
    }

    #[test]
    fn test_band_length_validated() {
        let err = RasterDataset::new(2, 2, DataType::UInt16, gt(), 0.0, vec![vec![0; 6]]);
        assert!(err.is_err());
        assert!(RasterDataset::new(2, 2, DataType::UInt16, gt(), 0.0, vec![vec![0; 8]]).is_ok());
    }

    #[test]
    fn test_typed_round_trip() {
        let raster =
            RasterDataset::from_bands(2, 2, gt(), -9999.0, vec![vec![1i16, -2, 300, -9999]])
                .unwrap();
        assert_eq!(raster.data_type(), DataType::Int16);
        assert_eq!(raster.band_values::<i16>(0).unwrap(), vec![1, -2, 300, -9999]);
        assert!(raster.band_values::<u16>(0).is_none());
        assert_eq!(raster.pixel(0, 1, 1), Some(&(-9999i16).to_le_bytes()[..]));
    }

    #[test]
    fn test_filled_with_nodata() {
        let raster =
            RasterDataset::filled_with_nodata(3, 2, 2, DataType::Float32, gt(), f64::NAN).unwrap();
        let matcher = raster.nodata_matcher();
        assert_eq!(raster.band_count(), 2);
        for band in raster.bands() {
            assert!(band.chunks_exact(4).all(|e| matcher.matches(e)));
        }
    }

    #[test]
    fn test_nan_matcher_ignores_payload() {
        let matcher = NoDataMatcher::new(DataType::Float32, f64::NAN);
        let quiet = f32::from_bits(0x7fc0_0001).to_le_bytes();
        assert!(matcher.matches(&quiet));
        assert!(!matcher.matches(&1.5f32.to_le_bytes()));
    }

    #[test]
    fn test_signed_zero_matches_zero_sentinel() {
        let matcher = NoDataMatcher::new(DataType::Float32, 0.0);
        assert!(matcher.matches(&(-0.0f32).to_le_bytes()));
        assert!(matcher.matches(&0.0f32.to_le_bytes()));
        assert!(!matcher.matches(&f32::NAN.to_le_bytes()));

        let matcher = NoDataMatcher::new(DataType::Float64, -0.0);
        assert!(matcher.matches(&0.0f64.to_le_bytes()));

        let complex = NoDataMatcher::new(DataType::Complex32, 0.0);
        let mut neg_zero = (-0.0f32).to_le_bytes().to_vec();
        neg_zero.extend_from_slice(&(-0.0f32).to_le_bytes());
        assert!(complex.matches(&neg_zero));
        let mut imaginary = 0.0f32.to_le_bytes().to_vec();
        imaginary.extend_from_slice(&1.0f32.to_le_bytes());
        assert!(!complex.matches(&imaginary));

        let integer = NoDataMatcher::new(DataType::Int16, -9999.0);
        assert!(integer.matches(&(-9999i16).to_le_bytes()));
        assert!(!integer.matches(&0i16.to_le_bytes()));
    }

    #[test]
    fn test_oversized_dimensions_rejected() {
        let huge = 1usize << (usize::BITS / 2);
        assert!(matches!(
            RasterDataset::new(huge, huge, DataType::UInt8, gt(), 0.0, vec![vec![0]]),
            Err(TileError::InvalidRaster(_))
        ));
        assert!(matches!(
            RasterDataset::filled_with_nodata(usize::MAX, 2, 1, DataType::UInt16, gt(), 0.0),
            Err(TileError::InvalidRaster(_))
        ));
    }

    #[test]
    fn test_mask_from_nodata() {
        let raster = RasterDataset::from_bands(
            2,
            1,
            gt(),
            0.0,
            vec![vec![0u8, 0], vec![0u8, 7]],
        )
        .unwrap();
        let mask = BoolGrid::from_nodata(&raster);
        assert_eq!(mask.get(0, 0), Some(false));
        assert_eq!(mask.get(1, 0), Some(true));
        assert_eq!(mask.count_valid(), 1);
    }

    #[test]
    fn test_complex_pixels() {
        let raster =
            RasterDataset::from_bands(1, 1, gt(), 0.0, vec![vec![[1.0f32, -2.0]]]).unwrap();
        assert_eq!(raster.data_type(), DataType::Complex32);
        assert_eq!(raster.band_values::<[f32; 2]>(0).unwrap(), vec![[1.0, -2.0]]);
    }
}
