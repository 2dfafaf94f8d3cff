//! Pure, value-level merge of source bands into destination bands.

use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use tile_common::{BoolGrid, NoDataMatcher};

use crate::clip::ClipWindows;

/// Which destination pixels a valid source pixel may replace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompositeMode {
    /// Only fill destination pixels that are currently no-data.
    #[default]
    #[serde(alias = "overwrite_no_data_only")]
    OverwriteNoDataOnly,
    /// Replace every destination pixel under a valid source pixel.
    #[serde(alias = "overwrite_all")]
    OverwriteAll,
}

impl CompositeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositeMode::OverwriteNoDataOnly => "overwrite-no-data-only",
            CompositeMode::OverwriteAll => "overwrite-all",
        }
    }
}

impl FromStr for CompositeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "overwrite-no-data-only" | "no-data-only" => Ok(CompositeMode::OverwriteNoDataOnly),
            "overwrite-all" | "all" => Ok(CompositeMode::OverwriteAll),
            other => Err(format!("unknown compositing mode '{}'", other)),
        }
    }
}

impl std::fmt::Display for CompositeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Everything a band merge needs besides the band bytes themselves.
#[derive(Debug, Clone, Copy)]
pub struct MergePlan<'a> {
    pub windows: ClipWindows,
    /// Width in pixels of the destination raster.
    pub dest_width: usize,
    /// Width in pixels of the source raster.
    pub src_width: usize,
    pub element_size: usize,
    pub mode: CompositeMode,
    /// Matches the destination's no-data sentinel.
    pub dest_nodata: &'a NoDataMatcher,
    /// Source validity; `None` means every source pixel is valid.
    pub mask: Option<&'a BoolGrid>,
}

/// A merged band and the number of elements whose value changed.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedBand {
    pub data: Vec<u8>,
    pub changed: usize,
}

/// Merge one source band into a copy of one destination band.
///
/// Inside the overlap window, a source element is copied when the mask is
/// valid at that source pixel and the mode allows replacing the destination
/// element. Nothing outside the window is touched.
///
/// Panics if the windows exceed the band buffers.
pub fn merge_band(dest: &[u8], src: &[u8], plan: &MergePlan<'_>) -> MergedBand {
    let size = plan.element_size;
    let w = &plan.windows;
    let mut data = dest.to_vec();
    let mut changed = 0;

    for r in 0..w.height() {
        let dest_row = w.dest.row + r;
        let src_row = w.src.row + r;
        for c in 0..w.width() {
            let src_col = w.src.col + c;
            if let Some(mask) = plan.mask {
                if mask.get(src_col, src_row) != Some(true) {
                    continue;
                }
            }

            let d_off = (dest_row * plan.dest_width + w.dest.col + c) * size;
            let s_off = (src_row * plan.src_width + src_col) * size;
            let target = &mut data[d_off..d_off + size];
            let value = &src[s_off..s_off + size];

            if plan.mode == CompositeMode::OverwriteNoDataOnly && !plan.dest_nodata.matches(target) {
                continue;
            }
            if target != value {
                target.copy_from_slice(value);
                changed += 1;
            }
        }
    }

    MergedBand { data, changed }
}

/// Merge every band pair in parallel. Returns the new bands and the total
/// number of changed elements across bands.
pub fn merge_bands(dest: &[Vec<u8>], src: &[Vec<u8>], plan: &MergePlan<'_>) -> (Vec<Vec<u8>>, usize) {
    let merged: Vec<MergedBand> = dest
        .par_iter()
        .zip(src.par_iter())
        .map(|(d, s)| merge_band(d, s, plan))
        .collect();

    let changed = merged.iter().map(|b| b.changed).sum();
    (merged.into_iter().map(|b| b.data).collect(), changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tile_common::DataType;

    fn plan<'a>(
        windows: ClipWindows,
        dest_width: usize,
        src_width: usize,
        mode: CompositeMode,
        nodata: &'a NoDataMatcher,
        mask: Option<&'a BoolGrid>,
    ) -> MergePlan<'a> {
        MergePlan {
            windows,
            dest_width,
            src_width,
            element_size: 1,
            mode,
            dest_nodata: nodata,
            mask,
        }
    }

    #[test]
    fn test_no_data_only_keeps_valid_pixels() {
        let nodata = NoDataMatcher::new(DataType::UInt8, 0.0);
        let p = plan(
            ClipWindows::new((0, 0), (0, 0), 2, 2),
            2,
            2,
            CompositeMode::OverwriteNoDataOnly,
            &nodata,
            None,
        );
        let merged = merge_band(&[0, 5, 0, 0], &[1, 2, 3, 4], &p);
        assert_eq!(merged.data, vec![1, 5, 3, 4]);
        assert_eq!(merged.changed, 3);
    }

    #[test]
    fn test_overwrite_all_respects_mask() {
        let nodata = NoDataMatcher::new(DataType::UInt8, 0.0);
        let mask = BoolGrid::new(2, 2, vec![true, false, false, true]).unwrap();
        let p = plan(
            ClipWindows::new((0, 0), (0, 0), 2, 2),
            2,
            2,
            CompositeMode::OverwriteAll,
            &nodata,
            Some(&mask),
        );
        let merged = merge_band(&[9, 9, 9, 9], &[1, 2, 3, 4], &p);
        assert_eq!(merged.data, vec![1, 9, 9, 4]);
        assert_eq!(merged.changed, 2);
    }

    #[test]
    fn test_window_offsets() {
        // 3x3 destination, 2x2 source placed at destination (1, 1).
        let nodata = NoDataMatcher::new(DataType::UInt8, 0.0);
        let p = plan(
            ClipWindows::new((1, 1), (0, 0), 2, 2),
            3,
            2,
            CompositeMode::OverwriteAll,
            &nodata,
            None,
        );
        let merged = merge_band(&[0; 9], &[1, 2, 3, 4], &p);
        assert_eq!(merged.data, vec![0, 0, 0, 0, 1, 2, 0, 3, 4]);
    }

    #[test]
    fn test_identical_values_are_not_changes() {
        let nodata = NoDataMatcher::new(DataType::UInt8, 0.0);
        let p = plan(
            ClipWindows::new((0, 0), (0, 0), 2, 1),
            2,
            2,
            CompositeMode::OverwriteAll,
            &nodata,
            None,
        );
        let merged = merge_band(&[7, 8], &[7, 8], &p);
        assert_eq!(merged.changed, 0);
    }

    #[test]
    fn test_merge_bands_sums_changes() {
        let nodata = NoDataMatcher::new(DataType::UInt8, 0.0);
        let p = plan(
            ClipWindows::new((0, 0), (0, 0), 1, 1),
            1,
            1,
            CompositeMode::OverwriteNoDataOnly,
            &nodata,
            None,
        );
        let (bands, changed) = merge_bands(&[vec![0], vec![3]], &[vec![1], vec![2]], &p);
        assert_eq!(bands, vec![vec![1], vec![3]]);
        assert_eq!(changed, 1);
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("overwrite-all".parse::<CompositeMode>().unwrap(), CompositeMode::OverwriteAll);
        assert_eq!(
            "OVERWRITE_NO_DATA_ONLY".parse::<CompositeMode>().unwrap(),
            CompositeMode::OverwriteNoDataOnly
        );
        assert!("blend".parse::<CompositeMode>().is_err());
        assert_eq!(
            serde_json::to_string(&CompositeMode::OverwriteAll).unwrap(),
            "\"overwrite-all\""
        );
        let parsed: CompositeMode = serde_json::from_str("\"overwrite_all\"").unwrap();
        assert_eq!(parsed, CompositeMode::OverwriteAll);
    }
}
