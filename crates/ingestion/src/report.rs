//! Per-tile outcomes of ingesting one scene.

use serde::{Deserialize, Serialize};

use compositor::{CompositeError, CompositeOutcome};

/// Terminal status of one (scene, tile) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TileStatus {
    Skipped,
    Merged,
    NoChange,
    Failed,
}

/// Result for one intersected tile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerTileResult {
    pub tile_id: String,
    pub status: TileStatus,
    /// Why the tile was skipped, when it was.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    /// Band values replaced in the tile.
    #[serde(default)]
    pub changed_values: usize,
    /// The source was added to the tile's provenance.
    #[serde(default)]
    pub provenance_recorded: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// The failure is transient and the scene may be retried.
    #[serde(default)]
    pub retryable: bool,
}

impl PerTileResult {
    fn blank(tile_id: &str, status: TileStatus) -> Self {
        Self {
            tile_id: tile_id.to_string(),
            status,
            skip_reason: None,
            changed_values: 0,
            provenance_recorded: false,
            error: None,
            retryable: false,
        }
    }

    pub fn from_outcome(tile_id: &str, outcome: CompositeOutcome) -> Self {
        match outcome {
            CompositeOutcome::Skipped(reason) => Self {
                skip_reason: Some(reason.as_str().to_string()),
                ..Self::blank(tile_id, TileStatus::Skipped)
            },
            CompositeOutcome::Merged { changed_values } => Self {
                changed_values,
                provenance_recorded: true,
                ..Self::blank(tile_id, TileStatus::Merged)
            },
            CompositeOutcome::NoChange { recorded } => Self {
                provenance_recorded: recorded,
                ..Self::blank(tile_id, TileStatus::NoChange)
            },
        }
    }

    pub fn from_error(tile_id: &str, error: &CompositeError) -> Self {
        Self {
            error: Some(error.to_string()),
            retryable: error.is_retryable(),
            ..Self::blank(tile_id, TileStatus::Failed)
        }
    }

    /// Failure that happened before compositing could start.
    pub fn failed(tile_id: &str, message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::blank(tile_id, TileStatus::Failed)
        }
    }
}

/// All per-tile results for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionReport {
    pub source_id: String,
    pub results: Vec<PerTileResult>,
}

impl IngestionReport {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, result: PerTileResult) {
        self.results.push(result);
    }

    pub fn count(&self, status: TileStatus) -> usize {
        self.results.iter().filter(|r| r.status == status).count()
    }

    pub fn has_failures(&self) -> bool {
        self.count(TileStatus::Failed) > 0
    }

    /// Tiles whose pixels changed.
    pub fn merged_tiles(&self) -> Vec<String> {
        self.tiles_where(|r| r.status == TileStatus::Merged)
    }

    /// Tiles where only provenance was recorded.
    pub fn recorded_tiles(&self) -> Vec<String> {
        self.tiles_where(|r| r.status == TileStatus::NoChange && r.provenance_recorded)
    }

    pub fn result(&self, tile_id: &str) -> Option<&PerTileResult> {
        self.results.iter().find(|r| r.tile_id == tile_id)
    }

    fn tiles_where(&self, pred: impl Fn(&PerTileResult) -> bool) -> Vec<String> {
        self.results
            .iter()
            .filter(|r| pred(r))
            .map(|r| r.tile_id.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compositor::SkipReason;

    #[test]
    fn test_report_summaries() {
        let mut report = IngestionReport::new("LC08_X");
        report.push(PerTileResult::from_outcome(
            "A",
            CompositeOutcome::Merged { changed_values: 12 },
        ));
        report.push(PerTileResult::from_outcome(
            "B",
            CompositeOutcome::NoChange { recorded: true },
        ));
        report.push(PerTileResult::from_outcome(
            "C",
            CompositeOutcome::Skipped(SkipReason::AlreadyIngested),
        ));
        report.push(PerTileResult::failed("D", "bad tile"));

        assert_eq!(report.merged_tiles(), vec!["A".to_string()]);
        assert_eq!(report.recorded_tiles(), vec!["B".to_string()]);
        assert_eq!(report.count(TileStatus::Skipped), 1);
        assert!(report.has_failures());
        assert_eq!(
            report.result("C").unwrap().skip_reason.as_deref(),
            Some("already ingested")
        );
    }

    #[test]
    fn test_json_shape() {
        let result = PerTileResult::from_outcome("A", CompositeOutcome::Merged { changed_values: 3 });
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "merged");
        assert_eq!(json["changed_values"], 3);
        assert!(json.get("error").is_none());
    }
}
