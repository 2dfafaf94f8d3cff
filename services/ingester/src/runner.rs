//! Concurrent ingestion of many scene files.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{info, warn};

use compositor::CompositeMode;
use ingestion::{load_scene, IngestionDriver, IngestionReport, TileStatus};
use storage::TileStorage;

/// Outcome of one scene file.
#[derive(Debug, Clone, Serialize)]
pub struct SceneResult {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<IngestionReport>,
    /// Scene-level failure: unreadable file or invalid request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SceneResult {
    pub fn failed(&self) -> bool {
        self.error.is_some() || self.report.as_ref().is_some_and(|r| r.has_failures())
    }
}

/// Results of a whole run, ordered by scene path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub scenes: Vec<SceneResult>,
}

impl RunSummary {
    pub fn has_failures(&self) -> bool {
        self.scenes.iter().any(SceneResult::failed)
    }

    /// Tile results with `status` across every scene.
    pub fn tile_count(&self, status: TileStatus) -> usize {
        self.scenes
            .iter()
            .filter_map(|s| s.report.as_ref())
            .map(|r| r.count(status))
            .sum()
    }
}

/// Ingest `scenes` with at most `parallel` scenes in flight.
///
/// Each scene runs on the blocking pool; tile access is serialized by the
/// locks configured on `driver`.
pub async fn run_scenes<S>(
    driver: Arc<IngestionDriver<S>>,
    scenes: Vec<PathBuf>,
    mode: CompositeMode,
    parallel: usize,
) -> RunSummary
where
    S: TileStorage + 'static,
{
    info!(scenes = scenes.len(), parallel, %mode, "Starting ingestion run");

    let mut results: Vec<SceneResult> = stream::iter(scenes)
        .map(|path| {
            let driver = Arc::clone(&driver);
            async move {
                let task_path = path.clone();
                let joined =
                    tokio::task::spawn_blocking(move || ingest_file(&driver, &task_path, mode))
                        .await;

                let (report, error) = match joined {
                    Ok(Ok(report)) => (Some(report), None),
                    Ok(Err(e)) => {
                        warn!(path = %path.display(), error = %e, "Scene rejected");
                        (None, Some(e.to_string()))
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "Scene task aborted");
                        (None, Some(format!("ingestion task failed: {}", e)))
                    }
                };
                SceneResult {
                    path,
                    report,
                    error,
                }
            }
        })
        .buffer_unordered(parallel.max(1))
        .collect()
        .await;

    results.sort_by(|a, b| a.path.cmp(&b.path));
    let summary = RunSummary { scenes: results };

    info!(
        scenes = summary.scenes.len(),
        merged = summary.tile_count(TileStatus::Merged),
        no_change = summary.tile_count(TileStatus::NoChange),
        skipped = summary.tile_count(TileStatus::Skipped),
        failed = summary.tile_count(TileStatus::Failed),
        "Ingestion run complete"
    );
    summary
}

fn ingest_file<S: TileStorage>(
    driver: &IngestionDriver<S>,
    path: &Path,
    mode: CompositeMode,
) -> ingestion::Result<IngestionReport> {
    let request = load_scene(path)?.with_mode(mode);
    driver.ingest(&request)
}
