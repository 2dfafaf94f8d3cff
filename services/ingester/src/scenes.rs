//! Scene file discovery.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;
use walkdir::WalkDir;

use storage::TILE_EXTENSION;

/// Explicit scene paths plus every `*.tile` file under `scene_dir`, sorted
/// and without duplicates.
pub fn collect_scene_paths(paths: &[PathBuf], scene_dir: Option<&Path>) -> Result<Vec<PathBuf>> {
    let mut scenes: BTreeSet<PathBuf> = paths.iter().cloned().collect();

    if let Some(dir) = scene_dir {
        for entry in WalkDir::new(dir).follow_links(true) {
            let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
            let is_scene = entry.file_type().is_file()
                && entry.path().extension().and_then(|e| e.to_str()) == Some(TILE_EXTENSION);
            if is_scene {
                scenes.insert(entry.into_path());
            }
        }
        debug!(dir = %dir.display(), scenes = scenes.len(), "Scanned scene directory");
    }

    Ok(scenes.into_iter().collect())
}
