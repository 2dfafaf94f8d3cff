//! Scene ingestion service.
//!
//! Collects scene files, ingests them concurrently into the tile store
//! and summarizes the per-tile results of every scene.

pub mod runner;
pub mod scenes;

pub use runner::{run_scenes, RunSummary, SceneResult};
pub use scenes::collect_scene_paths;
