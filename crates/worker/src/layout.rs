//! Output directory layout for runs.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use temoa_core::CoreError;

/// Directory under the output root that collects every run.
pub const OUTPUT_FILES_DIR: &str = "output_files";

/// Per-run directory name format.
pub const RUN_DIR_FORMAT: &str = "%Y-%m-%d_%H%M%S";

/// `<root>/output_files/<timestamp>` for a run started at `at`.
pub fn run_dir_path(root: &Path, at: DateTime<Local>) -> PathBuf {
    root.join(OUTPUT_FILES_DIR)
        .join(at.format(RUN_DIR_FORMAT).to_string())
}

/// Create the run directory (and its parents). An existing directory is
/// reused.
pub fn create_run_dir(root: &Path, at: DateTime<Local>) -> Result<PathBuf, CoreError> {
    let dir = run_dir_path(root, at);
    std::fs::create_dir_all(&dir).map_err(|e| CoreError::io(&dir, e))?;
    Ok(dir)
}
