//! Configuration validation and the persisted per-run configuration record.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use temoa_core::{CoreError, Overrides, RunId, RunRequest};

/// File name of the persisted configuration inside the run directory.
pub const RUN_CONFIG_FILE: &str = "run_config.json";

/// Configuration document extensions the optimizer accepts.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["toml", "dat", "txt"];

/// Configuration actually used for one run.
///
/// Written into the run directory before the computation starts, so the
/// directory keeps an audit record that is independent of later edits to the
/// source file or the collaborator's selection.
#[derive(Debug, Clone, Serialize)]
pub struct MaterializedConfig {
    pub run_id: RunId,
    pub source_path: PathBuf,
    pub output_dir: PathBuf,
    pub silent: bool,
    pub overrides: Overrides,
    pub created_at: DateTime<Utc>,
    /// Source configuration text as read at run start.
    pub document: String,
}

impl MaterializedConfig {
    pub fn new(request: &RunRequest, document: String, output_dir: PathBuf) -> Self {
        Self {
            run_id: request.run_id,
            source_path: request.config_path.clone(),
            output_dir,
            silent: request.silent,
            overrides: request.overrides.clone(),
            created_at: Utc::now(),
            document,
        }
    }

    /// Path of the persisted record.
    pub fn record_path(&self) -> PathBuf {
        self.output_dir.join(RUN_CONFIG_FILE)
    }

    /// Directory the source configuration lives in.
    pub fn source_dir(&self) -> &Path {
        self.source_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Write the record into the run directory.
    pub fn persist(&self) -> Result<PathBuf, CoreError> {
        let path = self.record_path();
        let json = serde_json::to_vec_pretty(self).map_err(|e| {
            CoreError::io(&path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })?;
        std::fs::write(&path, json).map_err(|e| CoreError::io(&path, e))?;
        Ok(path)
    }
}

/// Validate the request's configuration and return the document text.
///
/// Every failure here is `ConfigInvalid` and happens before anything is
/// written to disk.
pub fn load_config(config_path: &Path, overrides: &Overrides) -> Result<String, CoreError> {
    if !config_path.is_file() {
        return Err(CoreError::ConfigInvalid(format!(
            "configuration file not found: {}",
            config_path.display()
        )));
    }

    let extension = config_path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(CoreError::ConfigInvalid(format!(
            "unsupported configuration type {:?} (expected one of {})",
            extension,
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }

    for key in overrides.keys() {
        validate_override_key(key)?;
    }

    std::fs::read_to_string(config_path).map_err(|e| {
        CoreError::ConfigInvalid(format!(
            "cannot read configuration {}: {e}",
            config_path.display()
        ))
    })
}

/// Override keys are dotted identifiers: non-empty segments of
/// alphanumerics, `_` or `-`.
fn validate_override_key(key: &str) -> Result<(), CoreError> {
    let valid = !key.is_empty()
        && key.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
    if valid {
        Ok(())
    } else {
        Err(CoreError::ConfigInvalid(format!(
            "invalid override key {key:?}"
        )))
    }
}
