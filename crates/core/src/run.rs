//! Run request and run result values.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, FailureKind};

/// Identifier of a single run.
pub type RunId = Uuid;

/// Configuration overrides captured from the collaborator at trigger time.
///
/// Keys are dotted configuration names; values are arbitrary JSON.
pub type Overrides = BTreeMap<String, serde_json::Value>;

/// Override key naming a dataset the configuration writes to.
pub const OUTPUT_DATABASE_KEY: &str = "output_database";

// ---------------------------------------------------------------------------
// RunRequest
// ---------------------------------------------------------------------------

/// Immutable description of one run, built by the orchestrator from the
/// collaborator's current selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRequest {
    pub run_id: RunId,
    /// Configuration document handed to the computation.
    pub config_path: PathBuf,
    /// Directory under which `output_files/<timestamp>` is created.
    pub output_root: PathBuf,
    /// Suppress the computation's own console echo.
    pub silent: bool,
    pub overrides: Overrides,
    pub requested_at: DateTime<Utc>,
}

impl RunRequest {
    /// Create a request whose output root is the configuration file's parent
    /// directory.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        let config_path = config_path.into();
        let output_root = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self {
            run_id: Uuid::now_v7(),
            config_path,
            output_root,
            silent: false,
            overrides: Overrides::new(),
            requested_at: Utc::now(),
        }
    }

    pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = output_root.into();
        self
    }

    pub fn with_silent(mut self, silent: bool) -> Self {
        self.silent = silent;
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = overrides;
        self
    }

    /// Dataset path referenced by the overrides, resolved against the
    /// configuration file's directory when relative.
    pub fn referenced_dataset(&self) -> Option<PathBuf> {
        let raw = self.overrides.get(OUTPUT_DATABASE_KEY)?.as_str()?;
        let path = PathBuf::from(raw);
        if path.is_absolute() {
            return Some(path);
        }
        let base = self.config_path.parent().unwrap_or_else(|| Path::new("."));
        Some(base.join(path))
    }
}

// ---------------------------------------------------------------------------
// RunResult
// ---------------------------------------------------------------------------

/// Terminal outcome of a run. Exactly one is emitted per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    pub run_id: RunId,
    pub succeeded: bool,
    pub output_dir: Option<PathBuf>,
    pub failure: Option<FailureKind>,
    pub error_detail: Option<String>,
}

impl RunResult {
    pub fn success(run_id: RunId, output_dir: PathBuf) -> Self {
        Self {
            run_id,
            succeeded: true,
            output_dir: Some(output_dir),
            failure: None,
            error_detail: None,
        }
    }

    pub fn failure(run_id: RunId, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            run_id,
            succeeded: false,
            output_dir: None,
            failure: Some(kind),
            error_detail: Some(detail.into()),
        }
    }

    /// Build a failed result from a run-terminating [`CoreError`].
    pub fn from_error(run_id: RunId, err: &CoreError) -> Self {
        let kind = err
            .failure_kind()
            .unwrap_or(FailureKind::ComputationFailed);
        Self::failure(run_id, kind, err.to_string())
    }
}
