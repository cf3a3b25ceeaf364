use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Run-level failure classification carried on a failed [`RunResult`].
///
/// [`RunResult`]: crate::run::RunResult
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ConfigInvalid,
    ComputationFailed,
    IoFailure,
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Computation failed: {0}")]
    ComputationFailed(String),

    #[error("I/O failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("A run is already in progress")]
    RunInProgress,
}

impl CoreError {
    /// Wrap an I/O error together with the path it concerns.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// The run failure kind for errors that terminate a run.
    ///
    /// `RunInProgress` is a rejection, not a run outcome, and maps to `None`.
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            CoreError::ConfigInvalid(_) => Some(FailureKind::ConfigInvalid),
            CoreError::ComputationFailed(_) => Some(FailureKind::ComputationFailed),
            CoreError::Io { .. } => Some(FailureKind::IoFailure),
            CoreError::RunInProgress => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_in_progress_is_not_a_run_outcome() {
        assert_eq!(CoreError::RunInProgress.failure_kind(), None);
    }

    #[test]
    fn io_error_message_names_the_path() {
        let err = CoreError::io(
            "/tmp/out",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.failure_kind(), Some(FailureKind::IoFailure));
        assert!(err.to_string().contains("/tmp/out"));
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::ComputationFailed).unwrap();
        assert_eq!(json, "\"computation_failed\"");
    }
}
