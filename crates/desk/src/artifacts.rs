//! Discovery of servable artifacts in a finished run's output directory.

use std::path::{Path, PathBuf};

use temoa_core::RunRequest;

/// Report extensions, most preferred first.
pub const REPORT_EXTENSIONS: &[&str] = &["html", "svg"];

/// Dataset file extensions.
pub const DATASET_EXTENSIONS: &[&str] = &["sqlite", "sqlite3", "db"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Artifacts {
    pub report: Option<PathBuf>,
    pub dataset: Option<PathBuf>,
}

impl Artifacts {
    pub fn is_empty(&self) -> bool {
        self.report.is_none() && self.dataset.is_none()
    }
}

/// Find the report and dataset for a run.
///
/// A dataset written into `output_dir` wins over one referenced by the
/// request's overrides.
pub fn discover(output_dir: &Path, request: Option<&RunRequest>) -> Artifacts {
    let files = list_files(output_dir);

    let report = REPORT_EXTENSIONS
        .iter()
        .find_map(|ext| first_with_extension(&files, &[*ext]));

    let dataset = first_with_extension(&files, DATASET_EXTENSIONS).or_else(|| {
        request
            .and_then(RunRequest::referenced_dataset)
            .filter(|path| path.is_file())
    });

    Artifacts { report, dataset }
}

/// Regular files directly inside `dir`, sorted by name. An unreadable
/// directory has no artifacts.
fn list_files(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "Cannot scan output directory");
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    files
}

fn first_with_extension(files: &[PathBuf], extensions: &[&str]) -> Option<PathBuf> {
    files
        .iter()
        .find(|path| {
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
                .unwrap_or(false)
        })
        .cloned()
}

#[cfg(test)]
mod tests {
    use temoa_core::{Overrides, OUTPUT_DATABASE_KEY};

    use super::*;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, b"").unwrap();
        path
    }

    #[test]
    fn html_is_preferred_over_svg() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a_chart.svg");
        let html = touch(dir.path(), "z_report.html");

        assert_eq!(discover(dir.path(), None).report, Some(html));
    }

    #[test]
    fn svg_is_the_fallback_report() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.svg");
        let first = touch(dir.path(), "a.svg");

        assert_eq!(discover(dir.path(), None).report, Some(first));
    }

    #[test]
    fn directories_are_not_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested.html")).unwrap();

        assert!(discover(dir.path(), None).is_empty());
    }

    #[test]
    fn output_dataset_wins_over_referenced_one() {
        let dir = tempfile::tempdir().unwrap();
        let model = tempfile::tempdir().unwrap();
        let referenced = touch(model.path(), "utopia.sqlite");
        let config = touch(model.path(), "utopia.toml");
        let mut overrides = Overrides::new();
        overrides.insert(
            OUTPUT_DATABASE_KEY.into(),
            serde_json::json!(referenced.display().to_string()),
        );
        let request = RunRequest::new(config).with_overrides(overrides);

        assert_eq!(discover(dir.path(), Some(&request)).dataset, Some(referenced));

        let local = touch(dir.path(), "results.db");
        assert_eq!(discover(dir.path(), Some(&request)).dataset, Some(local));
    }

    #[test]
    fn missing_referenced_dataset_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut overrides = Overrides::new();
        overrides.insert(OUTPUT_DATABASE_KEY.into(), serde_json::json!("gone.sqlite"));
        let request = RunRequest::new(dir.path().join("c.toml")).with_overrides(overrides);

        assert!(discover(dir.path(), Some(&request)).dataset.is_none());
    }

    #[test]
    fn unreadable_directory_has_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover(&dir.path().join("missing"), None).is_empty());
    }
}
