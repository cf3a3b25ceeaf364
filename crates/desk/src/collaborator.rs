use std::path::Path;

use temoa_core::{LogEvent, RunResult};

/// The interactive front end driven by [`RunOrchestrator`].
///
/// Every method is called on the interactive context, in the order the
/// orchestrator processes events.
///
/// [`RunOrchestrator`]: crate::orchestrator::RunOrchestrator
pub trait Collaborator {
    /// A diagnostic line, in arrival order.
    fn on_log(&mut self, event: &LogEvent);

    /// The run trigger should be disabled (`true`) or re-enabled.
    fn on_busy_changed(&mut self, busy: bool);

    /// A run finished. Failed results carry the error detail.
    fn on_run_complete(&mut self, result: &RunResult);

    /// The run's report is reachable at `address`.
    fn on_report_ready(&mut self, address: &str);

    /// The run's dataset can be browsed at `address`.
    fn on_dataset_ready(&mut self, address: &str);

    /// The run succeeded but left neither a report nor a dataset.
    fn on_no_artifacts(&mut self, output_dir: &Path);
}
