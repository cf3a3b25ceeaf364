//! Line-oriented terminal front end.

use std::io::Write;
use std::path::Path;

use temoa_core::{LogEvent, RunResult};
use temoa_events::LogView;

use crate::collaborator::Collaborator;

/// Prints every notification as it arrives and keeps the scrollback in a
/// [`LogView`] so the last screen can be redrawn on demand.
pub struct TerminalFrontend<W: Write> {
    out: W,
    view: LogView,
    busy: bool,
    report_address: Option<String>,
    dataset_address: Option<String>,
}

impl<W: Write> TerminalFrontend<W> {
    pub fn new(out: W, viewport_rows: usize) -> Self {
        Self {
            out,
            view: LogView::new(viewport_rows),
            busy: false,
            report_address: None,
            dataset_address: None,
        }
    }

    pub fn view(&self) -> &LogView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut LogView {
        &mut self.view
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn report_address(&self) -> Option<&str> {
        self.report_address.as_deref()
    }

    pub fn dataset_address(&self) -> Option<&str> {
        self.dataset_address.as_deref()
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    /// Print the rows currently in the viewport.
    pub fn redraw(&mut self) {
        for line in self.view.visible() {
            let _ = writeln!(self.out, "{line}");
        }
        let _ = self.out.flush();
    }

    /// Print a line without recording it in the scrollback.
    pub fn notice(&mut self, text: &str) {
        let _ = writeln!(self.out, "{text}");
        let _ = self.out.flush();
    }

    fn say(&mut self, text: &str) {
        self.view.append_text(text);
        self.notice(text);
    }
}

impl<W: Write> Collaborator for TerminalFrontend<W> {
    fn on_log(&mut self, event: &LogEvent) {
        self.view.append_events([event]);
        self.notice(&event.render());
    }

    fn on_busy_changed(&mut self, busy: bool) {
        self.busy = busy;
        if busy {
            let started = chrono::Local::now().format("%H:%M:%S");
            self.say(&format!("--- Starting Run: {started} ---"));
            self.notice("[running] press Ctrl-C to quit; the run cannot be cancelled");
        } else {
            self.notice("[ready] type `run` to start another run");
        }
    }

    fn on_run_complete(&mut self, result: &RunResult) {
        match (&result.output_dir, result.succeeded) {
            (Some(dir), true) => self.say(&format!("Run finished. Output: {}", dir.display())),
            _ => {
                let kind = result
                    .failure
                    .map(|k| format!("{k:?}"))
                    .unwrap_or_else(|| "unknown".to_string());
                self.say(&format!("Run failed ({kind}). See the error above."));
            }
        }
    }

    fn on_report_ready(&mut self, address: &str) {
        self.report_address = Some(address.to_string());
        self.say(&format!("Report: {address}"));
    }

    fn on_dataset_ready(&mut self, address: &str) {
        self.dataset_address = Some(address.to_string());
        self.say(&format!("Dataset browser: {address}"));
    }

    fn on_no_artifacts(&mut self, output_dir: &Path) {
        self.say(&format!(
            "No report or dataset found in {}",
            output_dir.display()
        ));
    }
}
