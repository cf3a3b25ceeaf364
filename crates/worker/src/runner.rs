//! Job runner: one in-flight run at a time, executed on a blocking worker
//! thread, with exactly one [`RunResult`] handed back through the relay.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Local;
use temoa_core::{CoreError, FailureKind, LogEvent, LogLevel, RunId, RunRequest, RunResult};
use temoa_events::{LogRelay, RunCapture, RunIo};
use tokio::task::JoinHandle;

use crate::computation::Computation;
use crate::layout;
use crate::materialize::{self, MaterializedConfig};

// ---------------------------------------------------------------------------
// JobRunner
// ---------------------------------------------------------------------------

/// Executes runs of a single [`Computation`].
///
/// Cheap to clone; clones share the in-flight gate.
#[derive(Clone)]
pub struct JobRunner {
    computation: Arc<dyn Computation>,
    active: Arc<AtomicBool>,
}

impl JobRunner {
    pub fn new(computation: impl Computation) -> Self {
        Self {
            computation: Arc::new(computation),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a run currently holds the gate.
    pub fn is_busy(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Start a run on a blocking worker thread and return immediately.
    ///
    /// The result is delivered through `relay` as
    /// [`InteractiveEvent::RunFinished`](temoa_events::InteractiveEvent) and
    /// is also the join handle's output. A second dispatch while a run is in
    /// flight is rejected with [`CoreError::RunInProgress`]; nothing is
    /// queued.
    pub fn dispatch(
        &self,
        request: RunRequest,
        relay: LogRelay,
    ) -> Result<JoinHandle<RunResult>, CoreError> {
        let permit = RunPermit::acquire(&self.active)?;
        let computation = Arc::clone(&self.computation);

        tracing::info!(run_id = %request.run_id, "Dispatching run to worker thread");
        Ok(tokio::task::spawn_blocking(move || {
            execute(computation.as_ref(), &request, &relay, permit)
        }))
    }

    /// Execute a run on the calling thread.
    pub fn run(&self, request: &RunRequest, relay: &LogRelay) -> Result<RunResult, CoreError> {
        let permit = RunPermit::acquire(&self.active)?;
        Ok(execute(self.computation.as_ref(), request, relay, permit))
    }
}

/// Holds the in-flight gate for the lifetime of one run.
struct RunPermit {
    active: Arc<AtomicBool>,
}

impl RunPermit {
    fn acquire(active: &Arc<AtomicBool>) -> Result<Self, CoreError> {
        active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| CoreError::RunInProgress)?;
        Ok(Self {
            active: Arc::clone(active),
        })
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.active.store(false, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Result hand-off
// ---------------------------------------------------------------------------

/// Guarantees exactly one result per run reaches the relay.
///
/// If the worker unwinds before [`deliver`](ResultSlot::deliver) is called,
/// a failed result is published on drop.
struct ResultSlot {
    run_id: RunId,
    relay: LogRelay,
    delivered: bool,
}

impl ResultSlot {
    fn new(run_id: RunId, relay: LogRelay) -> Self {
        Self {
            run_id,
            relay,
            delivered: false,
        }
    }

    fn deliver(mut self, result: RunResult) {
        self.delivered = true;
        self.relay.finish(result);
    }
}

impl Drop for ResultSlot {
    fn drop(&mut self) {
        if !self.delivered {
            self.relay.finish(RunResult::failure(
                self.run_id,
                FailureKind::ComputationFailed,
                "worker thread exited without producing a result",
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

fn execute(
    computation: &dyn Computation,
    request: &RunRequest,
    relay: &LogRelay,
    permit: RunPermit,
) -> RunResult {
    let slot = ResultSlot::new(request.run_id, relay.clone());
    // Rebound after `slot` so an unwind frees the gate before the fallback
    // result is published.
    let permit = permit;

    let mut capture = RunCapture::install(relay);
    let result = run_captured(computation, request, relay, capture.io());
    // Flushes the stream sinks and restores the thread's subscriber before
    // the result is queued behind the run's last log line.
    capture.release();

    // Whoever receives the result may dispatch the next run immediately.
    drop(permit);
    slot.deliver(result.clone());
    result
}

fn run_captured(
    computation: &dyn Computation,
    request: &RunRequest,
    relay: &LogRelay,
    io: &mut RunIo,
) -> RunResult {
    let (config, output_dir) = match prepare(request, relay) {
        Ok(prepared) => prepared,
        Err(err) => {
            relay.publish(LogEvent::runner(LogLevel::Error, err.to_string()));
            return RunResult::from_error(request.run_id, &err);
        }
    };

    match invoke(computation, &config, &output_dir, io) {
        Ok(()) => {
            relay.publish(LogEvent::runner(LogLevel::Info, "Run completed"));
            RunResult::success(request.run_id, output_dir)
        }
        Err(detail) => {
            relay.publish(LogEvent::runner(
                LogLevel::Error,
                format!("ERROR:\n{detail}"),
            ));
            RunResult::failure(request.run_id, FailureKind::ComputationFailed, detail)
        }
    }
}

/// Validate the configuration, create the run directory and persist the
/// effective configuration, announcing each step.
fn prepare(
    request: &RunRequest,
    relay: &LogRelay,
) -> Result<(MaterializedConfig, PathBuf), CoreError> {
    let document = materialize::load_config(&request.config_path, &request.overrides)?;

    let output_dir = layout::create_run_dir(&request.output_root, Local::now())?;
    relay.publish(LogEvent::runner(
        LogLevel::Info,
        format!("Output directory: {}", output_dir.display()),
    ));

    let config = MaterializedConfig::new(request, document, output_dir.clone());
    let record = config.persist()?;
    let record_name = record
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| record.display().to_string());
    relay.publish(LogEvent::runner(
        LogLevel::Info,
        format!("Effective configuration saved as {record_name}"),
    ));

    Ok((config, output_dir))
}

/// Call the computation, converting errors and panics into their full
/// diagnostic text.
fn invoke(
    computation: &dyn Computation,
    config: &MaterializedConfig,
    output_dir: &Path,
    io: &mut RunIo,
) -> Result<(), String> {
    match panic::catch_unwind(AssertUnwindSafe(|| computation.run(config, output_dir, io))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(format!("{err:?}")),
        Err(payload) => Err(format!("computation panicked: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permit_is_exclusive_and_released_on_drop() {
        let active = Arc::new(AtomicBool::new(false));
        let permit = RunPermit::acquire(&active).unwrap();
        assert!(matches!(
            RunPermit::acquire(&active),
            Err(CoreError::RunInProgress)
        ));
        drop(permit);
        assert!(RunPermit::acquire(&active).is_ok());
    }

    #[test]
    fn undelivered_slot_publishes_a_failure() {
        let (relay, mut rx) = LogRelay::channel();
        let id = RunId::now_v7();
        drop(ResultSlot::new(id, relay));

        let batch = rx.drain();
        assert_eq!(batch.len(), 1);
        match &batch[0] {
            temoa_events::InteractiveEvent::RunFinished(result) => {
                assert_eq!(result.run_id, id);
                assert!(!result.succeeded);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn panic_messages_are_extracted() {
        let payload = panic::catch_unwind(|| panic!("bad bound {}", 3)).unwrap_err();
        assert_eq!(panic_message(&*payload), "bad bound 3");
        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(&*payload), "static");
    }
}
