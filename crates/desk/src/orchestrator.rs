//! End-to-end sequencing of a run on the interactive context.
//!
//! `Idle -> Running -> {Succeeded, Failed}`, with both terminal states
//! accepting a new trigger. Triggers while `Running` are rejected, never
//! queued. All state here is touched only from the task that owns the
//! orchestrator; worker and server contexts reach it through the relay.

use std::path::{Path, PathBuf};

use temoa_core::{
    CoreError, LogEvent, LogLevel, Overrides, RunId, RunRequest, RunResult, ServerHandle,
};
use temoa_events::{InteractiveEvent, LogRelay, RelayReceiver};
use temoa_serve::{EmbeddedQueryServer, EphemeralHttpServer, ReadinessOptions};
use temoa_worker::JobRunner;

use crate::artifacts::{self, Artifacts};
use crate::collaborator::Collaborator;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Per-run settings that do not come from the collaborator.
#[derive(Debug, Clone)]
pub struct RunDefaults {
    pub config_path: PathBuf,
    pub output_root: Option<PathBuf>,
    pub silent: bool,
}

impl RunDefaults {
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            output_root: None,
            silent: false,
        }
    }

    fn request(&self, overrides: Overrides) -> RunRequest {
        let request = RunRequest::new(&self.config_path)
            .with_silent(self.silent)
            .with_overrides(overrides);
        match &self.output_root {
            Some(root) => request.with_output_root(root),
            None => request,
        }
    }
}

pub struct RunOrchestrator<C: Collaborator> {
    collaborator: C,
    runner: JobRunner,
    relay: LogRelay,
    defaults: RunDefaults,
    state: RunState,
    active: Option<RunRequest>,
    report_server: EphemeralHttpServer,
    query_server: EmbeddedQueryServer,
}

impl<C: Collaborator> RunOrchestrator<C> {
    pub fn new(
        collaborator: C,
        runner: JobRunner,
        relay: LogRelay,
        defaults: RunDefaults,
        readiness: ReadinessOptions,
    ) -> Self {
        Self {
            collaborator,
            runner,
            relay,
            defaults,
            state: RunState::Idle,
            active: None,
            report_server: EphemeralHttpServer::new(),
            query_server: EmbeddedQueryServer::new(readiness),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_busy(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn collaborator(&self) -> &C {
        &self.collaborator
    }

    pub fn collaborator_mut(&mut self) -> &mut C {
        &mut self.collaborator
    }

    pub fn report_server(&self) -> Option<&ServerHandle> {
        self.report_server.handle()
    }

    pub fn query_server(&self) -> Option<&ServerHandle> {
        self.query_server.handle()
    }

    // -----------------------------------------------------------------------
    // Trigger
    // -----------------------------------------------------------------------

    /// Start a run with the collaborator's current overrides.
    ///
    /// Returns as soon as the worker is dispatched. While a run is active the
    /// trigger is rejected with [`CoreError::RunInProgress`] and no worker is
    /// created.
    pub fn submit_run(&mut self, overrides: Overrides) -> Result<RunId, CoreError> {
        if self.state == RunState::Running {
            return Err(CoreError::RunInProgress);
        }

        let request = self.defaults.request(overrides);
        let run_id = request.run_id;

        // Dropping the join handle detaches the worker; its result comes back
        // through the relay.
        drop(self.runner.dispatch(request.clone(), self.relay.clone())?);

        self.state = RunState::Running;
        self.active = Some(request);
        self.collaborator.on_busy_changed(true);
        tracing::info!(%run_id, "Run submitted");
        Ok(run_id)
    }

    // -----------------------------------------------------------------------
    // Event processing
    // -----------------------------------------------------------------------

    /// Process one event from the relay.
    pub async fn handle(&mut self, event: InteractiveEvent) {
        match event {
            InteractiveEvent::Log(log) => self.collaborator.on_log(&log),
            InteractiveEvent::RunFinished(result) => self.finish(result).await,
        }
    }

    /// Process everything queued on the relay right now, in order.
    pub async fn drain(&mut self, receiver: &mut RelayReceiver) -> usize {
        let batch = receiver.drain();
        let count = batch.len();
        for event in batch {
            self.handle(event).await;
        }
        count
    }

    async fn finish(&mut self, result: RunResult) {
        let Some(request) = self.active.take() else {
            tracing::warn!(run_id = %result.run_id, "Result without an active run ignored");
            return;
        };
        if request.run_id != result.run_id {
            tracing::warn!(
                expected = %request.run_id,
                received = %result.run_id,
                "Result for another run ignored"
            );
            self.active = Some(request);
            return;
        }

        // Re-enable the trigger before anything else can fail.
        self.state = if result.succeeded {
            RunState::Succeeded
        } else {
            RunState::Failed
        };
        self.collaborator.on_busy_changed(false);
        self.collaborator.on_run_complete(&result);

        match (&result.output_dir, result.succeeded) {
            (Some(output_dir), true) => {
                tracing::info!(run_id = %result.run_id, output_dir = %output_dir.display(), "Run succeeded");
                self.provision(output_dir, &request).await;
            }
            _ => {
                tracing::warn!(
                    run_id = %result.run_id,
                    failure = ?result.failure,
                    "Run failed"
                );
            }
        }
    }

    // -----------------------------------------------------------------------
    // Provisioning
    // -----------------------------------------------------------------------

    /// Serve whatever the run left behind. A failure for one artifact is
    /// reported and does not stop the other.
    async fn provision(&mut self, output_dir: &Path, request: &RunRequest) {
        let Artifacts { report, dataset } = artifacts::discover(output_dir, Some(request));
        if report.is_none() && dataset.is_none() {
            self.collaborator.on_no_artifacts(output_dir);
            return;
        }

        if let Some(report) = report {
            match self.serve_report(&report).await {
                Ok(address) => self.collaborator.on_report_ready(&address),
                Err(message) => self.report_failure(message),
            }
        }

        if let Some(dataset) = dataset {
            match self.query_server.start(&dataset).await {
                Ok(address) => self.collaborator.on_dataset_ready(&address),
                Err(e) => self.report_failure(format!(
                    "Could not serve dataset {}: {e}",
                    dataset.display()
                )),
            }
        }
    }

    async fn serve_report(&mut self, report: &Path) -> Result<String, String> {
        let (Some(root), Some(file_name)) = (report.parent(), report.file_name()) else {
            return Err(format!("Report path {} has no directory", report.display()));
        };
        let base = self
            .report_server
            .start(root)
            .await
            .map_err(|e| format!("Could not serve report {}: {e}", report.display()))?;
        Ok(format!("{base}{}", file_name.to_string_lossy()))
    }

    fn report_failure(&mut self, message: String) {
        tracing::error!(error = %message, "Artifact provisioning failed");
        self.collaborator
            .on_log(&LogEvent::server(LogLevel::Error, message));
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    /// Stop both artifact servers.
    pub async fn shutdown(&mut self) {
        self.report_server.stop().await;
        self.query_server.stop().await;
        tracing::info!("Artifact servers stopped");
    }
}
