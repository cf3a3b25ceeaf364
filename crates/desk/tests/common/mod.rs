#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use temoa_core::{LogEvent, LogLevel, RunResult};
use temoa_desk::{Collaborator, RunDefaults, RunOrchestrator};
use temoa_events::{InteractiveEvent, LogRelay, RelayReceiver};
use temoa_serve::ReadinessOptions;
use temoa_worker::{Computation, JobRunner};
use tempfile::TempDir;

/// Everything a collaborator was told, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Log(LogLevel, String),
    Busy(bool),
    RunComplete(RunResult),
    ReportReady(String),
    DatasetReady(String),
    NoArtifacts(PathBuf),
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub notifications: Vec<Notification>,
}

impl Recorder {
    pub fn position(&self, predicate: impl Fn(&Notification) -> bool) -> Option<usize> {
        self.notifications.iter().position(predicate)
    }

    pub fn report_address(&self) -> Option<&str> {
        self.notifications.iter().find_map(|n| match n {
            Notification::ReportReady(address) => Some(address.as_str()),
            _ => None,
        })
    }

    pub fn dataset_address(&self) -> Option<&str> {
        self.notifications.iter().find_map(|n| match n {
            Notification::DatasetReady(address) => Some(address.as_str()),
            _ => None,
        })
    }

    pub fn results(&self) -> Vec<&RunResult> {
        self.notifications
            .iter()
            .filter_map(|n| match n {
                Notification::RunComplete(result) => Some(result),
                _ => None,
            })
            .collect()
    }
}

impl Collaborator for Recorder {
    fn on_log(&mut self, event: &LogEvent) {
        self.notifications
            .push(Notification::Log(event.level, event.text.clone()));
    }

    fn on_busy_changed(&mut self, busy: bool) {
        self.notifications.push(Notification::Busy(busy));
    }

    fn on_run_complete(&mut self, result: &RunResult) {
        self.notifications
            .push(Notification::RunComplete(result.clone()));
    }

    fn on_report_ready(&mut self, address: &str) {
        self.notifications
            .push(Notification::ReportReady(address.to_string()));
    }

    fn on_dataset_ready(&mut self, address: &str) {
        self.notifications
            .push(Notification::DatasetReady(address.to_string()));
    }

    fn on_no_artifacts(&mut self, output_dir: &Path) {
        self.notifications
            .push(Notification::NoArtifacts(output_dir.to_path_buf()));
    }
}

/// A model directory holding `utopia.toml`.
pub fn model_dir() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("utopia.toml");
    std::fs::write(&config, "scenario = \"utopia\"\n").expect("write config");
    (dir, config)
}

pub fn orchestrator(
    config: &Path,
    computation: impl Computation,
) -> (RunOrchestrator<Recorder>, RelayReceiver) {
    let (relay, receiver) = LogRelay::channel();
    let orchestrator = RunOrchestrator::new(
        Recorder::default(),
        JobRunner::new(computation),
        relay,
        RunDefaults::new(config),
        ReadinessOptions {
            timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(20),
        },
    );
    (orchestrator, receiver)
}

/// Pump relay events into the orchestrator until a run result has been
/// handled.
pub async fn pump_until_finished(
    orchestrator: &mut RunOrchestrator<Recorder>,
    receiver: &mut RelayReceiver,
) {
    let pump = async {
        while let Some(event) = receiver.recv().await {
            let finished = matches!(event, InteractiveEvent::RunFinished(_));
            orchestrator.handle(event).await;
            if finished {
                return;
            }
        }
        panic!("relay closed before the run finished");
    };
    tokio::time::timeout(Duration::from_secs(30), pump)
        .await
        .expect("run finished in time");
}

/// Write a one-table SQLite dataset at `path`.
pub async fn seed_dataset(path: &Path) {
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .expect("create dataset");
    sqlx::query("CREATE TABLE capacity (tech TEXT, period INTEGER, value REAL)")
        .execute(&pool)
        .await
        .expect("create table");
    sqlx::query("INSERT INTO capacity VALUES ('E01', 2020, 12.5), ('E21', 2030, 3.0)")
        .execute(&pool)
        .await
        .expect("insert rows");
    pool.close().await;
}
