//! Embedded query application over a run's dataset.
//!
//! The application runs as a task on the caller's runtime. One instance
//! serves one dataset for the lifetime of the process; switching to another
//! file is refused with [`ServerError::DatasetChangeUnsupported`].

pub mod dataset;
pub mod probe;
pub mod routes;

use std::path::{Path, PathBuf};
use std::time::Duration;

use temoa_core::{ServerHandle, ServerKind, LOOPBACK_HOST};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use dataset::Dataset;
pub use probe::ReadinessOptions;

use crate::error::ServerError;
use crate::port;

const KIND: &str = "query";

/// How long `stop` waits for in-flight requests before abandoning the task.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

struct RunningQuery {
    handle: ServerHandle,
    dataset: Dataset,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Owner of the query application's lifecycle.
#[derive(Default)]
pub struct EmbeddedQueryServer {
    readiness: ReadinessOptions,
    running: Option<RunningQuery>,
}

impl EmbeddedQueryServer {
    pub fn new(readiness: ReadinessOptions) -> Self {
        Self {
            readiness,
            running: None,
        }
    }

    pub fn handle(&self) -> Option<&ServerHandle> {
        self.running.as_ref().map(|r| &r.handle)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Serve `data_file` and return the application's base address.
    ///
    /// Returns once `/health` answers. The same file again returns the
    /// existing address without touching the server.
    pub async fn start(&mut self, data_file: &Path) -> Result<String, ServerError> {
        let data_file = normalize(data_file);
        if let Some(running) = &self.running {
            if running.handle.root == data_file {
                return Ok(running.handle.address());
            }
            return Err(ServerError::DatasetChangeUnsupported {
                running: running.handle.root.clone(),
                requested: data_file,
            });
        }

        // Open first so nothing suspends between taking the lease and binding.
        let dataset = Dataset::open(&data_file).await?;
        let (port, listener) = match bind_lease() {
            Ok(bound) => bound,
            Err(e) => {
                dataset.close().await;
                return Err(e);
            }
        };

        let cancel = CancellationToken::new();
        let app = routes::router(dataset.clone());
        let task = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                let result = axum::serve(listener, app)
                    .with_graceful_shutdown(async move { cancel.cancelled().await })
                    .await;
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Query server exited with error");
                }
            }
        });

        let handle = ServerHandle::new(ServerKind::Query, &data_file, port);
        if let Err(reason) = probe::wait_ready(&handle.address_of("health"), self.readiness).await {
            cancel.cancel();
            abort_after(STOP_TIMEOUT, task).await;
            dataset.close().await;
            return Err(ServerError::start_failed(KIND, reason));
        }

        tracing::info!(port, dataset = %data_file.display(), "Query server started");
        let address = handle.address();
        self.running = Some(RunningQuery {
            handle,
            dataset,
            cancel,
            task,
        });
        Ok(address)
    }

    /// Cancel the application and close the dataset. Safe when not running.
    pub async fn stop(&mut self) {
        let Some(running) = self.running.take() else {
            return;
        };
        running.cancel.cancel();
        if !abort_after(STOP_TIMEOUT, running.task).await {
            tracing::warn!(port = running.handle.port, "Query server did not stop in time");
        }
        running.dataset.close().await;
        tracing::info!(port = running.handle.port, "Query server stopped");
    }
}

impl Drop for EmbeddedQueryServer {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running.cancel.cancel();
        }
    }
}

/// Take a port lease and bind it in the same synchronous step.
fn bind_lease() -> Result<(u16, tokio::net::TcpListener), ServerError> {
    let port = port::allocate()?;
    let listener = std::net::TcpListener::bind((LOOPBACK_HOST, port))
        .and_then(|listener| {
            listener.set_nonblocking(true)?;
            tokio::net::TcpListener::from_std(listener)
        })
        .map_err(|e| ServerError::start_failed(KIND, e))?;
    Ok((port, listener))
}

/// Wait for `task` up to `limit`, aborting it if it is still running.
/// Returns whether it finished on its own.
async fn abort_after(limit: Duration, mut task: JoinHandle<()>) -> bool {
    if tokio::time::timeout(limit, &mut task).await.is_ok() {
        return true;
    }
    task.abort();
    false
}

fn normalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
