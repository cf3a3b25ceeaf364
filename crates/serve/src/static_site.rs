//! Static directory server for report artifacts.
//!
//! Each [`StaticSite`] owns one bound listener and one background thread
//! running a current-thread runtime. A stopped site is never restarted; a
//! new one with a fresh port lease takes its place.

use std::future::IntoFuture;
use std::path::{Path, PathBuf};
use std::thread::JoinHandle;
use std::time::Duration;

use axum::Router;
use temoa_core::{ServerHandle, ServerKind, LOOPBACK_HOST};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tower_http::services::ServeDir;

use crate::error::ServerError;
use crate::port;
use crate::slot::ServerSlot;

const KIND: &str = "static-site";

/// How long in-flight connections may keep a stopping site alive. Whatever
/// is still open afterwards is dropped with the site's runtime.
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// StaticSite
// ---------------------------------------------------------------------------

/// One running static server bound to a single root.
#[derive(Debug)]
pub struct StaticSite {
    handle: ServerHandle,
    shutdown: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl StaticSite {
    /// Bind a fresh port and start serving `root` on a background thread.
    ///
    /// Resolves once the background runtime has taken ownership of the
    /// listener. The caller's task is never blocked while waiting.
    pub async fn launch(root: &Path) -> Result<Self, ServerError> {
        if !root.is_dir() {
            return Err(ServerError::start_failed(
                KIND,
                format!("{} is not a directory", root.display()),
            ));
        }

        let port = port::allocate()?;
        let listener = std::net::TcpListener::bind((LOOPBACK_HOST, port))
            .map_err(|e| ServerError::start_failed(KIND, e))?;
        listener
            .set_nonblocking(true)
            .map_err(|e| ServerError::start_failed(KIND, e))?;

        let shutdown = CancellationToken::new();
        let (ready_tx, ready_rx) = oneshot::channel();
        let thread = std::thread::Builder::new()
            .name(format!("static-site-{port}"))
            .spawn({
                let root = root.to_path_buf();
                let shutdown = shutdown.clone();
                move || serve_blocking(listener, root, shutdown, ready_tx)
            })
            .map_err(|e| ServerError::start_failed(KIND, e))?;

        let startup = match ready_rx.await {
            Ok(result) => result,
            Err(_) => Err("server thread exited during startup".to_string()),
        };
        if let Err(reason) = startup {
            join(thread).await;
            return Err(ServerError::start_failed(KIND, reason));
        }

        tracing::info!(port, root = %root.display(), "Static site server started");
        Ok(Self {
            handle: ServerHandle::new(ServerKind::StaticSite, root, port),
            shutdown,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> &ServerHandle {
        &self.handle
    }

    pub fn root(&self) -> &Path {
        &self.handle.root
    }

    /// Signal shutdown and wait for the background thread to exit.
    ///
    /// Resolves within [`SHUTDOWN_GRACE`] plus thread teardown, however many
    /// connections are still open. The port is released when this returns.
    pub async fn stop(mut self) {
        self.shutdown.cancel();
        if let Some(thread) = self.thread.take() {
            join(thread).await;
            self.handle.running = false;
            tracing::info!(
                port = self.handle.port,
                root = %self.handle.root.display(),
                "Static site server stopped"
            );
        }
    }
}

impl Drop for StaticSite {
    /// Dropping without `stop` signals shutdown and detaches the thread,
    /// which exits on its own within [`SHUTDOWN_GRACE`].
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Join the server thread off the async executor.
async fn join(thread: JoinHandle<()>) {
    let name = thread.thread().name().map(str::to_owned);
    match tokio::task::spawn_blocking(move || thread.join()).await {
        Ok(Ok(())) => {}
        _ => tracing::error!(thread = ?name, "Static site server thread panicked"),
    }
}

/// Body of the background thread. Request handling carries no trace layer,
/// so served files produce no diagnostics.
fn serve_blocking(
    listener: std::net::TcpListener,
    root: PathBuf,
    shutdown: CancellationToken,
    ready: oneshot::Sender<Result<(), String>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(format!("failed to build runtime: {e}")));
            return;
        }
    };

    runtime.block_on(async move {
        let listener = match tokio::net::TcpListener::from_std(listener) {
            Ok(listener) => listener,
            Err(e) => {
                let _ = ready.send(Err(format!("failed to register listener: {e}")));
                return;
            }
        };
        let _ = ready.send(Ok(()));

        let app = Router::new().fallback_service(ServeDir::new(root));
        let serve = axum::serve(listener, app)
            .with_graceful_shutdown(shutdown.clone().cancelled_owned())
            .into_future();
        let deadline = async {
            shutdown.cancelled().await;
            tokio::time::sleep(SHUTDOWN_GRACE).await;
        };

        tokio::select! {
            result = serve => {
                if let Err(e) = result {
                    tracing::warn!(error = %e, "Static site server exited with error");
                }
            }
            () = deadline => {
                tracing::debug!("Static site grace period elapsed, dropping open connections");
            }
        }
    });
    // Dropping the runtime here drops every connection task still alive.
}

// ---------------------------------------------------------------------------
// EphemeralHttpServer
// ---------------------------------------------------------------------------

/// Serves at most one report directory at a time.
///
/// Starting the root already served returns the existing address; starting
/// a different root stops the current site first.
#[derive(Default)]
pub struct EphemeralHttpServer {
    slot: ServerSlot,
}

impl EphemeralHttpServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `root` and return its base address (`http://127.0.0.1:<port>/`).
    pub async fn start(&mut self, root: &Path) -> Result<String, ServerError> {
        match self.slot.reconcile(Some(root)).await? {
            Some(handle) => Ok(handle.address()),
            None => Err(ServerError::start_failed(KIND, "no server after reconcile")),
        }
    }

    /// Stop the current site, if any. Returns after its port is released.
    pub async fn stop(&mut self) {
        self.slot.clear().await;
    }

    pub fn handle(&self) -> Option<&ServerHandle> {
        self.slot.current()
    }

    pub fn is_running(&self) -> bool {
        self.slot.current().is_some()
    }
}
