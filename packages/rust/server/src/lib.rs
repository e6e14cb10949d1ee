//! Development preview server.
//!
//! Serves the output directory over HTTP and pushes a server-sent event to
//! every connected page on [`RELOAD_PATH`] whenever [`Reloader::reload`] is
//! called. Pages built in development mode carry a small client that reloads
//! on that event.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::Path;

use axum::Router;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::routing::get;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, instrument, warn};

use sitekit_shared::{RELOAD_PATH, Result, SiteError};

// ---------------------------------------------------------------------------
// Reloader
// ---------------------------------------------------------------------------

/// Broadcasts reload signals to connected browsers.
#[derive(Debug, Clone)]
pub struct Reloader {
    tx: broadcast::Sender<()>,
}

impl Reloader {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    /// Ask every connected page to reload. Returns how many were notified.
    pub fn reload(&self) -> usize {
        let notified = self.tx.send(()).unwrap_or(0);
        info!(clients = notified, "reloading browser preview");
        notified
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Number of pages currently listening.
    pub fn client_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Reloader {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Build the preview router: static files from `root` plus the reload stream.
pub fn router(root: &Path, reloader: Reloader) -> Router {
    Router::new()
        .route(RELOAD_PATH, get(reload_events))
        .fallback_service(ServeDir::new(root).append_index_html_on_directories(true))
        .layer(TraceLayer::new_for_http())
        .with_state(reloader)
}

async fn reload_events(
    State(reloader): State<Reloader>,
) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    debug!("preview client connected");
    let stream = BroadcastStream::new(reloader.subscribe())
        .filter_map(|signal| signal.ok().map(|()| Ok(Event::default().data("reload"))));
    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// A running preview server.
#[derive(Debug)]
pub struct PreviewServer {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl PreviewServer {
    /// Bind `host:port` and start serving `root` in a background task.
    /// Port `0` picks a free port.
    #[instrument(skip(reloader), fields(root = %root.display()))]
    pub async fn start(root: &Path, host: &str, port: u16, reloader: Reloader) -> Result<Self> {
        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|e| SiteError::Server(format!("failed to bind {host}:{port}: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| SiteError::Server(format!("failed to read bound address: {e}")))?;

        let app = router(root, reloader);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await
        });

        info!(%addr, "preview server listening");

        Ok(Self {
            addr,
            shutdown: Some(shutdown_tx),
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for the server task to finish.
    /// Open reload streams are dropped with the task.
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        // Reload streams never complete on their own.
        self.handle.abort();
        match self.handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(SiteError::Server(format!("preview server failed: {e}"))),
            Err(e) if e.is_cancelled() => Ok(()),
            Err(e) => {
                warn!(error = %e, "preview server task panicked");
                Err(SiteError::Server(format!("preview server task failed: {e}")))
            }
        }
    }
}
