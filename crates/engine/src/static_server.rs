//! Ephemeral static file server
//!
//! Lighthouse needs an `http://` URL, so a prompt's HTML directory is served
//! on an OS-assigned loopback port for the duration of one audit.

use axum::Router;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{EngineError, EngineResult};

pub struct StaticServer {
    addr: SocketAddr,
    root: PathBuf,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl StaticServer {
    /// Serve `root` on `127.0.0.1:<free port>`
    pub async fn start(root: &Path) -> EngineResult<Self> {
        if !root.is_dir() {
            return Err(EngineError::StaticServer(format!(
                "not a directory: {}",
                root.display()
            )));
        }

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .map_err(|e| EngineError::StaticServer(e.to_string()))?;
        let addr = listener.local_addr()?;

        let app = Router::new()
            .fallback_service(ServeDir::new(root))
            .layer(TraceLayer::new_for_http());

        let (tx, rx) = oneshot::channel::<()>();
        let task = tokio::spawn(async move {
            let server = axum::serve(listener, app).with_graceful_shutdown(async {
                let _ = rx.await;
            });
            if let Err(e) = server.await {
                warn!("Static server error: {}", e);
            }
        });

        info!("Local HTTP server started on http://{} for {}", addr, root.display());
        Ok(Self {
            addr,
            root: root.to_path_buf(),
            shutdown: Some(tx),
            task: Some(task),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// URL of a file relative to the served root, percent-encoded
    pub fn url_for(&self, file_name: &str) -> EngineResult<String> {
        let base = Url::parse(&format!("http://localhost:{}/", self.addr.port()))
            .map_err(|e| EngineError::StaticServer(e.to_string()))?;
        let url = base
            .join(file_name)
            .map_err(|e| EngineError::StaticServer(e.to_string()))?;
        Ok(url.to_string())
    }

    /// Stop accepting connections and wait for the server task
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Static server task ended abnormally: {}", e);
            }
        }
        info!("Local HTTP server for {} stopped", self.root.display());
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            debug!("Aborting static server on {}", self.addr);
            task.abort();
        }
    }
}
