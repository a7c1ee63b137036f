//! Ephemeral static file server for the scanned directory
//!
//! The browser renders pages over plain HTTP from this server so that
//! relative links, stylesheets and scripts resolve the same way they do
//! in production.

use std::net::SocketAddr;
use std::path::Path;

use anyhow::Context;
use axum::Router;
use tokio::task::JoinHandle;
use tower_http::services::ServeDir;
use tracing::{debug, error};

pub struct StaticServer {
    url: String,
    handle: JoinHandle<()>,
}

impl StaticServer {
    /// Serve `root` on an ephemeral localhost port.
    pub async fn start(root: &Path) -> anyhow::Result<Self> {
        let app = Router::new().fallback_service(ServeDir::new(root));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .context("Failed to bind static file server")?;
        let addr: SocketAddr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                error!("Static file server stopped: {e}");
            }
        });
        debug!("Serving static files on http://{addr}");
        Ok(StaticServer {
            url: format!("http://{addr}"),
            handle,
        })
    }

    /// Base URL, no trailing slash.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn shutdown(&self) {
        self.handle.abort();
    }
}
