//! HTTP server setup.
//!
//! # Responsibilities
//! - Snapshot the engine's mux and wrap it in the timeout layer
//! - Bind the mux to a listener via `axum::serve`
//! - Stop accepting on shutdown and drain in-flight requests for a bounded time

use std::future::IntoFuture;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, oneshot};
use tower_http::timeout::TimeoutLayer;

use crate::config::ServerConfig;
use crate::engine::Engine;

/// HTTP server for an engine's routes.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    /// Create a server for every route registered on `engine` so far.
    ///
    /// Routes registered afterwards are not served.
    pub fn new(engine: &Engine, config: ServerConfig) -> Self {
        let router = Self::build_router(engine.router(), &config);
        Self { router, config }
    }

    #[allow(deprecated)]
    fn build_router(router: Router, config: &ServerConfig) -> Router {
        router.layer(TimeoutLayer::new(Duration::from_secs(
            config.request_timeout_secs,
        )))
    }

    /// Run the server until `shutdown` fires, then drain.
    ///
    /// In-flight requests get `shutdown_timeout_secs` to finish; whatever is
    /// still running after that is dropped.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let (draining_tx, draining_rx) = oneshot::channel::<()>();
        let signal = async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server draining");
            let _ = draining_tx.send(());
        };

        let serve = axum::serve(listener, self.router)
            .with_graceful_shutdown(signal)
            .into_future();
        tokio::pin!(serve);

        let grace = Duration::from_secs(self.config.shutdown_timeout_secs);
        let deadline = async move {
            if draining_rx.await.is_err() {
                std::future::pending::<()>().await;
            }
            tokio::time::sleep(grace).await;
        };

        tokio::select! {
            result = &mut serve => result?,
            _ = deadline => {
                tracing::warn!(
                    grace_secs = grace.as_secs(),
                    "Drain deadline exceeded, dropping in-flight requests"
                );
            }
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
