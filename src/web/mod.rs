//! HTTP surface: artifact serving, the merge trigger and read-only status

use anyhow::Result;
use axum::{Router, routing::get};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::config::WebConfig;
use crate::config::defaults::{PLAYLIST_FILE_NAME, RUN_MERGE_PATH};
use crate::database::Database;
use crate::merge::MergeService;

pub mod handlers;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub merge: Arc<MergeService>,
    pub database: Database,
}

pub struct WebServer {
    app: Router,
    addr: SocketAddr,
}

impl WebServer {
    pub fn new(config: &WebConfig, state: AppState) -> Result<Self> {
        let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
        Ok(Self {
            app: router(state),
            addr,
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Serve until the token is cancelled
    pub async fn serve(self, cancellation_token: CancellationToken) -> Result<()> {
        let listener = tokio::net::TcpListener::bind(&self.addr)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to bind to {}: {}", self.addr, e))?;
        tracing::info!("Web server listening on http://{}", self.addr);

        let shutdown_signal = async move {
            cancellation_token.cancelled().await;
            tracing::info!("Web server received cancellation signal, shutting down gracefully");
        };

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal)
            .await?;
        Ok(())
    }
}

/// Build the router; the guide route follows the configured compression
pub fn router(state: AppState) -> Router {
    let guide_route = format!("/{}", state.merge.paths().guide_file_name);

    Router::new()
        .route(&format!("/{PLAYLIST_FILE_NAME}"), get(handlers::artifacts::serve_playlist))
        .route(&guide_route, get(handlers::artifacts::serve_guide))
        .route(
            &format!("/{RUN_MERGE_PATH}"),
            get(handlers::artifacts::run_merge).post(handlers::artifacts::run_merge),
        )
        .route("/health", get(handlers::health::health_check))
        .route("/api/v1/sources", get(handlers::sources::list_sources))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
