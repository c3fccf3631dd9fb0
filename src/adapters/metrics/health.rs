//! Health Check Server - Liveness, Readiness, and Metrics
//!
//! Exposes /live, /ready and /metrics via axum 0.7. Readiness depends
//! on the operation stream being connected and the manager not
//! shutting down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use tokio::sync::broadcast;
use tracing::{info, instrument};

use super::prometheus::MetricsRegistry;

/// Shared health state polled by readiness probes.
#[derive(Debug, Clone)]
pub struct HealthState {
    /// Whether the fill stream is subscribed.
    pub stream_healthy: Arc<AtomicBool>,
    /// Whether the manager is running (false once shutdown starts).
    pub manager_running: Arc<AtomicBool>,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (stream not yet connected).
    pub fn new() -> Self {
        Self {
            stream_healthy: Arc::new(AtomicBool::new(false)),
            manager_running: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Check if the bot is ready to trade.
    pub fn is_ready(&self) -> bool {
        self.stream_healthy.load(Ordering::Relaxed) && self.manager_running.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
struct AppState {
    health: Arc<HealthState>,
    metrics: Arc<MetricsRegistry>,
}

/// Axum-based health and metrics HTTP server.
pub struct HealthServer {
    state: Arc<HealthState>,
    metrics: Arc<MetricsRegistry>,
    bind_address: String,
}

impl HealthServer {
    /// Create a new health server.
    pub fn new(state: Arc<HealthState>, metrics: Arc<MetricsRegistry>, bind_address: String) -> Self {
        Self {
            state,
            metrics,
            bind_address,
        }
    }

    /// Serve until the shutdown broadcast fires.
    #[instrument(skip(self, shutdown_rx))]
    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> anyhow::Result<()> {
        let app = Router::new()
            .route("/live", get(Self::liveness))
            .route("/ready", get(Self::readiness))
            .route("/metrics", get(Self::metrics))
            .with_state(AppState {
                health: Arc::clone(&self.state),
                metrics: Arc::clone(&self.metrics),
            });

        let listener = tokio::net::TcpListener::bind(&self.bind_address).await?;

        info!(address = %self.bind_address, "Health server started");

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await?;

        Ok(())
    }

    /// Liveness probe: always returns 200 if the process is running.
    async fn liveness() -> impl IntoResponse {
        (StatusCode::OK, "OK")
    }

    /// Readiness probe: 200 only while the stream is up and the manager runs.
    async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
        if state.health.is_ready() {
            (StatusCode::OK, "READY")
        } else {
            (StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }

    async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
        state.metrics.render()
    }
}
