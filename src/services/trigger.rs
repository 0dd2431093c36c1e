//! HTTP trigger server
//!
//! Lets an external scheduler (Cloud Scheduler, cron + curl) start a cycle
//! with a request. The request body is ignored. Cycles inside this process
//! run one at a time; concurrent invocations across processes must be
//! serialized by the deployment.

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::cycle::CycleRunner;
use crate::error::{Result, WatchError};

pub struct TriggerServer {
    runner: Arc<Mutex<CycleRunner>>,
    port: u16,
}

impl TriggerServer {
    pub fn new(runner: CycleRunner, port: u16) -> Self {
        Self {
            runner: Arc::new(Mutex::new(runner)),
            port,
        }
    }

    pub fn router(&self) -> Router {
        router(Arc::clone(&self.runner))
    }

    /// Serve until the process is stopped
    pub async fn run(&self) -> Result<()> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting trigger server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| WatchError::Internal(format!("Trigger server error: {}", e)))?;

        Ok(())
    }
}

pub fn router(runner: Arc<Mutex<CycleRunner>>) -> Router {
    Router::new()
        .route("/", get(check_handler).post(check_handler))
        .route("/healthz", get(liveness_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(runner)
}

/// Run one cycle and report the generic status payload
async fn check_handler(State(runner): State<Arc<Mutex<CycleRunner>>>) -> impl IntoResponse {
    let runner = runner.lock().await;
    let report = runner.run().await;
    (StatusCode::OK, Json(report.status()))
}

async fn liveness_handler() -> impl IntoResponse {
    StatusCode::OK
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => tracing::error!("Failed to install SIGTERM handler: {}", e),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
