//! Local health and self-metrics endpoint

use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tally::metrics::{encode_text, PipelineMetrics, TEXT_CONTENT_TYPE};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub fn router(metrics: Arc<PipelineMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(metrics)
}

pub async fn serve(
    listener: TcpListener,
    metrics: Arc<PipelineMetrics>,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Health server started");
    }

    axum::serve(listener, router(metrics))
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await
}

async fn metrics_handler(State(metrics): State<Arc<PipelineMetrics>>) -> impl IntoResponse {
    match encode_text(metrics.registry()) {
        Ok(body) => (StatusCode::OK, [(CONTENT_TYPE, TEXT_CONTENT_TYPE)], body),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [(CONTENT_TYPE, "text/plain")],
                format!("failed to encode metrics: {e}"),
            )
        }
    }
}

async fn healthz_handler() -> &'static str {
    "ok"
}
