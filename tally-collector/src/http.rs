//! HTTP surface of the collector

use crate::api::{NodesResponse, QueryParams, StatusResponse};
use crate::error::{CollectorError, Result};
use crate::query::PrometheusProxy;
use crate::service::MetricsIngestionService;
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;
use tally::metrics::TEXT_CONTENT_TYPE;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<MetricsIngestionService>,
    pub proxy: Option<Arc<PrometheusProxy>>,
}

impl AppState {
    pub fn new(service: Arc<MetricsIngestionService>, proxy: Option<PrometheusProxy>) -> Self {
        Self {
            service,
            proxy: proxy.map(Arc::new),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/update_metrics", post(update_metrics_handler))
        .route("/metrics", get(metrics_handler))
        .route("/nodes", get(nodes_handler))
        .route("/query", get(query_handler))
        .route("/healthz", get(healthz_handler))
        .with_state(state)
}

/// Serve until `cancel` fires, then finish in-flight requests
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    cancel: CancellationToken,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Collector listening");
    }

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
        })
        .await
}

// The body is taken raw so that malformed JSON gets the same 400 as a
// missing node_id instead of axum's rejection text.
async fn update_metrics_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StatusResponse>> {
    state.service.ingest_json(&body)?;
    Ok(Json(StatusResponse::updated()))
}

async fn metrics_handler(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let body = state.service.render().map_err(|e| {
        error!("Failed to encode metrics: {}", e);
        e
    })?;
    Ok(([(CONTENT_TYPE, TEXT_CONTENT_TYPE)], body))
}

async fn nodes_handler(State(state): State<AppState>) -> Json<NodesResponse> {
    Json(NodesResponse {
        nodes: state.service.nodes(),
    })
}

async fn query_handler(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> Result<impl IntoResponse> {
    let proxy = state
        .proxy
        .as_ref()
        .ok_or(CollectorError::PrometheusNotConfigured)?;

    let (status, body) = proxy.query(params).await?;
    Ok((status, Json(body)))
}

async fn healthz_handler() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(proxy: Option<PrometheusProxy>) -> AppState {
        AppState::new(Arc::new(MetricsIngestionService::new().unwrap()), proxy)
    }

    async fn push(app: &Router, body: &str) -> (StatusCode, serde_json::Value) {
        let response = app
            .clone()
            .oneshot(
                Request::post("/update_metrics")
                    .header(CONTENT_TYPE, "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    async fn get_text(app: &Router, uri: &str) -> (StatusCode, String) {
        let response = app
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_last_push_wins() {
        let app = router(test_state(None));

        let (status, body) = push(&app, r#"{"node_id": "A", "page_faults": 5}"#).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "Metrics updated");

        push(&app, r#"{"node_id": "A", "page_faults": 9}"#).await;

        let (status, text) = get_text(&app, "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(text.contains("page_faults{node_id=\"A\"} 9"));
    }

    #[tokio::test]
    async fn test_missing_node_id_is_rejected() {
        let state = test_state(None);
        let app = router(state.clone());

        push(&app, r#"{"node_id": "A", "page_faults": 5}"#).await;
        let before = state.service.snapshot_for_exposition();

        let (status, body) = push(&app, r#"{"page_faults": 100}"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request format");

        let (status, body) = push(&app, "{not json").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request format");

        assert_eq!(state.service.snapshot_for_exposition(), before);
    }

    #[tokio::test]
    async fn test_array_body_is_rejected() {
        let state = test_state(None);
        let app = router(state.clone());

        push(&app, r#"{"node_id": "A", "page_faults": 9}"#).await;
        let before = state.service.snapshot_for_exposition();

        let (status, body) = push(&app, r#"["A", 1, 5]"#).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid request format");

        assert_eq!(state.service.snapshot_for_exposition(), before);
        assert_eq!(before[&("page_faults", "A".to_string())], 9);
    }

    #[tokio::test]
    async fn test_nodes_lists_reporting_nodes() {
        let app = router(test_state(None));
        push(&app, r#"{"node_id": "worker-2"}"#).await;
        push(&app, r#"{"node_id": "worker-1"}"#).await;

        let (status, text) = get_text(&app, "/nodes").await;
        assert_eq!(status, StatusCode::OK);

        let nodes: NodesResponse = serde_json::from_str(&text).unwrap();
        assert_eq!(nodes.nodes, vec!["worker-1", "worker-2"]);
    }

    #[tokio::test]
    async fn test_healthz() {
        let app = router(test_state(None));
        let (status, text) = get_text(&app, "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "ok");
    }

    #[tokio::test]
    async fn test_query_without_prometheus_is_unavailable() {
        let app = router(test_state(None));
        let (status, text) = get_text(&app, "/query?q=up").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(text.contains("Prometheus URL not configured"));
    }

    type Params = std::collections::HashMap<String, String>;

    async fn fake_prometheus() -> String {
        async fn instant(Query(params): Query<Params>) -> Json<serde_json::Value> {
            Json(serde_json::json!({
                "status": "success",
                "endpoint": "query",
                "query": params.get("query"),
            }))
        }

        async fn range(Query(params): Query<Params>) -> Json<serde_json::Value> {
            Json(serde_json::json!({
                "status": "success",
                "endpoint": "query_range",
                "step": params.get("step"),
            }))
        }

        let app = Router::new()
            .route("/api/v1/query", get(instant))
            .route("/api/v1/query_range", get(range));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_query_is_forwarded_to_prometheus() {
        let base = fake_prometheus().await;
        let proxy = PrometheusProxy::new(base, Duration::from_secs(5)).unwrap();
        let app = router(test_state(Some(proxy)));

        let (status, text) = get_text(&app, "/query").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(text.contains("Missing query parameter 'q'"));

        let (status, text) = get_text(&app, "/query?q=page_faults").await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(body["endpoint"], "query");
        assert_eq!(body["query"], "page_faults");

        let (status, text) = get_text(&app, "/query?q=page_faults&start=1&end=2").await;
        assert_eq!(status, StatusCode::OK);
        let body: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(body["endpoint"], "query_range");
        assert_eq!(body["step"], "15s");
    }
}
