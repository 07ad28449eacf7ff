use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CollectorError {
    #[error("Invalid request format")]
    MissingNodeId,

    #[error("Invalid request format")]
    MalformedBody(#[source] serde_json::Error),

    #[error("Missing query parameter 'q'")]
    MissingQuery,

    #[error("Prometheus URL not configured")]
    PrometheusNotConfigured,

    #[error("{0}")]
    Upstream(String),

    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    #[error(transparent)]
    Exposition(#[from] tally::TallyError),
}

impl CollectorError {
    pub fn status(&self) -> StatusCode {
        match self {
            CollectorError::MissingNodeId
            | CollectorError::MalformedBody(_)
            | CollectorError::MissingQuery => StatusCode::BAD_REQUEST,
            CollectorError::PrometheusNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
            CollectorError::Upstream(_)
            | CollectorError::Metrics(_)
            | CollectorError::Exposition(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for CollectorError {
    fn into_response(self) -> Response {
        (self.status(), Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, CollectorError>;
