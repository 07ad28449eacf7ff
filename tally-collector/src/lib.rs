//! Central collector for tally
//!
//! Agents push one flat counter snapshot per drained window to
//! `POST /update_metrics`. The collector keeps only the latest snapshot per
//! node and republishes it as Prometheus gauges on `GET /metrics`.

pub mod api;
pub mod error;
pub mod exposition;
pub mod http;
pub mod query;
pub mod service;
pub mod state;

pub use error::{CollectorError, Result};
pub use http::{router, serve, AppState};
pub use service::MetricsIngestionService;
