//! Pass-through to the Prometheus HTTP API
//!
//! Lets callers that only know the collector ask Prometheus for history,
//! e.g. `/query?q=avg_over_time(mem_bytes_allocated[5m])`.

use crate::api::QueryParams;
use crate::error::{CollectorError, Result};
use axum::http::StatusCode;
use std::time::Duration;

const DEFAULT_STEP: &str = "15s";

pub struct PrometheusProxy {
    client: reqwest::Client,
    base_url: String,
}

impl PrometheusProxy {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollectorError::Upstream(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Instant query, or range query when both `start` and `end` are given
    pub async fn query(&self, params: QueryParams) -> Result<(StatusCode, serde_json::Value)> {
        let query = params
            .q
            .filter(|q| !q.is_empty())
            .ok_or(CollectorError::MissingQuery)?;

        let (endpoint, upstream_params) = match (params.start, params.end) {
            (Some(start), Some(end)) => (
                "/api/v1/query_range",
                vec![
                    ("query", query),
                    ("start", start),
                    ("end", end),
                    (
                        "step",
                        params.step.unwrap_or_else(|| DEFAULT_STEP.to_string()),
                    ),
                ],
            ),
            _ => {
                let mut upstream = vec![("query", query)];
                if let Some(time) = params.time {
                    upstream.push(("time", time));
                }
                ("/api/v1/query", upstream)
            }
        };

        let response = self
            .client
            .get(format!("{}{}", self.base_url, endpoint))
            .query(&upstream_params)
            .send()
            .await
            .map_err(|e| CollectorError::Upstream(e.to_string()))?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .unwrap_or(StatusCode::BAD_GATEWAY);
        let body = response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| CollectorError::Upstream(e.to_string()))?;

        Ok((status, body))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}
