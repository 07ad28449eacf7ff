//! Push drained windows to the central collector
//!
//! Delivery is best effort: one POST per window, bounded by a client-wide
//! timeout, never retried. A failed window is lost.

use crate::error::RelayError;
use crate::window::NodeSnapshot;
use crate::Result;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Default collector endpoint inside the cluster
pub const DEFAULT_COLLECTOR_URL: &str =
    "http://orchestrator-service.default.svc.cluster.local:5000/update_metrics";

/// Default upper bound on a single relay request
pub const DEFAULT_RELAY_TIMEOUT: Duration = Duration::from_secs(5);

#[async_trait]
pub trait Relay: Send + Sync {
    async fn send(&self, snapshot: &NodeSnapshot) -> std::result::Result<(), RelayError>;

    /// Human-readable destination, for logs
    fn target(&self) -> &str;
}

/// JSON-over-HTTP relay to the collector's push endpoint
pub struct HttpRelay {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpRelay {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(concat!("tally-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| crate::TallyError::ConfigError(format!("building HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            timeout,
        })
    }

    fn classify(&self, err: reqwest::Error) -> RelayError {
        if err.is_timeout() {
            RelayError::Timeout(self.timeout)
        } else if let Some(status) = err.status() {
            RelayError::Status {
                status: status.as_u16(),
            }
        } else {
            RelayError::Transport(err.to_string())
        }
    }
}

#[async_trait]
impl Relay for HttpRelay {
    async fn send(&self, snapshot: &NodeSnapshot) -> std::result::Result<(), RelayError> {
        let response = self
            .client
            .post(&self.url)
            .json(snapshot)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Status {
                status: status.as_u16(),
            });
        }

        debug!("Relayed snapshot for {} to {}", snapshot.node_id, self.url);
        Ok(())
    }

    fn target(&self) -> &str {
        &self.url
    }
}
