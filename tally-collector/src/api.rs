//! Wire types for the collector's HTTP endpoints

use crate::error::{CollectorError, Result};
use serde::{Deserialize, Serialize};
use tally::{NodeSnapshot, WindowCounters};

/// Body of `POST /update_metrics`.
///
/// `node_id` is required. Every counter defaults to zero when absent and
/// unknown fields are ignored.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct IngestRequest {
    pub node_id: Option<String>,
    pub mem_bytes_allocated: u64,
    pub page_faults: u64,
    pub ctx_switches_graceful: u64,
    pub ctx_switches_forced: u64,
    pub fs_read_count: u64,
    pub fs_read_size_kb: u64,
    pub fs_write_count: u64,
    pub fs_write_size_kb: u64,
}

impl IngestRequest {
    /// Only a JSON object is accepted. The derived struct impl would also
    /// take a positional array, which must not reach the state.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(body).map_err(CollectorError::MalformedBody)?;
        if !value.is_object() {
            return Err(CollectorError::MalformedBody(
                serde::de::Error::custom("expected a JSON object"),
            ));
        }
        serde_json::from_value(value).map_err(CollectorError::MalformedBody)
    }

    pub fn into_snapshot(self) -> Result<NodeSnapshot> {
        let node_id = self
            .node_id
            .filter(|id| !id.is_empty())
            .ok_or(CollectorError::MissingNodeId)?;

        Ok(NodeSnapshot::new(
            node_id,
            WindowCounters {
                mem_bytes_allocated: self.mem_bytes_allocated,
                page_faults: self.page_faults,
                ctx_switches_graceful: self.ctx_switches_graceful,
                ctx_switches_forced: self.ctx_switches_forced,
                fs_read_count: self.fs_read_count,
                fs_read_size_kb: self.fs_read_size_kb,
                fs_write_count: self.fs_write_count,
                fs_write_size_kb: self.fs_write_size_kb,
            },
        ))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    pub fn updated() -> Self {
        Self {
            status: "Metrics updated".to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct NodesResponse {
    pub nodes: Vec<String>,
}

/// Query string of `GET /query`
#[derive(Debug, Default, Clone, Deserialize)]
pub struct QueryParams {
    pub q: Option<String>,
    pub time: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub step: Option<String>,
}
