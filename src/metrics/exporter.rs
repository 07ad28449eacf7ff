use crate::Result;
use prometheus::{Encoder, Registry, TextEncoder};

/// Content type of the Prometheus text exposition format
pub const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Gather every collector in `registry` and render the text exposition format
pub fn encode_text(registry: &Registry) -> Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = registry.gather();

    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;

    String::from_utf8(buffer).map_err(|e| {
        crate::TallyError::MetricsError(prometheus::Error::Msg(format!(
            "exposition is not valid UTF-8: {}",
            e
        )))
    })
}
