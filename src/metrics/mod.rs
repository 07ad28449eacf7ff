pub mod exporter;
pub mod pipeline;

pub use exporter::{encode_text, TEXT_CONTENT_TYPE};
pub use pipeline::PipelineMetrics;
