use thiserror::Error;

#[derive(Error, Debug)]
pub enum TallyError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unknown event kind {kind} in probe record")]
    UnknownEventKind { kind: u32 },

    #[error("Metrics error: {0}")]
    MetricsError(#[from] prometheus::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Failure to deliver one snapshot to the collector.
///
/// Every variant is transient from the agent's point of view: the window is
/// dropped and the drain loop carries on.
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Relay request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Collector responded with status {status}")]
    Status { status: u16 },

    #[error("Relay transport error: {0}")]
    Transport(String),
}

pub type Result<T> = std::result::Result<T, TallyError>;
