use thiserror::Error;

/// Errors the scoring engine can produce. Data-shape anomalies (duplicate
/// events, late arrivals, unknown metadata fields) are absorbed by policy
/// and never appear here.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed tunables. Raised before any computation runs; a config is
    /// either applied whole or not at all.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Hysteresis comparison attempted with no prior confirmed state. The
    /// classifier recovers by classifying the first data point immediately;
    /// callers never see this.
    #[error("no prior score available for hysteresis comparison")]
    InsufficientHistory,
}

pub type EngineResult<T> = Result<T, EngineError>;
