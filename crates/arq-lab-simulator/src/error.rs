use thiserror::Error;

/// Failures of the engine's boundary operations. Stale ACKs and timeouts are
/// never errors; they are discarded and reported as events.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("run is not in step mode")]
    NotInStepMode,
    #[error("no step is pending")]
    NoPendingStep,
    #[error("run exceeded {0} ms of simulated time")]
    TimeLimitExceeded(u64),
}
