use thiserror::Error;

/// Failure of a keyed store call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The request carried more items than one call accepts.
    #[error("batch of {actual} exceeds the per-call limit of {limit}")]
    BatchTooLarge { limit: usize, actual: usize },
    /// The store refused the request as malformed.
    #[error("validation failed: {0}")]
    Validation(String),
    /// Provisioned throughput exceeded.
    #[error("request throttled")]
    Throttled,
    /// The call did not complete within its deadline.
    #[error("request timed out")]
    Timeout,
    /// Connectivity or internal provider failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}
