use thiserror::Error;

/// Failure to obtain an object's bytes.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("object s3://{bucket}/{key} not found")]
    NotFound { bucket: String, key: String },
    #[error("access to s3://{bucket}/{key} denied: {reason}")]
    AccessDenied {
        bucket: String,
        key: String,
        reason: String,
    },
    #[error("object stream for s3://{bucket}/{key} is not readable: {source}")]
    Unreadable {
        bucket: String,
        key: String,
        #[source]
        source: std::io::Error,
    },
    #[error("object storage unavailable: {0}")]
    Unavailable(String),
}
