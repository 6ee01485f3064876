use std::fmt;

use thiserror::Error;

use crate::object::FetchError;
use crate::store::StoreError;

/// Steps a queue message passes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Entry state. Nothing can fail here, so no error reports it.
    Received,
    Parsing,
    Fetching,
    Transforming,
    Writing,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Received => "received",
            Stage::Parsing => "parsing",
            Stage::Fetching => "fetching",
            Stage::Transforming => "transforming",
            Stage::Writing => "writing",
        };
        f.write_str(name)
    }
}

/// Uploaded content that is not a JSON array of records.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("content is not UTF-8: {0}")]
    Utf8(String),
    #[error("content is not JSON: {0}")]
    Json(String),
    #[error("content is not a JSON array")]
    NotAnArray,
    #[error("record {index} is invalid: {reason}")]
    InvalidRecord { index: usize, reason: String },
}

/// A write batch the store failed or did not finish.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriteError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{remaining} items still unprocessed after {retries} retries")]
    Unprocessed { remaining: usize, retries: usize },
}

/// Why a message could not be ingested. Any of these fails the whole message.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("message payload is not a recognized notification: {0}")]
    Envelope(String),
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error("s3://{bucket}/{key}: {source}")]
    Transform {
        bucket: String,
        key: String,
        #[source]
        source: ParseError,
    },
    #[error("s3://{bucket}/{key}: write failed: {source}")]
    Write {
        bucket: String,
        key: String,
        #[source]
        source: WriteError,
    },
}

impl IngestError {
    /// The step that failed.
    pub fn stage(&self) -> Stage {
        match self {
            IngestError::Envelope(_) => Stage::Parsing,
            IngestError::Fetch(_) => Stage::Fetching,
            IngestError::Transform { .. } => Stage::Transforming,
            IngestError::Write { .. } => Stage::Writing,
        }
    }
}
