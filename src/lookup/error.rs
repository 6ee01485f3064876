use thiserror::Error;

use crate::auth::AuthError;
use crate::store::StoreError;

/// Failure of a lookup request. The caller only ever sees
/// [`public_message`](LookupError::public_message); the detail is logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(#[from] AuthError),
    #[error("request is missing lookup criteria")]
    MissingCriteria,
    #[error("not found")]
    NotFound,
    #[error("malformed request body: {0}")]
    MalformedBody(String),
    #[error("store call failed: {0}")]
    Store(#[from] StoreError),
}

impl LookupError {
    /// Map this error to an HTTP status code.
    pub fn status_code(&self) -> u16 {
        match self {
            LookupError::Unauthenticated(_) => 401,
            LookupError::MissingCriteria => 404,
            LookupError::NotFound => 404,
            LookupError::MalformedBody(_) => 400,
            LookupError::Store(_) => 500,
        }
    }

    pub fn public_message(&self) -> &'static str {
        match self {
            LookupError::Unauthenticated(_) => "Unauthorized",
            LookupError::MissingCriteria => "Missing criteria",
            LookupError::NotFound => "Not Found",
            LookupError::MalformedBody(_) => "Malformed request",
            LookupError::Store(_) => "Internal Server Error",
        }
    }
}
