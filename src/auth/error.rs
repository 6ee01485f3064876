use thiserror::Error;

/// Why a credential was refused. Every variant maps to 401; the detail is for
/// logs only.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("authorization header missing")]
    MissingHeader,
    #[error("authorization header is not a bearer token")]
    MalformedHeader,
    #[error("token rejected: {0}")]
    InvalidToken(String),
    #[error("no key matches token key id {0:?}")]
    UnknownKey(Option<String>),
    #[error("signing algorithm {0} not accepted")]
    DisallowedAlgorithm(String),
    #[error("key set unavailable: {0}")]
    KeySetUnavailable(String),
}
