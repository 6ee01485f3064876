//! Credential verification for the lookup API.
//!
//! Requests carry `Authorization: Bearer <jwt>`. [`JwtVerifier`] checks the
//! signature against a key set (fetched from a JWKS endpoint and cached, or
//! supplied statically), then the issuer, audience and expiry.

mod error;
mod identity;
mod verifier;

pub use error::AuthError;
pub use identity::Identity;
pub use verifier::{AuthConfig, JwtVerifier, KeySource};
