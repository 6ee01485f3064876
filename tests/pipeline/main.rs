//! Pipeline integration tests: ingestion through the queue, lookups through
//! the verifier, and the HTTP transport.

mod support;
mod auth_gate;
mod dead_letter;
mod end_to_end;
mod jwks;

#[cfg(feature = "http")]
mod http;
