//! Lookup API - authenticated single and batch reads of the book table.
//!
//! ```text
//! ApiRequest ──► verify bearer (optional) ──► route
//!                                              ├─ POST /book  ──► get
//!                                              ├─ POST /books ──► batch_get × ⌈n/100⌉
//!                                              └─ otherwise   ──► 404
//! ```
//!
//! | Outcome                  | Status | Body                                  |
//! |--------------------------|--------|---------------------------------------|
//! | record found             | 200    | `{"book": {...}}` / `{"books": [..]}` |
//! | bad or missing token     | 401    | `{"message": "Unauthorized"}`         |
//! | no key in request        | 404    | `{"message": "Missing criteria"}`     |
//! | unknown route / no match | 404    | `{"message": "Not Found"}`            |
//! | undecodable body         | 400    | `{"message": "Malformed request"}`    |
//! | store failure            | 500    | `{"message": "Internal Server Error"}`|

mod error;
mod request;
mod response;
mod service;

#[cfg(feature = "http")]
mod http;

pub use error::LookupError;
pub use request::{ApiRequest, Route, BOOKS_PATH, BOOK_PATH};
pub use response::ApiResponse;
pub use service::{LookupService, DEFAULT_MAX_UNPROCESSED_RETRIES};

#[cfg(feature = "http")]
pub use http::{router, serve, serve_listener};
