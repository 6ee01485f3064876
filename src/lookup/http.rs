//! HTTP transport for the lookup service.
//!
//! Requires the `http` feature. Every request, whatever its method or path,
//! is converted to an [`ApiRequest`] and handed to
//! [`LookupService::handle`]; routing and 404s stay inside the service.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use book_catalog::lookup::{self, LookupService};
//! use book_catalog::store::InMemoryBookStore;
//!
//! let service = Arc::new(LookupService::new(InMemoryBookStore::new()));
//!
//! // Compose with other axum routes
//! let app = lookup::router(service.clone());
//!
//! // Or serve directly until Ctrl+C
//! lookup::serve(service, "0.0.0.0:8080", async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tokio::net::TcpListener;

use crate::store::BookStore;

use super::{ApiRequest, ApiResponse, LookupService};

/// Build an axum `Router` that forwards every request to the service.
pub fn router<S: BookStore + 'static>(service: Arc<LookupService<S>>) -> Router {
    Router::new().fallback(forward::<S>).with_state(service)
}

/// Bind `addr` and serve until `shutdown` resolves.
pub async fn serve<S, F>(
    service: Arc<LookupService<S>>,
    addr: &str,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    S: BookStore + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await?;
    serve_listener(service, listener, shutdown).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
pub async fn serve_listener<S, F>(
    service: Arc<LookupService<S>>,
    listener: TcpListener,
    shutdown: F,
) -> Result<(), std::io::Error>
where
    S: BookStore + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    tracing::info!(addr = %listener.local_addr()?, "lookup API listening");
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn forward<S: BookStore + 'static>(
    State(service): State<Arc<LookupService<S>>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = to_api_request(&method, &uri, &headers, body);
    let response = service.handle(&request).await;
    from_api_response(response)
}

fn to_api_request(method: &Method, uri: &Uri, headers: &HeaderMap, body: Bytes) -> ApiRequest {
    let mut request = ApiRequest::new(method.as_str(), uri.path());
    request.headers = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect::<HashMap<_, _>>();

    if !body.is_empty() {
        request = match String::from_utf8(body.to_vec()) {
            Ok(text) => request.with_body(text),
            Err(_) => request.with_base64_body(&body),
        };
    }
    request
}

fn from_api_response(response: ApiResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

    let body = if response.is_base64_encoded {
        match BASE64.decode(&response.body) {
            Ok(bytes) => Body::from(bytes),
            Err(err) => {
                tracing::error!(error = %err, "response body is not valid base64");
                return StatusCode::INTERNAL_SERVER_ERROR.into_response();
            }
        }
    } else {
        Body::from(response.body)
    };

    let mut out = (status, body).into_response();
    for (name, value) in &response.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            out.headers_mut().insert(name, value);
        }
    }
    out
}
