//! Key-set fetching and caching against a live JWKS endpoint.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use book_catalog::auth::{AuthConfig, AuthError, JwtVerifier, KeySource};
use serde_json::{json, Value};

use crate::support::{self, claims, now, sign, AUDIENCE, ISSUER, KID, SECRET};

#[derive(Clone)]
struct JwksServer {
    keys: Arc<Mutex<Vec<Value>>>,
    hits: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl JwksServer {
    fn rotate_in(&self, key: Value) {
        self.keys.lock().unwrap().push(key);
    }

    fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

async fn serve_jwks(State(server): State<JwksServer>) -> Response {
    server.hits.fetch_add(1, Ordering::SeqCst);
    if server.failing.load(Ordering::SeqCst) {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    let keys = server.keys.lock().unwrap().clone();
    Json(json!({ "keys": keys })).into_response()
}

/// Bind to port 0 and return the JWKS URL.
async fn start_jwks() -> (JwksServer, String) {
    let server = JwksServer {
        keys: Arc::new(Mutex::new(vec![support::jwk(KID, SECRET)])),
        hits: Arc::new(AtomicUsize::new(0)),
        failing: Arc::new(AtomicBool::new(false)),
    };
    let app = Router::new()
        .route("/.well-known/jwks.json", get(serve_jwks))
        .with_state(server.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (server, format!("http://{addr}/.well-known/jwks.json"))
}

fn verifier(url: String, tune: impl FnOnce(&mut AuthConfig)) -> JwtVerifier {
    let mut config = AuthConfig::new(ISSUER, AUDIENCE, KeySource::Jwks(url));
    tune(&mut config);
    JwtVerifier::new(config)
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

#[tokio::test]
async fn key_set_is_fetched_lazily_and_cached() {
    let (server, url) = start_jwks().await;
    let verifier = verifier(url, |_| {});
    assert_eq!(server.hits(), 0);

    for _ in 0..3 {
        let token = support::valid_token();
        verifier.verify(Some(&bearer(&token))).await.unwrap();
    }
    assert_eq!(server.hits(), 1);
    assert_eq!(verifier.jwks_fetches(), 1);
}

#[tokio::test]
async fn expired_cache_is_refreshed() {
    let (server, url) = start_jwks().await;
    let verifier = verifier(url, |c| {
        c.jwks_cache_ttl = Duration::ZERO;
        c.min_refresh_interval = Duration::ZERO;
    });

    verifier.verify(Some(&bearer(&support::valid_token()))).await.unwrap();
    verifier.verify(Some(&bearer(&support::valid_token()))).await.unwrap();
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn rotated_key_triggers_refresh() {
    let (server, url) = start_jwks().await;
    let verifier = verifier(url, |c| c.min_refresh_interval = Duration::ZERO);

    verifier.verify(Some(&bearer(&support::valid_token()))).await.unwrap();

    server.rotate_in(support::jwk("rotated", b"next-secret"));
    let token = sign(&claims(now() + 600), "rotated", b"next-secret");
    verifier.verify(Some(&bearer(&token))).await.unwrap();
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn unknown_kids_do_not_hammer_the_endpoint() {
    let (server, url) = start_jwks().await;
    let verifier = verifier(url, |c| c.min_refresh_interval = Duration::from_secs(60));

    verifier.verify(Some(&bearer(&support::valid_token()))).await.unwrap();
    for i in 0..5 {
        let token = sign(&claims(now() + 600), &format!("bogus-{i}"), SECRET);
        let result = verifier.verify(Some(&bearer(&token))).await;
        assert!(matches!(result, Err(AuthError::UnknownKey(_))));
    }
    assert_eq!(server.hits(), 1);
}

#[tokio::test]
async fn failing_endpoint_falls_back_to_cached_keys() {
    let (server, url) = start_jwks().await;
    let verifier = verifier(url, |c| {
        c.jwks_cache_ttl = Duration::ZERO;
        c.min_refresh_interval = Duration::ZERO;
    });
    verifier.verify(Some(&bearer(&support::valid_token()))).await.unwrap();

    server.fail();
    verifier.verify(Some(&bearer(&support::valid_token()))).await.unwrap();
    assert_eq!(server.hits(), 2);
}

#[tokio::test]
async fn failed_refresh_waits_out_the_refresh_interval() {
    let (server, url) = start_jwks().await;
    let verifier = verifier(url, |c| {
        c.jwks_cache_ttl = Duration::from_millis(50);
        c.min_refresh_interval = Duration::from_millis(500);
    });
    verifier.verify(Some(&bearer(&support::valid_token()))).await.unwrap();

    tokio::time::sleep(Duration::from_millis(600)).await;
    server.fail();
    for _ in 0..5 {
        verifier.verify(Some(&bearer(&support::valid_token()))).await.unwrap();
    }
    // One failed attempt, then the stale keys are served without refetching.
    assert_eq!(server.hits(), 2);
    assert_eq!(verifier.jwks_fetches(), 2);
}
