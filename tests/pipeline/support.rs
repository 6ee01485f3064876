//! Shared fixtures: a static signing key, token minting and polling helpers.

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use book_catalog::auth::{AuthConfig, JwtVerifier, KeySource};
use jsonwebtoken::jwk::JwkSet;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};

pub const ISSUER: &str = "https://issuer.test/";
pub const AUDIENCE: &str = "book-api";
pub const KID: &str = "test-key";
pub const SECRET: &[u8] = b"pipeline-secret";

pub fn jwk(kid: &str, secret: &[u8]) -> Value {
    use base64::Engine;
    json!({
        "kty": "oct",
        "kid": kid,
        "alg": "HS256",
        "k": base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(secret),
    })
}

pub fn key_set() -> JwkSet {
    serde_json::from_value(json!({ "keys": [jwk(KID, SECRET)] })).unwrap()
}

pub fn static_auth() -> AuthConfig {
    AuthConfig::new(ISSUER, AUDIENCE, KeySource::Static(key_set()))
}

pub fn static_verifier() -> Arc<JwtVerifier> {
    Arc::new(JwtVerifier::new(static_auth()))
}

pub fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

pub fn claims(exp: i64) -> Value {
    json!({ "sub": "reader", "iss": ISSUER, "aud": AUDIENCE, "exp": exp })
}

pub fn sign(claims: &Value, kid: &str, secret: &[u8]) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(secret)).unwrap()
}

pub fn valid_token() -> String {
    sign(&claims(now() + 600), KID, SECRET)
}

pub fn expired_token() -> String {
    sign(&claims(now() - 3600), KID, SECRET)
}

/// Poll `condition` until it holds or `timeout` passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}
