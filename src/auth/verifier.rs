//! JWT verification against a cached key set.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::jwk::{Jwk, JwkSet, KeyAlgorithm};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use super::{AuthError, Identity};

/// Algorithms a token may be signed with. The key's family must also match.
const ACCEPTED_ALGORITHMS: [Algorithm; 11] = [
    Algorithm::RS256,
    Algorithm::RS384,
    Algorithm::RS512,
    Algorithm::PS256,
    Algorithm::PS384,
    Algorithm::PS512,
    Algorithm::ES256,
    Algorithm::ES384,
    Algorithm::HS256,
    Algorithm::HS384,
    Algorithm::HS512,
];

/// Where verification keys come from.
#[derive(Debug, Clone)]
pub enum KeySource {
    /// Fetch from a JWKS URI and cache.
    Jwks(String),
    /// Fixed key set, never refreshed.
    Static(JwkSet),
}

/// Trusted issuer, audience and key material.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub issuer: String,
    pub audience: String,
    pub key_source: KeySource,
    /// Age after which a cached key set is refetched before use.
    pub jwks_cache_ttl: Duration,
    /// Minimum spacing between key-set fetch attempts, failed ones included.
    pub min_refresh_interval: Duration,
    /// Clock skew tolerated on `exp` / `nbf`.
    pub leeway: Duration,
    /// Bound on the key-set HTTP request.
    pub http_timeout: Duration,
}

impl AuthConfig {
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>, key_source: KeySource) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            key_source,
            jwks_cache_ttl: Duration::from_secs(300),
            min_refresh_interval: Duration::from_secs(10),
            leeway: Duration::from_secs(60),
            http_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone)]
struct CachedJwks {
    set: Arc<JwkSet>,
    fetched_at: Instant,
    /// Last fetch attempt, successful or not.
    attempted_at: Instant,
}

impl CachedJwks {
    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Bearer-token verifier.
///
/// The key set is fetched lazily on first use and shared by every request
/// the verifier serves; build one per process and hand out `Arc`s.
#[derive(Debug)]
pub struct JwtVerifier {
    config: AuthConfig,
    jwks_cache: RwLock<Option<CachedJwks>>,
    http: reqwest::Client,
    fetches: AtomicUsize,
}

impl JwtVerifier {
    pub fn new(config: AuthConfig) -> Self {
        let http = match reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
        {
            Ok(client) => client,
            Err(err) => {
                tracing::warn!(error = %err, "failed to configure key-set HTTP client; using defaults");
                reqwest::Client::new()
            }
        };

        Self {
            config,
            jwks_cache: RwLock::new(None),
            http,
            fetches: AtomicUsize::new(0),
        }
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Number of key-set fetches performed so far.
    pub fn jwks_fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Verify the raw `Authorization` header value.
    pub async fn verify(&self, authorization: Option<&str>) -> Result<Identity, AuthError> {
        let header = authorization.ok_or(AuthError::MissingHeader)?;
        let token = bearer_token(header)?;
        let claims = self.decode_claims(token).await?;
        Ok(Identity::new(claims))
    }

    async fn decode_claims(&self, token: &str) -> Result<Map<String, Value>, AuthError> {
        let header = decode_header(token).map_err(|e| AuthError::InvalidToken(e.to_string()))?;
        if !ACCEPTED_ALGORITHMS.contains(&header.alg) {
            return Err(AuthError::DisallowedAlgorithm(format!("{:?}", header.alg)));
        }

        let jwk = self
            .find_key(header.kid.as_deref())
            .await?
            .ok_or_else(|| AuthError::UnknownKey(header.kid.clone()))?;

        // A key pinned to one algorithm must not verify tokens signed with another.
        if let Some(key_alg) = jwk.common.key_algorithm {
            if signing_algorithm(key_alg) != Some(header.alg) {
                return Err(AuthError::DisallowedAlgorithm(format!("{:?}", header.alg)));
            }
        }

        let key = DecodingKey::from_jwk(&jwk).map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        decode::<Map<String, Value>>(token, &key, &self.validation_for(header.alg))
            .map(|data| data.claims)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    fn validation_for(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        validation.leeway = self.config.leeway.as_secs();
        validation.set_audience(&[self.config.audience.as_str()]);
        validation.set_issuer(&[self.config.issuer.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation
    }

    async fn find_key(&self, kid: Option<&str>) -> Result<Option<Jwk>, AuthError> {
        let url = match &self.config.key_source {
            KeySource::Static(set) => return Ok(select_key(set, kid)),
            KeySource::Jwks(url) => url,
        };

        // Fast path: fresh cache that knows the key.
        if let Some(set) = self.cached_set().await {
            if let Some(jwk) = select_key(&set, kid) {
                return Ok(Some(jwk));
            }
        }

        // Slow path: stale, empty, or the key rotated in.
        let set = self.refresh_jwks(url).await?;
        Ok(select_key(&set, kid))
    }

    async fn cached_set(&self) -> Option<Arc<JwkSet>> {
        let cache = self.jwks_cache.read().await;
        match cache.as_ref() {
            Some(cached) if cached.is_fresh(self.config.jwks_cache_ttl) => {
                Some(Arc::clone(&cached.set))
            }
            _ => None,
        }
    }

    async fn refresh_jwks(&self, url: &str) -> Result<Arc<JwkSet>, AuthError> {
        let mut cache = self.jwks_cache.write().await;

        if let Some(cached) = cache.as_ref() {
            if cached.attempted_at.elapsed() < self.config.min_refresh_interval {
                return Ok(Arc::clone(&cached.set));
            }
        }

        self.fetches.fetch_add(1, Ordering::SeqCst);
        match self.fetch_jwks(url).await {
            Ok(set) => {
                tracing::debug!(url, keys = set.keys.len(), "refreshed key set");
                let set = Arc::new(set);
                let now = Instant::now();
                *cache = Some(CachedJwks {
                    set: Arc::clone(&set),
                    fetched_at: now,
                    attempted_at: now,
                });
                Ok(set)
            }
            Err(err) => match cache.as_mut() {
                Some(stale) => {
                    stale.attempted_at = Instant::now();
                    tracing::warn!(url, error = %err, "key set refresh failed; using cached keys");
                    Ok(Arc::clone(&stale.set))
                }
                None => Err(err),
            },
        }
    }

    async fn fetch_jwks(&self, url: &str) -> Result<JwkSet, AuthError> {
        self.http
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?
            .error_for_status()
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))?
            .json::<JwkSet>()
            .await
            .map_err(|e| AuthError::KeySetUnavailable(e.to_string()))
    }
}

/// Extract the token from `Bearer <token>`.
fn bearer_token(header: &str) -> Result<&str, AuthError> {
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::MalformedHeader),
    }
}

/// The signature algorithm a JWK `alg` names. Encryption algorithms map to
/// `None` and never verify a token.
fn signing_algorithm(key_alg: KeyAlgorithm) -> Option<Algorithm> {
    match key_alg {
        KeyAlgorithm::HS256 => Some(Algorithm::HS256),
        KeyAlgorithm::HS384 => Some(Algorithm::HS384),
        KeyAlgorithm::HS512 => Some(Algorithm::HS512),
        KeyAlgorithm::ES256 => Some(Algorithm::ES256),
        KeyAlgorithm::ES384 => Some(Algorithm::ES384),
        KeyAlgorithm::RS256 => Some(Algorithm::RS256),
        KeyAlgorithm::RS384 => Some(Algorithm::RS384),
        KeyAlgorithm::RS512 => Some(Algorithm::RS512),
        KeyAlgorithm::PS256 => Some(Algorithm::PS256),
        KeyAlgorithm::PS384 => Some(Algorithm::PS384),
        KeyAlgorithm::PS512 => Some(Algorithm::PS512),
        KeyAlgorithm::EdDSA => Some(Algorithm::EdDSA),
        _ => None,
    }
}

/// Pick the key named by `kid`, or the only key when the token names none.
fn select_key(set: &JwkSet, kid: Option<&str>) -> Option<Jwk> {
    match kid {
        Some(kid) => set.find(kid).cloned(),
        None if set.keys.len() == 1 => set.keys.first().cloned(),
        None => None,
    }
}
