use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::Instrument;

use crate::auth::JwtVerifier;
use crate::book::{Book, BookKey, Isbn};
use crate::partition::partition;
use crate::store::{BookStore, StoreError, MAX_BATCH_GET_KEYS};

use super::{ApiRequest, ApiResponse, LookupError, Route};

/// Default number of extra batch-get calls spent on unprocessed keys.
pub const DEFAULT_MAX_UNPROCESSED_RETRIES: usize = 3;

/// Authenticated single and batch reads over a [`BookStore`].
///
/// With a verifier attached, every request must carry a valid bearer token
/// before it is routed; without one the service is open.
pub struct LookupService<S> {
    store: S,
    verifier: Option<Arc<JwtVerifier>>,
    max_unprocessed_retries: usize,
}

impl<S: BookStore> LookupService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            verifier: None,
            max_unprocessed_retries: DEFAULT_MAX_UNPROCESSED_RETRIES,
        }
    }

    pub fn with_verifier(mut self, verifier: Arc<JwtVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn with_max_unprocessed_retries(mut self, retries: usize) -> Self {
        self.max_unprocessed_retries = retries;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_authenticated(&self) -> bool {
        self.verifier.is_some()
    }

    /// Handle one request. Never fails: errors become their HTTP response.
    pub async fn handle(&self, request: &ApiRequest) -> ApiResponse {
        let span = tracing::info_span!(
            "lookup",
            method = %request.http_method,
            path = %request.path,
        );

        async {
            match self.dispatch(request).await {
                Ok(body) => ApiResponse::ok(&body),
                Err(err) => {
                    match &err {
                        LookupError::Store(_) => tracing::error!(error = %err, "lookup failed"),
                        LookupError::Unauthenticated(_) => {
                            tracing::info!(error = %err, "request rejected")
                        }
                        _ => tracing::debug!(error = %err, "lookup refused"),
                    }
                    ApiResponse::from_error(&err)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn dispatch(&self, request: &ApiRequest) -> Result<Value, LookupError> {
        if let Some(verifier) = &self.verifier {
            let identity = verifier.verify(request.header("authorization")).await?;
            tracing::debug!(subject = identity.subject().unwrap_or("-"), "caller verified");
        }

        match request.route() {
            Route::Book => {
                let isbn = single_key(&request.json_body()?)?;
                let book = self.lookup_one(isbn)?;
                Ok(json!({ "book": book }))
            }
            Route::Books => {
                let keys = batch_keys(request.json_body()?)?;
                let books = self.lookup_many(keys)?;
                Ok(json!({ "books": books }))
            }
            Route::Unmatched => Err(LookupError::NotFound),
        }
    }

    /// Read one record. Absence is [`LookupError::NotFound`].
    pub fn lookup_one(&self, isbn: Isbn) -> Result<Book, LookupError> {
        self.store.get(isbn)?.ok_or(LookupError::NotFound)
    }

    /// Read every record named by `keys`, silently omitting misses.
    ///
    /// Duplicate keys are collapsed, then keys are read in chunks of
    /// [`MAX_BATCH_GET_KEYS`], one store call at a time. Keys the store leaves
    /// unprocessed are re-requested up to the configured retry budget.
    pub fn lookup_many(&self, keys: Vec<BookKey>) -> Result<Vec<Book>, LookupError> {
        let keys = dedupe(keys);
        let mut books = Vec::with_capacity(keys.len());

        for chunk in partition(&keys, MAX_BATCH_GET_KEYS) {
            let mut pending = chunk;
            let mut retries = 0;
            loop {
                let out = self.store.batch_get(&pending)?;
                books.extend(out.books);
                if out.unprocessed_keys.is_empty() {
                    break;
                }
                if retries == self.max_unprocessed_retries {
                    return Err(StoreError::Unavailable(format!(
                        "{} keys still unprocessed after {} retries",
                        out.unprocessed_keys.len(),
                        retries
                    ))
                    .into());
                }
                retries += 1;
                tracing::debug!(
                    unprocessed = out.unprocessed_keys.len(),
                    attempt = retries,
                    "retrying unprocessed keys"
                );
                pending = out.unprocessed_keys;
            }
        }

        Ok(books)
    }
}

/// Extract the key of a single lookup from `{"isbn": ...}`.
///
/// Accepts an integer or a numeric string; absent, `null` or `""` means the
/// caller gave no criteria.
fn single_key(body: &Value) -> Result<Isbn, LookupError> {
    let isbn = match body {
        Value::Null => return Err(LookupError::MissingCriteria),
        Value::Object(fields) => fields.get("isbn").unwrap_or(&Value::Null),
        _ => return Err(LookupError::MalformedBody("expected an object".into())),
    };

    match isbn {
        Value::Null => Err(LookupError::MissingCriteria),
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| LookupError::MalformedBody(format!("isbn {n} is not an integer"))),
        Value::String(s) if s.trim().is_empty() => Err(LookupError::MissingCriteria),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| LookupError::MalformedBody(format!("isbn {s:?} is not an integer"))),
        other => Err(LookupError::MalformedBody(format!("isbn {other} is not an integer"))),
    }
}

/// Extract batch keys from `[{"isbn": ..}, ..]` or `{"keys": [..]}`.
fn batch_keys(body: Value) -> Result<Vec<BookKey>, LookupError> {
    let items = match body {
        Value::Null => return Err(LookupError::MissingCriteria),
        Value::Array(items) => items,
        Value::Object(mut fields) => match fields.remove("keys") {
            None | Some(Value::Null) => return Err(LookupError::MissingCriteria),
            Some(Value::Array(items)) => items,
            Some(_) => return Err(LookupError::MalformedBody("keys must be a list".into())),
        },
        _ => return Err(LookupError::MalformedBody("expected a list of keys".into())),
    };

    if items.is_empty() {
        return Err(LookupError::MissingCriteria);
    }

    items
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<BookKey>(item)
                .map_err(|e| LookupError::MalformedBody(format!("key {index}: {e}")))
        })
        .collect()
}

/// Drop repeated keys, keeping first occurrences in order.
fn dedupe(keys: Vec<BookKey>) -> Vec<BookKey> {
    let mut seen = HashSet::with_capacity(keys.len());
    keys.into_iter().filter(|key| seen.insert(*key)).collect()
}
