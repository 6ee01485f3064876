use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::LookupError;

/// Path of the single-record lookup.
pub const BOOK_PATH: &str = "/book";
/// Path of the batch lookup.
pub const BOOKS_PATH: &str = "/books";

/// Inbound request in the load-balancer event shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    pub http_method: String,
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

/// Which operation a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Book,
    Books,
    Unmatched,
}

impl ApiRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            http_method: method.into(),
            path: path.into(),
            ..Self::default()
        }
    }

    /// `POST` with `payload` serialized and base64-encoded, the way the load
    /// balancer forwards bodies.
    pub fn post_json(path: impl Into<String>, payload: &Value) -> Self {
        Self::new("POST", path).with_base64_body(payload.to_string().as_bytes())
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_bearer(self, token: &str) -> Self {
        self.with_header("Authorization", format!("Bearer {token}"))
    }

    /// Plain-text body.
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self.is_base64_encoded = false;
        self
    }

    pub fn with_base64_body(mut self, bytes: &[u8]) -> Self {
        self.body = Some(BASE64.encode(bytes));
        self.is_base64_encoded = true;
        self
    }

    /// Header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn route(&self) -> Route {
        match (self.http_method.as_str(), self.path.as_str()) {
            ("POST", BOOK_PATH) => Route::Book,
            ("POST", BOOKS_PATH) => Route::Books,
            _ => Route::Unmatched,
        }
    }

    /// Decode the body to JSON. An absent or blank body reads as `null`.
    pub fn json_body(&self) -> Result<Value, LookupError> {
        let raw = match self.body.as_deref() {
            None => return Ok(Value::Null),
            Some(raw) if raw.trim().is_empty() => return Ok(Value::Null),
            Some(raw) => raw,
        };

        let bytes = if self.is_base64_encoded {
            BASE64
                .decode(raw.trim())
                .map_err(|e| LookupError::MalformedBody(format!("base64: {e}")))?
        } else {
            raw.as_bytes().to_vec()
        };

        let text = std::str::from_utf8(&bytes)
            .map_err(|e| LookupError::MalformedBody(format!("utf-8: {e}")))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(text).map_err(|e| LookupError::MalformedBody(format!("json: {e}")))
    }
}
