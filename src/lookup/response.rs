use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::LookupError;

/// Outbound response in the load-balancer event shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub status_description: String,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

impl ApiResponse {
    /// JSON response with the given status.
    pub fn json(status_code: u16, body: &Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self {
            status_code,
            status_description: status_description(status_code),
            headers,
            body: body.to_string(),
            is_base64_encoded: false,
        }
    }

    pub fn ok(body: &Value) -> Self {
        Self::json(200, body)
    }

    /// `{"message": ...}` body carrying only the public message.
    pub fn from_error(err: &LookupError) -> Self {
        let mut response = Self::json(err.status_code(), &json!({ "message": err.public_message() }));
        if matches!(err, LookupError::Unauthenticated(_)) {
            response
                .headers
                .insert("www-authenticate".to_string(), "Bearer".to_string());
        }
        response
    }

    /// Parse the body back to JSON.
    pub fn body_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.body)
    }
}

fn status_description(status_code: u16) -> String {
    let reason = match status_code {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "",
    };
    format!("{status_code} {reason}").trim_end().to_string()
}
