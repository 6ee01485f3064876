//! Normalization of trigger payloads into [`IngestionNotification`]s.
//!
//! Accepted shapes:
//!
//! ```text
//! {"bucket": "data", "objectKey": "books.json"}                 flat trigger
//! {"Records": [{"eventName": "ObjectCreated:Put",
//!               "s3": {"bucket": {"name": ..}, "object": {"key": ..}}}]}
//! {"Records": [{"messageId": .., "body": "<either shape above>"}]}
//! {"Event": "s3:TestEvent", ..}                                 no-op
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bus::{Event, PublishError};

use super::IngestError;

/// One object awaiting ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestionNotification {
    pub bucket: String,
    pub object_key: String,
}

impl IngestionNotification {
    pub fn new(bucket: impl Into<String>, object_key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            object_key: object_key.into(),
        }
    }

    /// The S3 event envelope announcing this object, as object storage
    /// would deliver it to the queue.
    pub fn to_s3_event(&self) -> Value {
        serde_json::json!({
            "Records": [{
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": self.bucket },
                    "object": { "key": encode_object_key(&self.object_key) },
                },
            }]
        })
    }

    /// Queue message `id` carrying [`to_s3_event`](Self::to_s3_event), with
    /// `bucket` and `key` headers.
    pub fn to_event(&self, id: impl Into<String>) -> Result<Event, PublishError> {
        Ok(Event::json(id, "ObjectCreated:Put", &self.to_s3_event())?
            .with_metadata("bucket", self.bucket.as_str())
            .with_metadata("key", self.object_key.as_str()))
    }
}

#[derive(Deserialize)]
struct S3Record {
    #[serde(rename = "eventName", default)]
    event_name: Option<String>,
    s3: S3Entity,
}

#[derive(Deserialize)]
struct S3Entity {
    bucket: S3Bucket,
    object: S3Object,
}

#[derive(Deserialize)]
struct S3Bucket {
    name: String,
}

#[derive(Deserialize)]
struct S3Object {
    key: String,
}

/// Extract every notification carried by a message payload, in order.
///
/// Zero notifications is a valid result (test events, removal events).
pub fn notifications_from_payload(payload: &[u8]) -> Result<Vec<IngestionNotification>, IngestError> {
    let value: Value = serde_json::from_slice(payload)
        .map_err(|e| IngestError::Envelope(format!("not JSON: {e}")))?;

    let mut out = Vec::new();
    collect(value, &mut out)?;
    Ok(out)
}

fn collect(value: Value, out: &mut Vec<IngestionNotification>) -> Result<(), IngestError> {
    let Value::Object(mut fields) = value else {
        return Err(IngestError::Envelope("expected a JSON object".into()));
    };

    if fields.get("Event").and_then(Value::as_str) == Some("s3:TestEvent") {
        tracing::debug!("ignoring s3:TestEvent");
        return Ok(());
    }

    if let Some(records) = fields.remove("Records") {
        let Value::Array(records) = records else {
            return Err(IngestError::Envelope("Records is not a list".into()));
        };
        for record in records {
            collect_record(record, out)?;
        }
        return Ok(());
    }

    if fields.contains_key("bucket") && fields.contains_key("objectKey") {
        let flat: IngestionNotification = serde_json::from_value(Value::Object(fields))
            .map_err(|e| IngestError::Envelope(format!("flat notification: {e}")))?;
        out.push(flat);
        return Ok(());
    }

    Err(IngestError::Envelope("unrecognized payload shape".into()))
}

fn collect_record(record: Value, out: &mut Vec<IngestionNotification>) -> Result<(), IngestError> {
    // Queue record wrapping another envelope in its body.
    if let Some(body) = record.get("body").and_then(Value::as_str) {
        let inner: Value = serde_json::from_str(body)
            .map_err(|e| IngestError::Envelope(format!("queue record body: {e}")))?;
        return collect(inner, out);
    }

    let record: S3Record = serde_json::from_value(record)
        .map_err(|e| IngestError::Envelope(format!("S3 record: {e}")))?;

    if let Some(name) = record.event_name.as_deref() {
        if !name.starts_with("ObjectCreated") {
            tracing::debug!(event_name = name, "skipping non-creation event");
            return Ok(());
        }
    }

    out.push(IngestionNotification {
        bucket: record.s3.bucket.name,
        object_key: decode_object_key(&record.s3.object.key)?,
    });
    Ok(())
}

/// S3 notifications form-encode object keys: `+` is a space.
fn decode_object_key(raw: &str) -> Result<String, IngestError> {
    urlencoding::decode(&raw.replace('+', " "))
        .map(|key| key.into_owned())
        .map_err(|e| IngestError::Envelope(format!("object key {raw:?}: {e}")))
}

fn encode_object_key(key: &str) -> String {
    key.split('/')
        .map(|segment| urlencoding::encode(segment).replace("%20", "+"))
        .collect::<Vec<_>>()
        .join("/")
}
