use crate::book::{decode_books, Book};
use crate::bus::Event;
use crate::object::{FetchError, ObjectStore};
use crate::partition::partition_owned;
use crate::store::{BookStore, WriteRequest, MAX_BATCH_WRITE_ITEMS};

use super::{notifications_from_payload, IngestError, IngestionNotification, Stage, WriteError};

/// Default number of extra batch-write calls spent on unprocessed items.
pub const DEFAULT_MAX_UNPROCESSED_RETRIES: usize = 3;

/// What one successful message (or notification) amounted to.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IngestReport {
    pub objects: usize,
    pub records: usize,
    /// Batch-write calls issued, retries included.
    pub write_calls: usize,
}

impl IngestReport {
    fn absorb(&mut self, other: IngestReport) {
        self.objects += other.objects;
        self.records += other.records;
        self.write_calls += other.write_calls;
    }
}

/// Fetch → transform → write for every notification in a message.
///
/// Notifications are processed one after another and the first failure
/// aborts the message, so the queue can redeliver it whole. Records already
/// written by a failed attempt are simply overwritten on the next one.
pub struct IngestionWorker<O, S> {
    objects: O,
    store: S,
    max_unprocessed_retries: usize,
}

impl<O: ObjectStore, S: BookStore> IngestionWorker<O, S> {
    pub fn new(objects: O, store: S) -> Self {
        Self {
            objects,
            store,
            max_unprocessed_retries: DEFAULT_MAX_UNPROCESSED_RETRIES,
        }
    }

    pub fn with_max_unprocessed_retries(mut self, retries: usize) -> Self {
        self.max_unprocessed_retries = retries;
        self
    }

    pub fn objects(&self) -> &O {
        &self.objects
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Process one queue message.
    pub fn process_message(&self, event: &Event) -> Result<IngestReport, IngestError> {
        let span = tracing::info_span!(
            "ingest",
            message_id = %event.id,
            receive_count = event.receive_count,
        );
        let _enter = span.enter();

        tracing::debug!(stage = %Stage::Received, bytes = event.payload.len(), "message received");
        let notifications = notifications_from_payload(&event.payload)?;
        if notifications.is_empty() {
            tracing::debug!("message carries no notifications");
        }

        let mut report = IngestReport::default();
        for notification in &notifications {
            report.absorb(self.process_notification(notification)?);
        }

        tracing::info!(
            objects = report.objects,
            records = report.records,
            write_calls = report.write_calls,
            "message ingested"
        );
        Ok(report)
    }

    /// Ingest a single object.
    pub fn process_notification(
        &self,
        notification: &IngestionNotification,
    ) -> Result<IngestReport, IngestError> {
        let IngestionNotification { bucket, object_key } = notification;

        let bytes = self.fetch(bucket, object_key)?;
        let books = decode_books(&bytes).map_err(|source| IngestError::Transform {
            bucket: bucket.clone(),
            key: object_key.clone(),
            source,
        })?;

        let records = books.len();
        let write_calls = write_books(&self.store, books, self.max_unprocessed_retries).map_err(
            |source| IngestError::Write {
                bucket: bucket.clone(),
                key: object_key.clone(),
                source,
            },
        )?;

        tracing::debug!(bucket = %bucket, key = %object_key, records, write_calls, "object loaded");
        Ok(IngestReport {
            objects: 1,
            records,
            write_calls,
        })
    }

    fn fetch(&self, bucket: &str, key: &str) -> Result<Vec<u8>, FetchError> {
        self.objects
            .get_object(bucket, key)?
            .collect()
            .map_err(|source| FetchError::Unreadable {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source,
            })
    }
}

/// Put `books` in batches of at most [`MAX_BATCH_WRITE_ITEMS`].
///
/// Items the store reports as unprocessed are resubmitted, up to
/// `max_unprocessed_retries` extra calls per batch. Returns the number of
/// calls made.
pub fn write_books<S: BookStore + ?Sized>(
    store: &S,
    books: Vec<Book>,
    max_unprocessed_retries: usize,
) -> Result<usize, WriteError> {
    let requests: Vec<WriteRequest> = books.into_iter().map(WriteRequest::Put).collect();
    let mut calls = 0;

    for batch in partition_owned(requests, MAX_BATCH_WRITE_ITEMS) {
        let mut pending = batch;
        let mut retries = 0;
        loop {
            calls += 1;
            let out = store.batch_write(pending)?;
            if out.is_complete() {
                break;
            }
            if retries == max_unprocessed_retries {
                return Err(WriteError::Unprocessed {
                    remaining: out.unprocessed.len(),
                    retries,
                });
            }
            retries += 1;
            tracing::debug!(
                unprocessed = out.unprocessed.len(),
                attempt = retries,
                "retrying unprocessed writes"
            );
            pending = out.unprocessed;
        }
    }

    Ok(calls)
}
