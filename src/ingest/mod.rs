//! Ingestion pipeline - uploaded objects into the book table.
//!
//! ```text
//! file in bucket ── BucketWatcher ──► queue message
//!   │ notifications_from_payload      Parsing
//!   ▼
//! [IngestionNotification]  (sequential, first failure aborts)
//!   │ ObjectStore::get_object         Fetching
//!   │ decode_books                    Transforming
//!   │ batch_write × ⌈n/25⌉            Writing
//!   ▼
//! ack ── or ── nack ──► redelivered ──► … ──► dead-lettered
//! ```

mod consumer;
mod error;
mod notification;
mod watcher;
mod worker;

pub use consumer::{ConsumerHandle, ConsumerStats, Outcome, QueueConsumer};
pub use error::{IngestError, ParseError, Stage, WriteError};
pub use notification::{notifications_from_payload, IngestionNotification};
pub use watcher::{BucketWatcher, WatcherHandle, WatcherStats};
pub use worker::{write_books, IngestReport, IngestionWorker, DEFAULT_MAX_UNPROCESSED_RETRIES};
