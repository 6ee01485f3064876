//! Keyed store - the book table.
//!
//! The lookup service reads through [`BookStore::get`] and
//! [`BookStore::batch_get`]; the ingestion worker writes through
//! [`BookStore::batch_write`]. Batch calls are bounded by the provider limits
//! [`MAX_BATCH_GET_KEYS`] and [`MAX_BATCH_WRITE_ITEMS`]; callers partition
//! larger requests themselves.
//!
//! ```text
//! lookup ──get / batch_get (≤100)──┐
//!                                  ▼
//!                          ┌──────────────┐
//!                          │  BookStore   │  put-by-key, last writer wins
//!                          └──────────────┘
//!                                  ▲
//! ingest ──batch_write (≤25)───────┘
//! ```

mod error;
mod in_memory;
mod store;

pub use error::StoreError;
pub use in_memory::{InMemoryBookStore, StoreCalls};
pub use store::{BatchGetOutput, BatchWriteOutput, BookStore, WriteRequest};

/// Maximum keys a single batch-get call accepts.
pub const MAX_BATCH_GET_KEYS: usize = 100;

/// Maximum put requests a single batch-write call accepts.
pub const MAX_BATCH_WRITE_ITEMS: usize = 25;

/// Default table name.
pub const DEFAULT_TABLE: &str = "books";
