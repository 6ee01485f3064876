//! BookStore - narrow contract over the keyed book table.

use crate::book::{Book, BookKey, Isbn};

use super::StoreError;

/// One item of a batch-write call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteRequest {
    /// Insert or overwrite the record under its key.
    Put(Book),
}

impl WriteRequest {
    pub fn key(&self) -> BookKey {
        match self {
            WriteRequest::Put(book) => book.key(),
        }
    }
}

/// Result of a batch-get call. Missing keys are simply absent from `books`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchGetOutput {
    pub books: Vec<Book>,
    /// Keys the store did not get to in this call; the caller may retry them.
    pub unprocessed_keys: Vec<BookKey>,
}

/// Result of a batch-write call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchWriteOutput {
    /// Requests the store accepted but did not apply in this call.
    pub unprocessed: Vec<WriteRequest>,
}

impl BatchWriteOutput {
    pub fn is_complete(&self) -> bool {
        self.unprocessed.is_empty()
    }
}

/// Abstract keyed storage for books.
///
/// Implementations must apply a put as an overwrite by key, so replaying the
/// same write is a no-op. No ordering or mutual exclusion is promised between
/// concurrent writers.
///
/// Calls are synchronous and made directly from async request handlers, so
/// they must not block; an adapter doing network I/O belongs behind
/// `tokio::task::spawn_blocking`.
pub trait BookStore: Send + Sync {
    /// Name of the collection this store reads and writes.
    fn table(&self) -> &str;

    /// Get one book by key. `Ok(None)` when absent.
    fn get(&self, isbn: Isbn) -> Result<Option<Book>, StoreError>;

    /// Get up to [`MAX_BATCH_GET_KEYS`](super::MAX_BATCH_GET_KEYS) books.
    fn batch_get(&self, keys: &[BookKey]) -> Result<BatchGetOutput, StoreError>;

    /// Apply up to [`MAX_BATCH_WRITE_ITEMS`](super::MAX_BATCH_WRITE_ITEMS) writes.
    fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<BatchWriteOutput, StoreError>;
}

impl<T: BookStore + ?Sized> BookStore for std::sync::Arc<T> {
    fn table(&self) -> &str {
        (**self).table()
    }

    fn get(&self, isbn: Isbn) -> Result<Option<Book>, StoreError> {
        (**self).get(isbn)
    }

    fn batch_get(&self, keys: &[BookKey]) -> Result<BatchGetOutput, StoreError> {
        (**self).batch_get(keys)
    }

    fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<BatchWriteOutput, StoreError> {
        (**self).batch_write(requests)
    }
}
