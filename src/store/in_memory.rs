//! InMemoryBookStore - HashMap-backed book table for tests and local runs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use crate::book::{Book, BookKey, Isbn};

use super::{
    BatchGetOutput, BatchWriteOutput, BookStore, StoreError, WriteRequest, DEFAULT_TABLE,
    MAX_BATCH_GET_KEYS, MAX_BATCH_WRITE_ITEMS,
};

/// Number of calls observed per operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StoreCalls {
    pub get: usize,
    pub batch_get: usize,
    pub batch_write: usize,
}

impl StoreCalls {
    pub fn total(&self) -> usize {
        self.get + self.batch_get + self.batch_write
    }
}

#[derive(Default)]
struct Counters {
    get: AtomicUsize,
    batch_get: AtomicUsize,
    batch_write: AtomicUsize,
}

#[derive(Default)]
struct Faults {
    fail_next: VecDeque<StoreError>,
    deferred_reads: usize,
    deferred_writes: usize,
}

/// In-memory book table.
///
/// Behaves like the provider table: batch calls above the per-call limits are
/// rejected, duplicate keys inside one batch-get are rejected, and puts
/// overwrite by key. Clones share storage, counters and injected faults.
///
/// ## Example
///
/// ```
/// use book_catalog::book::{Book, BookKey};
/// use book_catalog::store::{BookStore, InMemoryBookStore, WriteRequest};
///
/// let store = InMemoryBookStore::new();
/// store.batch_write(vec![WriteRequest::Put(Book::new(1, "A", "X"))]).unwrap();
///
/// let out = store.batch_get(&[BookKey::new(1), BookKey::new(2)]).unwrap();
/// assert_eq!(out.books, vec![Book::new(1, "A", "X")]);
/// ```
#[derive(Clone)]
pub struct InMemoryBookStore {
    table: Arc<str>,
    storage: Arc<RwLock<HashMap<Isbn, Book>>>,
    counters: Arc<Counters>,
    faults: Arc<Mutex<Faults>>,
}

impl Default for InMemoryBookStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBookStore {
    /// Create an empty store for the default `books` table.
    pub fn new() -> Self {
        Self::with_table(DEFAULT_TABLE)
    }

    /// Create an empty store for a named table.
    pub fn with_table(table: impl Into<String>) -> Self {
        Self {
            table: Arc::from(table.into()),
            storage: Arc::new(RwLock::new(HashMap::new())),
            counters: Arc::new(Counters::default()),
            faults: Arc::new(Mutex::new(Faults::default())),
        }
    }

    /// Seed records directly, bypassing call counting and limits.
    pub fn insert_all(&self, books: impl IntoIterator<Item = Book>) {
        if let Ok(mut storage) = self.storage.write() {
            for book in books {
                storage.insert(book.isbn, book);
            }
        }
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.storage.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of one record without counting a call.
    pub fn peek(&self, isbn: Isbn) -> Option<Book> {
        self.storage.read().ok()?.get(&isbn).cloned()
    }

    /// Calls observed so far.
    pub fn calls(&self) -> StoreCalls {
        StoreCalls {
            get: self.counters.get.load(Ordering::SeqCst),
            batch_get: self.counters.batch_get.load(Ordering::SeqCst),
            batch_write: self.counters.batch_write.load(Ordering::SeqCst),
        }
    }

    /// Make the next call (of any kind) fail with `error`. Queued errors are
    /// consumed in order.
    pub fn fail_next(&self, error: StoreError) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.fail_next.push_back(error);
        }
    }

    /// Report the next `count` write items as unprocessed instead of applying them.
    pub fn defer_unprocessed_writes(&self, count: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.deferred_writes += count;
        }
    }

    /// Report the next `count` read keys as unprocessed instead of reading them.
    pub fn defer_unprocessed_reads(&self, count: usize) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.deferred_reads += count;
        }
    }

    fn injected_failure(&self) -> Result<(), StoreError> {
        let mut faults = self.lock_faults()?;
        match faults.fail_next.pop_front() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn lock_faults(&self) -> Result<std::sync::MutexGuard<'_, Faults>, StoreError> {
        self.faults
            .lock()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))
    }

    /// Split off the trailing items that should be reported as unprocessed.
    fn take_deferred<T>(items: &mut Vec<T>, budget: &mut usize) -> Vec<T> {
        let n = (*budget).min(items.len());
        *budget -= n;
        items.split_off(items.len() - n)
    }
}

impl BookStore for InMemoryBookStore {
    fn table(&self) -> &str {
        &self.table
    }

    fn get(&self, isbn: Isbn) -> Result<Option<Book>, StoreError> {
        self.counters.get.fetch_add(1, Ordering::SeqCst);
        self.injected_failure()?;

        let storage = self
            .storage
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        Ok(storage.get(&isbn).cloned())
    }

    fn batch_get(&self, keys: &[BookKey]) -> Result<BatchGetOutput, StoreError> {
        self.counters.batch_get.fetch_add(1, Ordering::SeqCst);
        self.injected_failure()?;

        if keys.len() > MAX_BATCH_GET_KEYS {
            return Err(StoreError::BatchTooLarge {
                limit: MAX_BATCH_GET_KEYS,
                actual: keys.len(),
            });
        }
        if keys.is_empty() {
            return Err(StoreError::Validation("no keys requested".into()));
        }
        let mut seen = HashSet::with_capacity(keys.len());
        if !keys.iter().all(|k| seen.insert(k.isbn)) {
            return Err(StoreError::Validation(
                "provided list of item keys contains duplicates".into(),
            ));
        }

        let mut wanted = keys.to_vec();
        let unprocessed_keys = {
            let mut faults = self.lock_faults()?;
            Self::take_deferred(&mut wanted, &mut faults.deferred_reads)
        };

        let storage = self
            .storage
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        let books = wanted
            .iter()
            .filter_map(|key| storage.get(&key.isbn).cloned())
            .collect();

        Ok(BatchGetOutput {
            books,
            unprocessed_keys,
        })
    }

    fn batch_write(&self, requests: Vec<WriteRequest>) -> Result<BatchWriteOutput, StoreError> {
        self.counters.batch_write.fetch_add(1, Ordering::SeqCst);
        self.injected_failure()?;

        if requests.len() > MAX_BATCH_WRITE_ITEMS {
            return Err(StoreError::BatchTooLarge {
                limit: MAX_BATCH_WRITE_ITEMS,
                actual: requests.len(),
            });
        }
        if requests.is_empty() {
            return Err(StoreError::Validation("no write requests".into()));
        }

        let mut applied = requests;
        let unprocessed = {
            let mut faults = self.lock_faults()?;
            Self::take_deferred(&mut applied, &mut faults.deferred_writes)
        };

        let mut storage = self
            .storage
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".into()))?;
        for request in applied {
            match request {
                WriteRequest::Put(book) => {
                    storage.insert(book.isbn, book);
                }
            }
        }

        Ok(BatchWriteOutput { unprocessed })
    }
}
