//! Object storage - where uploaded catalog files land.
//!
//! The ingestion worker only ever reads: [`ObjectStore::get_object`] hands back
//! a byte stream which the worker drains and concatenates before decoding.

mod error;
mod in_memory;
mod local;

use std::io::Read;

pub use error::FetchError;
pub use in_memory::InMemoryObjectStore;
pub use local::{LocalObjectStore, ObjectEntry};

/// Streamed content of one object.
pub struct ObjectBody {
    reader: Box<dyn Read + Send>,
}

impl ObjectBody {
    pub fn new(reader: impl Read + Send + 'static) -> Self {
        Self {
            reader: Box::new(reader),
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::new(std::io::Cursor::new(bytes))
    }

    /// Drain the stream into one buffer.
    pub fn collect(mut self) -> std::io::Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.reader.read_to_end(&mut bytes)?;
        Ok(bytes)
    }
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody").finish_non_exhaustive()
    }
}

/// Read-only access to object storage.
pub trait ObjectStore: Send + Sync {
    /// Open the object at `bucket`/`key` for reading.
    fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, FetchError>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for std::sync::Arc<T> {
    fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, FetchError> {
        (**self).get_object(bucket, key)
    }
}
