//! InMemoryObjectStore - bucket/key map for tests and local runs.

use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::{Arc, RwLock};

use super::{FetchError, ObjectBody, ObjectStore};

#[derive(Clone)]
enum Stored {
    Bytes(Vec<u8>),
    /// Yields `prefix` and then fails, like a connection dropped mid-download.
    Broken { prefix: Vec<u8> },
}

/// In-memory object storage. Clones share contents.
#[derive(Clone, Default)]
pub struct InMemoryObjectStore {
    objects: Arc<RwLock<HashMap<(String, String), Stored>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) an object.
    pub fn put_object(&self, bucket: &str, key: &str, bytes: impl Into<Vec<u8>>) {
        self.insert(bucket, key, Stored::Bytes(bytes.into()));
    }

    /// Store an object whose stream fails after yielding `prefix`.
    pub fn put_broken_object(&self, bucket: &str, key: &str, prefix: impl Into<Vec<u8>>) {
        self.insert(
            bucket,
            key,
            Stored::Broken {
                prefix: prefix.into(),
            },
        );
    }

    pub fn delete_object(&self, bucket: &str, key: &str) -> bool {
        self.objects
            .write()
            .map(|mut objects| {
                objects
                    .remove(&(bucket.to_string(), key.to_string()))
                    .is_some()
            })
            .unwrap_or(false)
    }

    fn insert(&self, bucket: &str, key: &str, stored: Stored) {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert((bucket.to_string(), key.to_string()), stored);
        }
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, FetchError> {
        let objects = self
            .objects
            .read()
            .map_err(|_| FetchError::Unavailable("lock poisoned".into()))?;

        match objects.get(&(bucket.to_string(), key.to_string())) {
            Some(Stored::Bytes(bytes)) => Ok(ObjectBody::from_bytes(bytes.clone())),
            Some(Stored::Broken { prefix }) => Ok(ObjectBody::new(
                io::Cursor::new(prefix.clone()).chain(FailingReader),
            )),
            None => Err(FetchError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
        }
    }
}

struct FailingReader;

impl Read for FailingReader {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::Error::new(
            io::ErrorKind::ConnectionReset,
            "connection reset while streaming object",
        ))
    }
}
