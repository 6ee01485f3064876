//! LocalObjectStore - a directory per bucket on the local filesystem.

use std::fs::File;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use super::{FetchError, ObjectBody, ObjectStore};

/// A file found in a bucket directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub key: String,
    /// Last modification time; `UNIX_EPOCH` where the platform has none.
    pub modified: SystemTime,
}

/// Serves `root/<bucket>/<key>` as objects.
///
/// Keys are interpreted as relative paths; any key that would resolve outside
/// the bucket directory is refused.
#[derive(Debug, Clone)]
pub struct LocalObjectStore {
    root: PathBuf,
}

impl LocalObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory backing `bucket`.
    pub fn bucket_path(&self, bucket: &str) -> Option<PathBuf> {
        is_plain_relative(Path::new(bucket)).then(|| self.root.join(bucket))
    }

    /// Keys of every regular file directly inside `bucket`, sorted.
    pub fn list_keys(&self, bucket: &str) -> io::Result<Vec<String>> {
        Ok(self
            .list_objects(bucket)?
            .into_iter()
            .map(|entry| entry.key)
            .collect())
    }

    /// Every regular file directly inside `bucket` with its modification
    /// time, sorted by key.
    pub fn list_objects(&self, bucket: &str) -> io::Result<Vec<ObjectEntry>> {
        let Some(dir) = self.bucket_path(bucket) else {
            return Ok(Vec::new());
        };
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                entries.push(ObjectEntry {
                    key: name.to_string(),
                    modified: metadata.modified().unwrap_or(UNIX_EPOCH),
                });
            }
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    fn resolve(&self, bucket: &str, key: &str) -> Option<PathBuf> {
        let key_path = Path::new(key);
        if !is_plain_relative(key_path) {
            return None;
        }
        self.bucket_path(bucket).map(|dir| dir.join(key_path))
    }
}

fn is_plain_relative(path: &Path) -> bool {
    !path.as_os_str().is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)))
}

impl ObjectStore for LocalObjectStore {
    fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectBody, FetchError> {
        let Some(path) = self.resolve(bucket, key) else {
            return Err(FetchError::AccessDenied {
                bucket: bucket.to_string(),
                key: key.to_string(),
                reason: "key escapes bucket directory".into(),
            });
        };

        match File::open(&path) {
            Ok(file) => Ok(ObjectBody::new(file)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Err(FetchError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                Err(FetchError::AccessDenied {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(FetchError::Unreadable {
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: e,
            }),
        }
    }
}
