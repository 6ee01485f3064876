//! Bucket watcher: turns files landing in a local bucket directory into
//! object-created messages.

use std::collections::HashMap;
use std::io;
use std::sync::mpsc::{channel, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::bus::{PublishError, Publisher};
use crate::object::{LocalObjectStore, ObjectEntry};

use super::IngestionNotification;

/// Statistics from the watcher thread.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WatcherStats {
    pub scans: usize,
    pub queued: usize,
    pub failed_scans: usize,
}

/// Publishes a notification for every new or modified file in one bucket.
///
/// A file is announced once per modification time. The first scan announces
/// everything already present.
pub struct BucketWatcher<P> {
    objects: LocalObjectStore,
    publisher: P,
    bucket: String,
    seen: HashMap<String, SystemTime>,
}

impl<P: Publisher> BucketWatcher<P> {
    pub fn new(objects: LocalObjectStore, publisher: P, bucket: impl Into<String>) -> Self {
        Self {
            objects,
            publisher,
            bucket: bucket.into(),
            seen: HashMap::new(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// List the bucket once and publish what changed since the last scan.
    /// Returns how many notifications were queued.
    ///
    /// A missing bucket directory is an empty bucket.
    pub fn scan(&mut self) -> Result<usize, PublishError> {
        let entries = match self.objects.list_objects(&self.bucket) {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => Vec::new(),
            Err(err) => return Err(PublishError::ConnectionFailed(err.to_string())),
        };

        // Forget deleted files so a re-upload is announced again.
        self.seen
            .retain(|key, _| entries.iter().any(|entry| &entry.key == key));

        let mut queued = 0;
        for ObjectEntry { key, modified } in entries {
            if self.seen.get(&key) == Some(&modified) {
                continue;
            }
            let event = IngestionNotification::new(self.bucket.as_str(), key.as_str())
                .to_event(message_id(&self.bucket, &key, modified))?;
            self.publisher.publish(event)?;
            tracing::debug!(bucket = %self.bucket, key = %key, "object announced");
            self.seen.insert(key, modified);
            queued += 1;
        }
        Ok(queued)
    }
}

impl<P: Publisher + 'static> BucketWatcher<P> {
    /// Move this watcher onto a background thread scanning every `interval`.
    /// The first scan runs immediately.
    pub fn start(mut self, interval: Duration) -> WatcherHandle {
        let (stop_tx, stop_rx) = channel();

        let handle = thread::spawn(move || {
            let mut stats = WatcherStats::default();

            loop {
                stats.scans += 1;
                match self.scan() {
                    Ok(0) => {}
                    Ok(queued) => {
                        stats.queued += queued;
                        tracing::info!(bucket = %self.bucket, queued, "queued new objects");
                    }
                    Err(err) => {
                        stats.failed_scans += 1;
                        tracing::warn!(bucket = %self.bucket, error = %err, "bucket scan failed");
                    }
                }

                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {}
                }
            }

            stats
        });

        WatcherHandle {
            stop_tx,
            handle: Some(handle),
        }
    }
}

/// One id per file version, so a modified file is not rejected as a
/// duplicate of its still-queued predecessor.
fn message_id(bucket: &str, key: &str, modified: SystemTime) -> String {
    let version = modified
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    format!("s3://{bucket}/{key}@{version}")
}

/// Handle to a running watcher thread.
pub struct WatcherHandle {
    stop_tx: Sender<()>,
    handle: Option<JoinHandle<WatcherStats>>,
}

impl WatcherHandle {
    /// Signal the watcher to stop and wait for it to finish.
    pub fn stop(mut self) -> WatcherStats {
        let _ = self.stop_tx.send(());
        match self.handle.take() {
            Some(handle) => handle.join().unwrap_or_default(),
            None => WatcherStats::default(),
        }
    }
}

impl Drop for WatcherHandle {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
    }
}
