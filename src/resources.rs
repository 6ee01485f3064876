//! Process-wide adapters, built once at startup and shared by the lookup API
//! and the ingestion consumer.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::JwtVerifier;
use crate::bus::{InMemoryQueue, PublishError, Publisher};
use crate::config::CatalogConfig;
use crate::ingest::{BucketWatcher, IngestionNotification, IngestionWorker, WatcherHandle};
use crate::lookup::LookupService;
use crate::object::LocalObjectStore;
use crate::store::InMemoryBookStore;

/// Shared handles to the store, object storage, queue and verifier.
///
/// Every field is a cheap handle; clones refer to the same underlying state.
#[derive(Clone)]
pub struct Resources {
    pub store: InMemoryBookStore,
    pub objects: LocalObjectStore,
    pub queue: InMemoryQueue,
    /// Present when authentication is configured. Keys are fetched on the
    /// first verified request, not here.
    pub verifier: Option<Arc<JwtVerifier>>,
    max_unprocessed_retries: usize,
}

impl Resources {
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self {
            store: InMemoryBookStore::with_table(config.table_name.clone()),
            objects: LocalObjectStore::new(config.data_dir.clone()),
            queue: InMemoryQueue::with_config(config.queue),
            verifier: config
                .auth
                .clone()
                .map(|auth| Arc::new(JwtVerifier::new(auth))),
            max_unprocessed_retries: config.max_unprocessed_retries,
        }
    }

    pub fn lookup_service(&self) -> LookupService<InMemoryBookStore> {
        let service = LookupService::new(self.store.clone())
            .with_max_unprocessed_retries(self.max_unprocessed_retries);
        match &self.verifier {
            Some(verifier) => service.with_verifier(Arc::clone(verifier)),
            None => service,
        }
    }

    pub fn ingestion_worker(&self) -> IngestionWorker<LocalObjectStore, InMemoryBookStore> {
        IngestionWorker::new(self.objects.clone(), self.store.clone())
            .with_max_unprocessed_retries(self.max_unprocessed_retries)
    }

    /// Queue an object-created notification for `key` in `bucket`.
    pub fn notify_object_created(&self, bucket: &str, key: &str) -> Result<(), PublishError> {
        let event = IngestionNotification::new(bucket, key).to_event(format!("s3://{bucket}/{key}"))?;
        self.queue.publish(event)
    }

    /// A watcher publishing to this process's queue.
    pub fn bucket_watcher(&self, bucket: &str) -> BucketWatcher<InMemoryQueue> {
        BucketWatcher::new(self.objects.clone(), self.queue.clone(), bucket)
    }

    /// Queue a notification for every file already in `bucket`. Returns how
    /// many were queued.
    pub fn enqueue_existing(&self, bucket: &str) -> Result<usize, PublishError> {
        let queued = self.bucket_watcher(bucket).scan()?;
        tracing::info!(bucket, queued, "queued existing objects");
        Ok(queued)
    }

    /// Announce files already in `bucket`, then keep announcing new or
    /// modified ones every `interval` until the handle is stopped.
    pub fn watch_bucket(&self, bucket: &str, interval: Duration) -> WatcherHandle {
        self.bucket_watcher(bucket).start(interval)
    }
}
