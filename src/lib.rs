pub mod auth;
pub mod book;
pub mod bus;
pub mod config;
pub mod ingest;
pub mod lookup;
pub mod object;
pub mod partition;
pub mod resources;
pub mod store;
pub mod telemetry;

pub use auth::{AuthConfig, AuthError, Identity, JwtVerifier, KeySource};
pub use book::{decode_books, Book, BookKey, Isbn};
pub use bus::{DeadLetter, Disposition, Event, InMemoryQueue, PublishError, Publisher, QueueConfig, Subscriber};
pub use config::{CatalogConfig, CliArgs, ConfigError};
pub use ingest::{
    notifications_from_payload, ConsumerHandle, ConsumerStats, IngestError, IngestReport,
    BucketWatcher, IngestionNotification, IngestionWorker, QueueConsumer, Stage, WatcherHandle,
    WatcherStats,
};
pub use lookup::{ApiRequest, ApiResponse, LookupError, LookupService};
pub use object::{FetchError, InMemoryObjectStore, LocalObjectStore, ObjectBody, ObjectEntry, ObjectStore};
pub use partition::{partition, partition_owned};
pub use resources::Resources;
pub use store::{BookStore, InMemoryBookStore, StoreError};
