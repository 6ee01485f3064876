//! Queue - message transport between object storage and the ingestion worker.
//!
//! ## Architecture
//!
//! ```text
//! object created ──publish──▶ ┌────────────────────┐ ──poll──▶ ingestion worker
//!                             │       queue        │ ◀─ack/nack─
//!                             └────────────────────┘
//!                                       │ receive budget spent
//!                                       ▼
//!                             ┌────────────────────┐
//!                             │ dead-letter queue  │  (manual inspection / redrive)
//!                             └────────────────────┘
//! ```
//!
//! `Publisher` and `Subscriber` are the narrow contracts; `InMemoryQueue`
//! implements both for tests and single-process runs. A broker-backed
//! implementation only has to honour the same ack/nack semantics.

mod in_memory_queue;
mod publisher;

pub use in_memory_queue::{DeadLetter, InMemoryQueue, QueueConfig};
pub use publisher::{Disposition, Event, PublishError, Publisher, Subscriber};
