//! Failing messages are redelivered up to the receive budget, then parked.

use std::time::Duration;

use book_catalog::bus::{Event, InMemoryQueue, Publisher, QueueConfig, Subscriber};
use book_catalog::ingest::{IngestionWorker, Outcome, QueueConsumer, Stage};
use book_catalog::object::InMemoryObjectStore;
use book_catalog::store::{InMemoryBookStore, StoreError};
use serde_json::json;

use crate::support::wait_until;

type Consumer = QueueConsumer<InMemoryObjectStore, InMemoryBookStore, InMemoryQueue>;

fn setup(config: QueueConfig) -> (InMemoryQueue, InMemoryObjectStore, InMemoryBookStore, Consumer) {
    let queue = InMemoryQueue::with_config(config);
    let objects = InMemoryObjectStore::new();
    let store = InMemoryBookStore::new();
    let consumer = QueueConsumer::new(
        IngestionWorker::new(objects.clone(), store.clone()),
        queue.clone(),
    );
    (queue, objects, store, consumer)
}

fn s3_event(id: &str, key: &str) -> Event {
    Event::json(
        id,
        "ObjectCreated:Put",
        &json!({"Records": [{"s3": {"bucket": {"name": "data"}, "object": {"key": key}}}]}),
    )
    .unwrap()
}

#[test]
fn malformed_object_is_dead_lettered_after_two_attempts() {
    let (queue, objects, store, consumer) = setup(QueueConfig::default());
    objects.put_object("data", "broken.json", "this is not json");
    queue.publish(s3_event("m-1", "broken.json")).unwrap();

    assert_eq!(consumer.process_next(10).unwrap(), Outcome::Redelivered);
    assert_eq!(consumer.process_next(10).unwrap(), Outcome::DeadLettered);
    // Not retried a third time.
    assert_eq!(consumer.process_next(10).unwrap(), Outcome::Idle);

    let dead = queue.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].event.id, "m-1");
    assert_eq!(dead[0].receive_count, 2);
    assert!(queue.is_empty());
    assert_eq!(store.calls().total(), 0);
}

#[test]
fn redriven_message_succeeds_once_fixed() {
    let (queue, objects, store, consumer) = setup(QueueConfig::default());
    queue.publish(s3_event("m-1", "late.json")).unwrap();

    // Object not uploaded yet: both attempts fail at fetching.
    assert_eq!(consumer.process_next(10).unwrap(), Outcome::Redelivered);
    assert_eq!(consumer.process_next(10).unwrap(), Outcome::DeadLettered);

    objects.put_object("data", "late.json", r#"[{"isbn":5,"title":"L","author":"Z"}]"#);
    assert_eq!(queue.redrive_dead_letters(), 1);

    assert!(matches!(consumer.process_next(10).unwrap(), Outcome::Acknowledged(_)));
    assert!(store.peek(5).is_some());
    assert!(queue.dead_letters().is_empty());
}

#[test]
fn transient_store_failure_recovers_on_redelivery() {
    let (queue, objects, store, consumer) = setup(QueueConfig::default());
    let books: Vec<_> = (0..40)
        .map(|i| json!({"isbn": i, "title": "t", "author": "a"}))
        .collect();
    objects.put_object("data", "books.json", serde_json::to_vec(&books).unwrap());
    queue.publish(s3_event("m-1", "books.json")).unwrap();

    // The first write call is throttled, failing the message.
    store.fail_next(StoreError::Throttled);
    let err = consumer
        .worker()
        .process_message(&queue.poll(10).unwrap().unwrap())
        .unwrap_err();
    assert_eq!(err.stage(), Stage::Writing);
    queue.nack("m-1", &err.to_string()).unwrap();

    // Redelivery writes every record.
    assert!(matches!(consumer.process_next(10).unwrap(), Outcome::Acknowledged(_)));
    assert_eq!(store.len(), 40);
}

#[test]
fn crashed_consumer_lets_visibility_timeout_redeliver() {
    let (queue, _objects, _store, _consumer) = setup(QueueConfig {
        visibility_timeout: Duration::from_millis(20),
        max_receive_count: 2,
    });
    queue.publish(s3_event("m-1", "whatever.json")).unwrap();

    // Received but never acked or nacked, twice.
    assert_eq!(queue.poll(10).unwrap().unwrap().receive_count, 1);
    let second = queue.poll(200).unwrap().unwrap();
    assert_eq!(second.receive_count, 2);

    assert!(wait_until(Duration::from_secs(2), || {
        let _ = queue.poll(1);
        !queue.dead_letters().is_empty()
    }));
    assert_eq!(queue.dead_letters()[0].reason, "visibility timeout expired");
}

#[test]
fn background_consumer_parks_poison_message_and_keeps_going() {
    let (queue, objects, store, consumer) = setup(QueueConfig::default());
    objects.put_object("data", "poison.json", "{");
    objects.put_object("data", "good.json", r#"[{"isbn":1,"title":"G","author":"H"}]"#);
    queue.publish(s3_event("poison", "poison.json")).unwrap();
    queue.publish(s3_event("good", "good.json")).unwrap();

    let handle = consumer.start(Duration::from_millis(5));
    assert!(wait_until(Duration::from_secs(5), || {
        queue.dead_letters().len() == 1 && queue.acknowledged().len() == 1
    }));
    let stats = handle.stop();

    assert_eq!(stats.acknowledged, 1);
    assert_eq!(stats.redelivered, 1);
    assert_eq!(stats.dead_lettered, 1);
    assert!(store.peek(1).is_some());
}
