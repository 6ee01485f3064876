//! Upload → queue → consumer → store → authenticated lookup.

use std::time::Duration;

use book_catalog::bus::QueueConfig;
use book_catalog::config::CatalogConfig;
use book_catalog::ingest::QueueConsumer;
use book_catalog::lookup::ApiRequest;
use book_catalog::Resources;
use serde_json::json;

use crate::support::{static_auth, valid_token, wait_until};

fn config(data_dir: &std::path::Path) -> CatalogConfig {
    CatalogConfig {
        table_name: "books".into(),
        region: Some("local".into()),
        auth: Some(static_auth()),
        server_addr: "127.0.0.1:0".into(),
        data_dir: data_dir.to_path_buf(),
        data_bucket: "data".into(),
        queue: QueueConfig {
            visibility_timeout: Duration::from_secs(30),
            max_receive_count: 2,
        },
        poll_interval: Duration::from_millis(10),
        watch_interval: Duration::from_millis(10),
        adapter_timeout: Duration::from_secs(1),
        max_unprocessed_retries: 3,
        log_json: false,
    }
}

#[tokio::test]
async fn uploaded_record_is_served_by_lookup() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("data")).unwrap();
    std::fs::write(
        dir.path().join("data/books.json"),
        r#"[{"isbn":111,"title":"A","author":"X"}]"#,
    )
    .unwrap();

    let resources = Resources::from_config(&config(dir.path()));
    let consumer = QueueConsumer::spawn(
        resources.ingestion_worker(),
        resources.queue.clone(),
        Duration::from_millis(10),
    );
    resources.notify_object_created("data", "books.json").unwrap();

    let store = resources.store.clone();
    assert!(wait_until(Duration::from_secs(5), || store.peek(111).is_some()));
    let stats = consumer.stop();
    assert_eq!(stats.acknowledged, 1);
    assert_eq!(stats.dead_lettered, 0);

    let service = resources.lookup_service();
    let response = service
        .handle(&ApiRequest::post_json("/book", &json!({"isbn": 111})).with_bearer(&valid_token()))
        .await;

    assert_eq!(response.status_code, 200);
    assert_eq!(
        response.body_json().unwrap(),
        json!({"book": {"isbn": 111, "title": "A", "author": "X"}})
    );
}

#[tokio::test]
async fn files_present_at_startup_are_ingested() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("data")).unwrap();
    let books: Vec<_> = (0..120)
        .map(|i| json!({"isbn": 1000 + i, "title": format!("T{i}"), "author": "A"}))
        .collect();
    std::fs::write(
        dir.path().join("data/catalog.json"),
        serde_json::to_vec(&books).unwrap(),
    )
    .unwrap();
    std::fs::write(dir.path().join("data/more books.json"), r#"[{"isbn":7,"title":"S","author":"B"}]"#)
        .unwrap();

    let resources = Resources::from_config(&config(dir.path()));
    assert_eq!(resources.enqueue_existing("data").unwrap(), 2);

    let consumer = QueueConsumer::spawn(
        resources.ingestion_worker(),
        resources.queue.clone(),
        Duration::from_millis(10),
    );
    let queue = resources.queue.clone();
    assert!(wait_until(Duration::from_secs(5), || queue.acknowledged().len() == 2));
    consumer.stop();

    assert_eq!(resources.store.len(), 121);
    // 120 records at 25 per call, plus one call for the second file.
    assert_eq!(resources.store.calls().batch_write, 6);

    let keys: Vec<_> = (995..1125).map(|isbn| json!({"isbn": isbn})).collect();
    let response = resources
        .lookup_service()
        .handle(&ApiRequest::post_json("/books", &json!(keys)).with_bearer(&valid_token()))
        .await;
    assert_eq!(response.status_code, 200);
    assert_eq!(response.body_json().unwrap()["books"].as_array().unwrap().len(), 120);
}

#[tokio::test]
async fn file_written_after_startup_is_served() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("data")).unwrap();
    let config = config(dir.path());

    let resources = Resources::from_config(&config);
    let consumer = QueueConsumer::spawn(
        resources.ingestion_worker(),
        resources.queue.clone(),
        config.poll_interval,
    );
    let watcher = resources.watch_bucket("data", config.watch_interval);

    let service = resources.lookup_service();
    let lookup = || {
        ApiRequest::post_json("/book", &json!({"isbn": 4242})).with_bearer(&valid_token())
    };
    assert_eq!(service.handle(&lookup()).await.status_code, 404);

    // Land the file whole, the way an upload completes.
    let staged = dir.path().join("staged.json");
    std::fs::write(&staged, r#"[{"isbn":4242,"title":"Late","author":"L"}]"#).unwrap();
    std::fs::rename(&staged, dir.path().join("data/late arrival.json")).unwrap();

    let store = resources.store.clone();
    assert!(wait_until(Duration::from_secs(5), || store.peek(4242).is_some()));
    let watched = watcher.stop();
    let consumed = consumer.stop();
    assert_eq!(watched.queued, 1);
    assert_eq!(consumed.acknowledged, 1);

    let response = service.handle(&lookup()).await;
    assert_eq!(response.status_code, 200);
    assert_eq!(
        response.body_json().unwrap(),
        json!({"book": {"isbn": 4242, "title": "Late", "author": "L"}})
    );
}
