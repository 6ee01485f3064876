//! HTTP transport integration tests.
//!
//! Starts an axum server and exercises it with reqwest.

use std::sync::Arc;

use book_catalog::lookup::{self, LookupService};
use book_catalog::store::InMemoryBookStore;
use book_catalog::Book;
use serde_json::{json, Value};
use tokio::sync::oneshot;

use crate::support::{static_verifier, valid_token};

fn catalog() -> InMemoryBookStore {
    let store = InMemoryBookStore::new();
    store.insert_all((1..=3).map(|i| Book::new(i, format!("Title {i}"), "Author")));
    store
}

/// Bind to port 0 and return the actual address.
async fn start_server(service: Arc<LookupService<InMemoryBookStore>>) -> String {
    let app = lookup::router(service);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn single_lookup_over_http() {
    let base = start_server(Arc::new(LookupService::new(catalog()))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/book"))
        .json(&json!({"isbn": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("content-type").unwrap(),
        "application/json"
    );

    let body: Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        json!({"book": {"isbn": 2, "title": "Title 2", "author": "Author"}})
    );
}

#[tokio::test]
async fn batch_lookup_over_http_omits_misses() {
    let base = start_server(Arc::new(LookupService::new(catalog()))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/books"))
        .json(&json!([{"isbn": 3}, {"isbn": 99}, {"isbn": 1}]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    let mut isbns: Vec<i64> = body["books"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["isbn"].as_i64().unwrap())
        .collect();
    isbns.sort();
    assert_eq!(isbns, vec![1, 3]);
}

#[tokio::test]
async fn other_routes_are_not_found() {
    let base = start_server(Arc::new(LookupService::new(catalog()))).await;
    let client = reqwest::Client::new();

    let resp = client.get(format!("{base}/book")).send().await.unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body, json!({"message": "Not Found"}));

    let resp = client
        .post(format!("{base}/authors"))
        .json(&json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let base = start_server(Arc::new(LookupService::new(catalog()))).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/book"))
        .body("{isbn:")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn authenticated_server_requires_bearer() {
    let service = LookupService::new(catalog()).with_verifier(static_verifier());
    let base = start_server(Arc::new(service)).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{base}/book"))
        .json(&json!({"isbn": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert_eq!(resp.headers().get("www-authenticate").unwrap(), "Bearer");

    let resp = client
        .post(format!("{base}/book"))
        .bearer_auth(valid_token())
        .json(&json!({"isbn": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn serve_stops_on_shutdown_signal() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let server = tokio::spawn(lookup::serve_listener(
        Arc::new(LookupService::new(catalog())),
        listener,
        async {
            let _ = stop_rx.await;
        },
    ));

    let resp = reqwest::Client::new()
        .post(format!("{base}/book"))
        .json(&json!({"isbn": 1}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    drop(resp);

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}
