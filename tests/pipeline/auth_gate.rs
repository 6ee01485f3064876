//! Every request passes the verifier before the store is touched.

use book_catalog::lookup::{ApiRequest, LookupService};
use book_catalog::store::InMemoryBookStore;
use book_catalog::Book;
use serde_json::json;

use crate::support::{self, expired_token, static_verifier, valid_token};

fn service() -> LookupService<InMemoryBookStore> {
    let store = InMemoryBookStore::new();
    store.insert_all([Book::new(111, "A", "X")]);
    LookupService::new(store).with_verifier(static_verifier())
}

fn lookup() -> ApiRequest {
    ApiRequest::post_json("/book", &json!({"isbn": 111}))
}

#[tokio::test]
async fn missing_header_is_rejected_before_store_access() {
    let service = service();
    let response = service.handle(&lookup()).await;

    assert_eq!(response.status_code, 401);
    assert_eq!(response.body_json().unwrap(), json!({"message": "Unauthorized"}));
    assert_eq!(service.store().calls().total(), 0);
}

#[tokio::test]
async fn expired_token_is_rejected_before_store_access() {
    let service = service();
    let response = service.handle(&lookup().with_bearer(&expired_token())).await;

    assert_eq!(response.status_code, 401);
    assert_eq!(service.store().calls().total(), 0);
}

#[tokio::test]
async fn garbled_token_is_rejected_before_store_access() {
    let service = service();
    for header in ["Bearer ", "Bearer abc.def", "Token abc", "Bearer a b"] {
        let response = service
            .handle(&lookup().with_header("Authorization", header))
            .await;
        assert_eq!(response.status_code, 401, "{header:?}");
    }
    assert_eq!(service.store().calls().total(), 0);
}

#[tokio::test]
async fn token_signed_with_unknown_secret_is_rejected() {
    let service = service();
    let forged = support::sign(&support::claims(support::now() + 600), support::KID, b"guess");
    let response = service.handle(&lookup().with_bearer(&forged)).await;

    assert_eq!(response.status_code, 401);
    assert_eq!(service.store().calls().total(), 0);
}

#[tokio::test]
async fn unknown_route_still_requires_auth() {
    let service = service();
    let response = service.handle(&ApiRequest::new("GET", "/nowhere")).await;
    assert_eq!(response.status_code, 401);

    let response = service
        .handle(&ApiRequest::new("GET", "/nowhere").with_bearer(&valid_token()))
        .await;
    assert_eq!(response.status_code, 404);
}

#[tokio::test]
async fn valid_token_reaches_the_store() {
    let service = service();
    let response = service
        .handle(&lookup().with_header("authorization", format!("Bearer {}", valid_token())))
        .await;

    assert_eq!(response.status_code, 200);
    assert_eq!(
        response.body_json().unwrap(),
        json!({"book": {"isbn": 111, "title": "A", "author": "X"}})
    );
    assert_eq!(service.store().calls().get, 1);
}
