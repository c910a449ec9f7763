//! Saved products and named product lists.

mod common;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use uuid::Uuid;

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Seed a product (with one variant) and return the product id.
async fn seed_product(app: &TestApp, sku: &str) -> Uuid {
    app.seed_variant(sku, dec!(30.00), 5, 1).await.product_id
}

#[tokio::test]
async fn saving_twice_conflicts_and_unsaving_clears() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "SAV-1001").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/users/shopper-1/saved-products",
            Some(json!({ "product_id": product_id })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let saved = response_json(response).await;
    assert_eq!(saved["product"]["id"], product_id.to_string());

    let response = app
        .request(
            Method::POST,
            "/api/v1/users/shopper-1/saved-products",
            Some(json!({ "product_id": product_id })),
        )
        .await;
    assert_eq!(response.status(), 409);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("already saved"));

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/users/shopper-1/saved-products/{}", product_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 204);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/users/shopper-1/saved-products/{}", product_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 404);

    // Unknown products cannot be saved.
    let response = app
        .request(
            Method::POST,
            "/api/v1/users/shopper-1/saved-products",
            Some(json!({ "product_id": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn saved_products_list_newest_first_per_user() {
    let app = TestApp::new().await;
    let older = seed_product(&app, "SAV-1002").await;
    let newer = seed_product(&app, "SAV-1003").await;

    for id in [older, newer] {
        let response = app
            .request(
                Method::POST,
                "/api/v1/users/shopper-2/saved-products",
                Some(json!({ "product_id": id })),
            )
            .await;
        assert_eq!(response.status(), 201);
    }

    let response = app
        .request(Method::GET, "/api/v1/users/shopper-2/saved-products", None)
        .await;
    assert_eq!(response.status(), 200);
    let saved = response_json(response).await;
    let saved = saved.as_array().unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0]["product"]["id"], newer.to_string());
    assert_eq!(saved[1]["product"]["id"], older.to_string());

    // Another user's shelf is empty.
    let response = app
        .request(Method::GET, "/api/v1/users/shopper-3/saved-products", None)
        .await;
    assert!(response_json(response).await.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn lists_collect_product_references() {
    let app = TestApp::new().await;
    let product_id = seed_product(&app, "SAV-1004").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/users/shopper-4/lists",
            Some(json!({ "name": "Reorder", "description": "Monthly restock" })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let list = response_json(response).await;
    let list_id = list["id"].as_str().unwrap().to_string();
    assert_eq!(list["name"], "Reorder");
    assert!(list["product_ids"].as_array().unwrap().is_empty());

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/users/shopper-4/lists/{}/products", list_id),
            Some(json!({ "product_id": product_id })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let list = response_json(response).await;
    assert_eq!(list["product_ids"].as_array().unwrap().len(), 1);
    assert_eq!(list["product_ids"][0], product_id.to_string());

    // Adding the same product again is a no-op.
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/users/shopper-4/lists/{}/products", list_id),
            Some(json!({ "product_id": product_id })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let list = response_json(response).await;
    assert_eq!(list["product_ids"].as_array().unwrap().len(), 1);

    // Unknown products are rejected.
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/users/shopper-4/lists/{}/products", list_id),
            Some(json!({ "product_id": Uuid::new_v4() })),
        )
        .await;
    assert_eq!(response.status(), 404);

    let response = app
        .request(
            Method::DELETE,
            &format!(
                "/api/v1/users/shopper-4/lists/{}/products/{}",
                list_id, product_id
            ),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let list = response_json(response).await;
    assert!(list["product_ids"].as_array().unwrap().is_empty());

    // Removing a non-member is quietly ignored.
    let response = app
        .request(
            Method::DELETE,
            &format!(
                "/api/v1/users/shopper-4/lists/{}/products/{}",
                list_id, product_id
            ),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn lists_are_scoped_to_their_owner() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/users/shopper-5/lists",
            Some(json!({ "name": "Bench stock" })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let list_id = response_json(response).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/users/someone-else/lists/{}", list_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 404);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/users/someone-else/lists/{}", list_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 404);

    // The owner still sees it.
    let response = app
        .request(Method::GET, "/api/v1/users/shopper-5/lists", None)
        .await;
    let lists = response_json(response).await;
    assert_eq!(lists.as_array().unwrap().len(), 1);

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/users/shopper-5/lists/{}", list_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 204);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/users/shopper-5/lists/{}", list_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn list_names_are_required() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/users/shopper-6/lists",
            Some(json!({ "name": "" })),
        )
        .await;
    assert_eq!(response.status(), 400);
}
