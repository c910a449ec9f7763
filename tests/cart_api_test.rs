//! Cart endpoint tests: ownership, line edits, server-side totals and the
//! cart lifecycle (abandon, expire).

mod common;

use axum::{body, http::Method, response::Response};
use chrono::{Duration, Utc};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};
use serde_json::{json, Value};
use uuid::Uuid;

use pepstore_api::entities::cart;

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Money fields serialize as strings; parse them so comparisons ignore
/// trailing-zero differences introduced by storage.
fn money_field(value: &Value, key: &str) -> Decimal {
    value[key]
        .as_str()
        .unwrap_or_else(|| panic!("{key} is not a string field"))
        .parse()
        .expect("decimal field")
}

async fn open_cart(app: &TestApp, owner: Value) -> Value {
    let response = app.request(Method::POST, "/api/v1/carts", Some(owner)).await;
    assert_eq!(response.status(), 201);
    response_json(response).await
}

#[tokio::test]
async fn carts_need_an_owner_and_default_sensibly() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::POST, "/api/v1/carts", Some(json!({})))
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("session id or a user id"));

    // Empty strings count as absent.
    let response = app
        .request(
            Method::POST,
            "/api/v1/carts",
            Some(json!({ "session_id": "", "user_id": "" })),
        )
        .await;
    assert_eq!(response.status(), 400);

    let cart = open_cart(&app, json!({ "session_id": "sess-100" })).await;
    assert_eq!(cart["status"], "active");
    assert_eq!(cart["currency"], "USD");
    assert_eq!(cart["session_id"], "sess-100");
    assert!(cart["user_id"].is_null());
    assert_eq!(money_field(&cart, "subtotal"), Decimal::ZERO);
    assert_eq!(money_field(&cart, "total"), Decimal::ZERO);
}

#[tokio::test]
async fn active_lookup_returns_the_newest_open_cart() {
    let app = TestApp::new().await;

    let response = app
        .request(Method::GET, "/api/v1/carts/active?session_id=sess-200", None)
        .await;
    assert_eq!(response.status(), 200);
    assert!(response_json(response).await.is_null());

    let first = open_cart(&app, json!({ "session_id": "sess-200" })).await;
    let second = open_cart(&app, json!({ "session_id": "sess-200" })).await;
    assert_ne!(first["id"], second["id"]);

    let response = app
        .request(Method::GET, "/api/v1/carts/active?session_id=sess-200", None)
        .await;
    let found = response_json(response).await;
    assert_eq!(found["id"], second["id"]);

    // Abandoning the newest makes the older cart current again.
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/abandon", second["id"].as_str().unwrap()),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(Method::GET, "/api/v1/carts/active?session_id=sess-200", None)
        .await;
    assert_eq!(response_json(response).await["id"], first["id"]);

    // Session carts are invisible to the user lookup.
    let response = app
        .request(Method::GET, "/api/v1/carts/active?user_id=sess-200", None)
        .await;
    assert!(response_json(response).await.is_null());

    let response = app.request(Method::GET, "/api/v1/carts/active", None).await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("session_id or user_id"));
}

#[tokio::test]
async fn adding_the_same_variant_merges_lines_and_recomputes_totals() {
    let app = TestApp::new().await;
    let variant = app.seed_variant("CRT-3001", dec!(12.50), 50, 5).await;
    let cart = open_cart(&app, json!({ "session_id": "sess-300" })).await;
    let cart_id = cart["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/items", cart_id),
            Some(json!({ "variant_id": variant.id, "quantity": 2 })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let cart = response_json(response).await;
    assert_eq!(cart["items"].as_array().unwrap().len(), 1);
    assert_eq!(cart["items"][0]["quantity"], 2);
    assert_eq!(cart["items"][0]["sku"], "CRT-3001");
    assert_eq!(money_field(&cart, "subtotal"), dec!(25.00));
    // Below the free-shipping threshold the flat rate applies.
    assert_eq!(money_field(&cart, "shipping_total"), dec!(10.00));
    assert_eq!(money_field(&cart, "tax_total"), dec!(2.00));
    assert_eq!(money_field(&cart, "total"), dec!(37.00));

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/items", cart_id),
            Some(json!({ "variant_id": variant.id, "quantity": 3 })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let cart = response_json(response).await;
    let items = cart["items"].as_array().unwrap();
    assert_eq!(items.len(), 1, "same variant merges into one line");
    assert_eq!(items[0]["quantity"], 5);
    assert_eq!(money_field(&items[0], "line_total"), dec!(62.50));
    assert_eq!(money_field(&cart, "subtotal"), dec!(62.50));
    // Crossing the threshold drops shipping to zero.
    assert_eq!(money_field(&cart, "shipping_total"), Decimal::ZERO);
    assert_eq!(money_field(&cart, "tax_total"), dec!(5.00));
    assert_eq!(money_field(&cart, "total"), dec!(67.50));
}

#[tokio::test]
async fn line_quantity_updates_and_zero_removes() {
    let app = TestApp::new().await;
    let variant = app.seed_variant("CRT-3002", dec!(20.00), 50, 5).await;
    let cart = open_cart(&app, json!({ "user_id": "buyer-1" })).await;
    let cart_id = cart["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/items", cart_id),
            Some(json!({ "variant_id": variant.id, "quantity": 1 })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let cart = response_json(response).await;
    let item_id = cart["items"][0]["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/carts/{}/items/{}", cart_id, item_id),
            Some(json!({ "quantity": 4 })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let cart = response_json(response).await;
    assert_eq!(cart["items"][0]["quantity"], 4);
    assert_eq!(money_field(&cart, "subtotal"), dec!(80.00));

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/carts/{}/items/{}", cart_id, item_id),
            Some(json!({ "quantity": -1 })),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/carts/{}/items/{}", cart_id, item_id),
            Some(json!({ "quantity": 0 })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let cart = response_json(response).await;
    assert!(cart["items"].as_array().unwrap().is_empty());
    // An empty cart owes nothing, shipping included.
    assert_eq!(money_field(&cart, "subtotal"), Decimal::ZERO);
    assert_eq!(money_field(&cart, "shipping_total"), Decimal::ZERO);
    assert_eq!(money_field(&cart, "total"), Decimal::ZERO);

    // The line is gone for good.
    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/carts/{}/items/{}", cart_id, item_id),
            Some(json!({ "quantity": 2 })),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn deleting_a_line_keeps_the_rest() {
    let app = TestApp::new().await;
    let kept = app.seed_variant("CRT-3003", dec!(15.00), 50, 5).await;
    let spare = app.seed_variant("CRT-3004", dec!(40.00), 50, 5).await;
    let cart = open_cart(&app, json!({ "user_id": "buyer-2" })).await;
    let cart_id = cart["id"].as_str().unwrap().to_string();

    for variant in [&kept, &spare] {
        let response = app
            .request(
                Method::POST,
                &format!("/api/v1/carts/{}/items", cart_id),
                Some(json!({ "variant_id": variant.id, "quantity": 1 })),
            )
            .await;
        assert_eq!(response.status(), 200);
    }

    let response = app
        .request(Method::GET, &format!("/api/v1/carts/{}", cart_id), None)
        .await;
    let cart = response_json(response).await;
    let spare_line = cart["items"]
        .as_array()
        .unwrap()
        .iter()
        .find(|line| line["sku"] == "CRT-3004")
        .expect("line for the second variant")["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .request(
            Method::DELETE,
            &format!("/api/v1/carts/{}/items/{}", cart_id, spare_line),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let cart = response_json(response).await;
    let items = cart["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["sku"], "CRT-3003");
    assert_eq!(money_field(&cart, "subtotal"), dec!(15.00));
}

#[tokio::test]
async fn clearing_a_cart_empties_every_line() {
    let app = TestApp::new().await;
    let variant = app.seed_variant("CRT-3005", dec!(25.00), 10, 2).await;
    let cart = open_cart(&app, json!({ "user_id": "buyer-3" })).await;
    let cart_id = cart["id"].as_str().unwrap().to_string();

    // Carts do not gate on stock; availability is enforced at checkout.
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/items", cart_id),
            Some(json!({ "variant_id": variant.id, "quantity": 999 })),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/clear", cart_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let cart = response_json(response).await;
    assert!(cart["items"].as_array().unwrap().is_empty());
    assert_eq!(money_field(&cart, "total"), Decimal::ZERO);
}

#[tokio::test]
async fn abandoned_carts_refuse_further_changes() {
    let app = TestApp::new().await;
    let variant = app.seed_variant("CRT-3006", dec!(25.00), 10, 2).await;
    let cart = open_cart(&app, json!({ "session_id": "sess-700" })).await;
    let cart_id = cart["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/abandon", cart_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["status"], "abandoned");

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/items", cart_id),
            Some(json!({ "variant_id": variant.id, "quantity": 1 })),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("not active"));

    // Abandoning twice is rejected rather than silently absorbed.
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/abandon", cart_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/abandon", Uuid::new_v4()),
            None,
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn stale_carts_expire_on_first_touch() {
    let app = TestApp::new().await;
    let variant = app.seed_variant("CRT-3007", dec!(25.00), 10, 2).await;
    let cart = open_cart(&app, json!({ "session_id": "sess-800" })).await;
    let cart_id = Uuid::parse_str(cart["id"].as_str().unwrap()).unwrap();

    // Age the cart past its TTL directly in the database.
    let stored = app
        .state
        .services
        .carts
        .get_cart(cart_id)
        .await
        .unwrap()
        .cart;
    let mut stale: cart::ActiveModel = stored.into();
    stale.expires_at = Set(Utc::now() - Duration::days(1));
    stale.update(&*app.state.db).await.unwrap();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/items", cart_id),
            Some(json!({ "variant_id": variant.id, "quantity": 1 })),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("expired"));

    let response = app
        .request(Method::GET, &format!("/api/v1/carts/{}", cart_id), None)
        .await;
    assert_eq!(response_json(response).await["status"], "expired");
}

#[tokio::test]
async fn retired_variants_cannot_join_a_cart() {
    let app = TestApp::new().await;
    let variant = app.seed_variant("CRT-3008", dec!(25.00), 10, 2).await;
    let cart = open_cart(&app, json!({ "session_id": "sess-900" })).await;
    let cart_id = cart["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::PUT,
            &format!("/api/v1/products/variants/{}", variant.id),
            Some(json!({ "active": false })),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/items", cart_id),
            Some(json!({ "variant_id": variant.id, "quantity": 1 })),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("no longer sold"));

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/items", cart_id),
            Some(json!({ "variant_id": Uuid::new_v4(), "quantity": 1 })),
        )
        .await;
    assert_eq!(response.status(), 404);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/items", cart_id),
            Some(json!({ "variant_id": variant.id, "quantity": 0 })),
        )
        .await;
    assert_eq!(response.status(), 400);
}
