//! End-to-end checkout tests over HTTP.
//!
//! Covers cart creation, the research-use attestation gate, stock
//! reservation at checkout, the payment webhook flip, fulfillment and
//! cancellation.

mod common;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};

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

/// Create a cart for the user, add `quantity` units of the variant, return
/// the cart id.
async fn cart_with_line(app: &TestApp, user_id: &str, variant_id: &str, quantity: i32) -> String {
    let response = app
        .request(
            Method::POST,
            "/api/v1/carts",
            Some(json!({ "user_id": user_id })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let cart = response_json(response).await;
    let cart_id = cart["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/items", cart_id),
            Some(json!({ "variant_id": variant_id, "quantity": quantity })),
        )
        .await;
    assert_eq!(response.status(), 200);

    cart_id
}

#[tokio::test]
async fn checkout_reserves_stock_and_creates_a_pending_order() {
    let app = TestApp::new().await;
    let variant = app.seed_variant("CHK-1001", dec!(49.99), 10, 2).await;
    app.seed_attested_user("researcher-1").await;

    let cart_id = cart_with_line(&app, "researcher-1", &variant.id.to_string(), 2).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({ "cart_id": cart_id })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let order = response_json(response).await;

    assert!(order["order_number"].as_str().unwrap().starts_with("PEP-"));
    assert_eq!(order["status"], "pending");
    assert_eq!(order["payment_status"], "pending");
    assert_eq!(order["items"].as_array().unwrap().len(), 1);
    assert_eq!(order["items"][0]["sku"], "CHK-1001");
    assert_eq!(order["items"][0]["quantity"], 2);

    // Stock is reserved, not yet sold.
    let item = app
        .state
        .services
        .inventory
        .get_item_by_sku("CHK-1001")
        .await
        .unwrap();
    assert_eq!(item.current_stock, 10);
    assert_eq!(item.reserved_stock, 2);
    assert_eq!(item.available_stock, 8);

    // The cart is consumed.
    let response = app
        .request(Method::GET, &format!("/api/v1/carts/{}", cart_id), None)
        .await;
    let cart = response_json(response).await;
    assert_eq!(cart["status"], "converted");
}

#[tokio::test]
async fn checkout_without_attestation_is_rejected() {
    let app = TestApp::new().await;
    let variant = app.seed_variant("CHK-1002", dec!(49.99), 10, 2).await;
    // Profile exists but the attestation box was never ticked.
    app.state
        .services
        .profiles
        .upsert_user_profile(
            "researcher-2",
            pepstore_api::services::profiles::UpsertUserProfile {
                email: "researcher-2@lab.test".to_string(),
                full_name: None,
                phone: None,
                default_shipping_address: None,
                default_billing_address: None,
            },
        )
        .await
        .unwrap();

    let cart_id = cart_with_line(&app, "researcher-2", &variant.id.to_string(), 1).await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({ "cart_id": cart_id })),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("attestation"));

    // Nothing was reserved.
    let item = app
        .state
        .services
        .inventory
        .get_item_by_sku("CHK-1002")
        .await
        .unwrap();
    assert_eq!(item.reserved_stock, 0);
}

#[tokio::test]
async fn empty_carts_cannot_check_out() {
    let app = TestApp::new().await;
    app.seed_attested_user("researcher-3").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/carts",
            Some(json!({ "user_id": "researcher-3" })),
        )
        .await;
    let cart = response_json(response).await;
    let cart_id = cart["id"].as_str().unwrap();

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({ "cart_id": cart_id })),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn insufficient_stock_rolls_back_the_whole_checkout() {
    let app = TestApp::new().await;
    let plenty = app.seed_variant("CHK-1003", dec!(20.00), 50, 2).await;
    let scarce = app.seed_variant("CHK-1004", dec!(20.00), 1, 2).await;
    app.seed_attested_user("researcher-4").await;

    let cart_id = cart_with_line(&app, "researcher-4", &plenty.id.to_string(), 2).await;
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/carts/{}/items", cart_id),
            Some(json!({ "variant_id": scarce.id.to_string(), "quantity": 3 })),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({ "cart_id": cart_id })),
        )
        .await;
    assert_eq!(response.status(), 422);

    // The first line's reservation rolled back with everything else.
    let inventory = &app.state.services.inventory;
    let item = inventory.get_item_by_sku("CHK-1003").await.unwrap();
    assert_eq!(item.reserved_stock, 0);
    let item = inventory.get_item_by_sku("CHK-1004").await.unwrap();
    assert_eq!(item.reserved_stock, 0);

    // The cart stays active and can be repaired.
    let response = app
        .request(Method::GET, &format!("/api/v1/carts/{}", cart_id), None)
        .await;
    let cart = response_json(response).await;
    assert_eq!(cart["status"], "active");

    let orders = app
        .state
        .services
        .orders
        .list_user_orders("researcher-4")
        .await
        .unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
async fn payment_webhook_flips_the_order_to_paid_exactly_once() {
    let app = TestApp::new().await;
    let variant = app.seed_variant("CHK-1005", dec!(49.99), 10, 2).await;
    app.seed_attested_user("researcher-5").await;

    let cart_id = cart_with_line(&app, "researcher-5", &variant.id.to_string(), 1).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({ "cart_id": cart_id })),
        )
        .await;
    let order = response_json(response).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    // No webhook secret is configured in tests, so unsigned deliveries pass.
    let payload = json!({ "type": "payment.succeeded", "order_id": order_id });
    let response = app
        .request(Method::POST, "/api/v1/payments/webhook", Some(payload.clone()))
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(Method::GET, &format!("/api/v1/orders/{}", order_id), None)
        .await;
    let order = response_json(response).await;
    assert_eq!(order["payment_status"], "paid");

    // Re-delivery of the same event is acknowledged without complaint.
    let response = app
        .request(Method::POST, "/api/v1/payments/webhook", Some(payload))
        .await;
    assert_eq!(response.status(), 200);

    // A conflicting outcome afterwards is rejected.
    let response = app
        .request(
            Method::POST,
            "/api/v1/payments/webhook",
            Some(json!({ "type": "payment.failed", "order_id": order_id })),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn fulfillment_converts_the_reservation_into_a_sale() {
    let app = TestApp::new().await;
    let variant = app.seed_variant("CHK-1006", dec!(49.99), 10, 2).await;
    app.seed_attested_user("researcher-6").await;

    let cart_id = cart_with_line(&app, "researcher-6", &variant.id.to_string(), 3).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({ "cart_id": cart_id })),
        )
        .await;
    let order = response_json(response).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/fulfill", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let order = response_json(response).await;
    assert_eq!(order["status"], "shipped");

    let item = app
        .state
        .services
        .inventory
        .get_item_by_sku("CHK-1006")
        .await
        .unwrap();
    assert_eq!(item.current_stock, 7);
    assert_eq!(item.reserved_stock, 0);
    assert_eq!(item.available_stock, 7);

    // Shipped orders cannot be cancelled.
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/cancel", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn cancellation_releases_the_reservation() {
    let app = TestApp::new().await;
    let variant = app.seed_variant("CHK-1007", dec!(49.99), 10, 2).await;
    app.seed_attested_user("researcher-7").await;

    let cart_id = cart_with_line(&app, "researcher-7", &variant.id.to_string(), 4).await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({ "cart_id": cart_id })),
        )
        .await;
    let order = response_json(response).await;
    let order_id = order["id"].as_str().unwrap().to_string();

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/cancel", order_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let order = response_json(response).await;
    assert_eq!(order["status"], "cancelled");

    let item = app
        .state
        .services
        .inventory
        .get_item_by_sku("CHK-1007")
        .await
        .unwrap();
    assert_eq!(item.current_stock, 10);
    assert_eq!(item.reserved_stock, 0);
    assert_eq!(item.available_stock, 10);
}

#[tokio::test]
async fn checkout_totals_follow_the_cart_snapshot() {
    let app = TestApp::new().await;
    let variant = app.seed_variant("CHK-1008", dec!(20.00), 10, 2).await;
    app.seed_attested_user("researcher-8").await;

    let cart_id = cart_with_line(&app, "researcher-8", &variant.id.to_string(), 2).await;

    let response = app
        .request(Method::GET, &format!("/api/v1/carts/{}", cart_id), None)
        .await;
    let cart = response_json(response).await;
    // 40.00 subtotal, below the 50.00 free-shipping threshold: 10.00
    // shipping plus 8% tax.
    assert_eq!(money_field(&cart, "subtotal"), dec!(40.00));
    assert_eq!(money_field(&cart, "shipping_total"), dec!(10.00));
    assert_eq!(money_field(&cart, "tax_total"), dec!(3.20));
    assert_eq!(money_field(&cart, "total"), dec!(53.20));

    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({ "cart_id": cart_id })),
        )
        .await;
    let order = response_json(response).await;
    assert_eq!(money_field(&order, "subtotal"), dec!(40.00));
    assert_eq!(money_field(&order, "shipping_total"), dec!(10.00));
    assert_eq!(money_field(&order, "tax_total"), dec!(3.20));
    assert_eq!(money_field(&order, "total_amount"), dec!(53.20));

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}/invoice", order["id"].as_str().unwrap()),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("invoice body");
    let html = String::from_utf8(bytes.to_vec()).expect("invoice is utf-8");
    assert!(html.contains(order["order_number"].as_str().unwrap()));
    assert!(html.contains("53.20"));
}
