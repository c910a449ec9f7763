//! Profile and contact endpoint tests: upsert semantics, validation and
//! the combined profile bundle.

mod common;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use serde_json::{json, Value};

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

#[tokio::test]
async fn profiles_upsert_and_read_back_as_a_bundle() {
    let app = TestApp::new().await;

    // A user nobody has seen yet still gets a bundle, just an empty one.
    let response = app
        .request(Method::GET, "/api/v1/profiles/researcher-9", None)
        .await;
    assert_eq!(response.status(), 200);
    let bundle = response_json(response).await;
    assert!(bundle["user_profile"].is_null());
    assert!(bundle["research_profile"].is_null());

    let response = app
        .request(
            Method::PUT,
            "/api/v1/profiles/researcher-9",
            Some(json!({
                "email": "r9@lab.test",
                "full_name": "Dana Osei",
                "phone": "+1-555-0170",
                "default_shipping_address": {
                    "street1": "12 Bay State Rd",
                    "city": "Boston",
                    "postal_code": "02215",
                    "country": "US"
                }
            })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let profile = response_json(response).await;
    assert_eq!(profile["email"], "r9@lab.test");
    assert_eq!(profile["full_name"], "Dana Osei");

    // Addresses are stored as JSON text and must parse back intact.
    let shipping: Value =
        serde_json::from_str(profile["default_shipping_address"].as_str().unwrap()).unwrap();
    assert_eq!(shipping["city"], "Boston");
    assert!(profile["default_billing_address"].is_null());

    let response = app
        .request(
            Method::PUT,
            "/api/v1/profiles/researcher-9/research",
            Some(json!({
                "institution_name": "Bay State Institute",
                "institution_type": "university",
                "field_of_study": "Molecular biology",
                "research_use_attested": true
            })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let research = response_json(response).await;
    assert_eq!(research["research_use_attested"], true);

    let response = app
        .request(Method::GET, "/api/v1/profiles/researcher-9", None)
        .await;
    let bundle = response_json(response).await;
    assert_eq!(bundle["user_profile"]["email"], "r9@lab.test");
    assert_eq!(
        bundle["research_profile"]["institution_name"],
        "Bay State Institute"
    );
}

#[tokio::test]
async fn repeated_upserts_update_in_place() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::PUT,
            "/api/v1/profiles/researcher-10",
            Some(json!({ "email": "r10@lab.test", "full_name": "Original Name" })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let first = response_json(response).await;

    let response = app
        .request(
            Method::PUT,
            "/api/v1/profiles/researcher-10",
            Some(json!({ "email": "r10@faculty.test", "full_name": "Updated Name" })),
        )
        .await;
    assert_eq!(response.status(), 200);
    let second = response_json(response).await;

    assert_eq!(first["id"], second["id"]);
    assert_eq!(second["email"], "r10@faculty.test");
    assert_eq!(second["full_name"], "Updated Name");

    let response = app
        .request(Method::GET, "/api/v1/profiles/researcher-10", None)
        .await;
    let bundle = response_json(response).await;
    assert_eq!(bundle["user_profile"]["email"], "r10@faculty.test");
}

#[tokio::test]
async fn profile_emails_are_validated() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::PUT,
            "/api/v1/profiles/researcher-11",
            Some(json!({ "email": "not-an-email" })),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("valid email"));

    // Nothing was stored.
    let response = app
        .request(Method::GET, "/api/v1/profiles/researcher-11", None)
        .await;
    assert!(response_json(response).await["user_profile"].is_null());
}

#[tokio::test]
async fn attestation_can_be_revoked() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::PUT,
            "/api/v1/profiles/researcher-12/research",
            Some(json!({ "research_use_attested": true })),
        )
        .await;
    assert_eq!(response.status(), 200);
    assert_eq!(response_json(response).await["research_use_attested"], true);

    let response = app
        .request(
            Method::PUT,
            "/api/v1/profiles/researcher-12/research",
            Some(json!({ "research_use_attested": false })),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(Method::GET, "/api/v1/profiles/researcher-12", None)
        .await;
    let bundle = response_json(response).await;
    assert_eq!(bundle["research_profile"]["research_use_attested"], false);
}

#[tokio::test]
async fn contact_messages_record_and_list_newest_first() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/contact",
            Some(json!({
                "name": "Dr. Finch",
                "email": "finch@lab.test",
                "subject": "COA request",
                "message": "Looking for batch B2406-091 documentation."
            })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let first = response_json(response).await;
    assert_eq!(first["name"], "Dr. Finch");
    assert_eq!(first["subject"], "COA request");

    let response = app
        .request(
            Method::POST,
            "/api/v1/contact",
            Some(json!({
                "name": "Dr. Finch",
                "email": "finch@lab.test",
                "message": "Second question, about storage."
            })),
        )
        .await;
    assert_eq!(response.status(), 201);

    let response = app.request(Method::GET, "/api/v1/contact", None).await;
    assert_eq!(response.status(), 200);
    let listing = response_json(response).await;
    assert_eq!(listing["pagination"]["total"], 2);
    let data = listing["data"].as_array().unwrap();
    assert_eq!(data.len(), 2);
    assert_eq!(data[0]["message"], "Second question, about storage.");
    assert!(data[0]["subject"].is_null());
    assert_eq!(data[1]["id"], first["id"]);
}

#[tokio::test]
async fn contact_rejects_invalid_submissions() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/contact",
            Some(json!({ "name": "A", "email": "not-an-email", "message": "hi" })),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .request(
            Method::POST,
            "/api/v1/contact",
            Some(json!({ "name": "", "email": "a@b.test", "message": "hi" })),
        )
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .request(
            Method::POST,
            "/api/v1/contact",
            Some(json!({ "name": "A", "email": "a@b.test", "message": "" })),
        )
        .await;
    assert_eq!(response.status(), 400);

    // Nothing landed in the inbox.
    let response = app.request(Method::GET, "/api/v1/contact", None).await;
    assert_eq!(response_json(response).await["pagination"]["total"], 0);
}
