//! Catalog and research document tests over HTTP.
//!
//! Covers product CRUD, variant provisioning into inventory, storefront
//! detail pages, listing filters, and the certificate-of-analysis flow.

mod common;

use axum::{body, http::Method, response::Response};
use common::TestApp;
use serde_json::{json, Value};
use uuid::Uuid;

async fn response_json(response: Response) -> Value {
    let bytes = body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}

/// Create an active product and return its JSON body.
async fn create_product(app: &TestApp, name: &str, slug: &str, catalog_number: &str) -> Value {
    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": name,
                "slug": slug,
                "catalog_number": catalog_number,
                "description": "Lyophilized research peptide.",
                "status": "active",
            })),
        )
        .await;
    assert_eq!(response.status(), 201);
    response_json(response).await
}

async fn add_variant(app: &TestApp, product_id: &str, sku: &str, size_label: &str, initial_stock: i32) -> Value {
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/products/{}/variants", product_id),
            Some(json!({
                "sku": sku,
                "size_label": size_label,
                "price": "49.50",
                "initial_stock": initial_stock,
                "reorder_point": 5,
            })),
        )
        .await;
    assert_eq!(response.status(), 201);
    response_json(response).await
}

#[tokio::test]
async fn products_start_as_drafts_unless_told_otherwise() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "BPC-157",
                "slug": "bpc-157",
                "catalog_number": "PEP-100",
                "description": "Pentadecapeptide body protection compound.",
            })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let product = response_json(response).await;
    assert_eq!(product["status"], "draft");

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}", product["id"].as_str().unwrap()),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let fetched = response_json(response).await;
    assert_eq!(fetched["slug"], "bpc-157");

    // A blank description fails validation before anything is stored.
    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "TB-500",
                "slug": "tb-500",
                "catalog_number": "PEP-110",
                "description": "",
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn duplicate_slugs_conflict() {
    let app = TestApp::new().await;
    create_product(&app, "GHK-Cu", "ghk-cu", "PEP-120").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "GHK-Cu copper peptide",
                "slug": "ghk-cu",
                "catalog_number": "PEP-121",
                "description": "Copper tripeptide.",
            })),
        )
        .await;
    assert_eq!(response.status(), 409);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("ghk-cu"));
}

#[tokio::test]
async fn adding_a_variant_provisions_its_inventory_item() {
    let app = TestApp::new().await;
    let product = create_product(&app, "Semax", "semax", "PEP-130").await;
    let product_id = product["id"].as_str().unwrap();

    let variant = add_variant(&app, product_id, "CAT-1001", "5mg", 30).await;
    assert_eq!(variant["sku"], "CAT-1001");
    assert_eq!(variant["active"], true);

    // The SKU now has a stock position, seeded by the initial restock.
    let response = app
        .request(Method::GET, "/api/v1/inventory/stock/CAT-1001", None)
        .await;
    assert_eq!(response.status(), 200);
    let level = response_json(response).await;
    assert_eq!(level["current_stock"], 30);
    assert_eq!(level["reserved_stock"], 0);
    assert_eq!(level["available_stock"], 30);
    assert_eq!(level["is_low_stock"], false);
    assert_eq!(level["is_out_of_stock"], false);

    let response = app
        .request(
            Method::GET,
            "/api/v1/inventory/stock/CAT-1001/availability?quantity=30",
            None,
        )
        .await;
    let check = response_json(response).await;
    assert_eq!(check["in_stock"], true);

    let response = app
        .request(
            Method::GET,
            "/api/v1/inventory/stock/CAT-1001/availability?quantity=31",
            None,
        )
        .await;
    let check = response_json(response).await;
    assert_eq!(check["in_stock"], false);
}

#[tokio::test]
async fn variants_with_off_format_skus_are_rejected() {
    let app = TestApp::new().await;
    let product = create_product(&app, "Epithalon", "epithalon", "PEP-140").await;

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/products/{}/variants", product["id"].as_str().unwrap()),
            Some(json!({
                "sku": "epithalon-10mg",
                "size_label": "10mg",
                "price": "59.00",
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"].as_str().unwrap().contains("catalog format"));
}

#[tokio::test]
async fn variant_skus_are_unique_across_products() {
    let app = TestApp::new().await;
    let first = create_product(&app, "Selank", "selank", "PEP-150").await;
    let second = create_product(&app, "DSIP", "dsip", "PEP-160").await;

    add_variant(&app, first["id"].as_str().unwrap(), "CAT-2001", "5mg", 0).await;

    let response = app
        .request(
            Method::POST,
            &format!(
                "/api/v1/products/{}/variants",
                second["id"].as_str().unwrap()
            ),
            Some(json!({
                "sku": "CAT-2001",
                "size_label": "5mg",
                "price": "39.00",
            })),
        )
        .await;
    assert_eq!(response.status(), 409);
}

#[tokio::test]
async fn product_pages_carry_variants_with_availability() {
    let app = TestApp::new().await;
    let product = create_product(&app, "TB-500", "tb-500", "PEP-110").await;
    let product_id = product["id"].as_str().unwrap();

    add_variant(&app, product_id, "CAT-3001", "10mg", 12).await;
    add_variant(&app, product_id, "CAT-3002", "5mg", 0).await;

    let response = app
        .request(Method::GET, "/api/v1/products/slug/tb-500", None)
        .await;
    assert_eq!(response.status(), 200);
    let page = response_json(response).await;
    assert_eq!(page["name"], "TB-500");

    // Variants sort by size label; "10mg" precedes "5mg" lexically.
    let variants = page["variants"].as_array().unwrap();
    assert_eq!(variants.len(), 2);
    assert_eq!(variants[0]["sku"], "CAT-3001");
    assert_eq!(variants[0]["available_stock"], 12);
    assert_eq!(variants[0]["in_stock"], true);
    assert_eq!(variants[1]["sku"], "CAT-3002");
    assert_eq!(variants[1]["in_stock"], false);

    let response = app
        .request(Method::GET, "/api/v1/products/slug/no-such-slug", None)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn search_and_status_filter_the_listing() {
    let app = TestApp::new().await;
    create_product(&app, "BPC-157", "bpc-157", "PEP-100").await;
    create_product(&app, "TB-500", "tb-500", "PEP-110").await;
    let response = app
        .request(
            Method::POST,
            "/api/v1/products",
            Some(json!({
                "name": "Semax",
                "slug": "semax",
                "catalog_number": "PEP-130",
                "description": "Heptapeptide.",
            })),
        )
        .await;
    assert_eq!(response.status(), 201);

    // Search matches names case-insensitively.
    let response = app
        .request(Method::GET, "/api/v1/products?search=bpc", None)
        .await;
    let listing = response_json(response).await;
    assert_eq!(listing["pagination"]["total"], 1);
    assert_eq!(listing["data"][0]["name"], "BPC-157");

    // And catalog numbers.
    let response = app
        .request(Method::GET, "/api/v1/products?search=PEP-1", None)
        .await;
    let listing = response_json(response).await;
    assert_eq!(listing["pagination"]["total"], 3);

    let response = app
        .request(Method::GET, "/api/v1/products?status=draft", None)
        .await;
    let listing = response_json(response).await;
    assert_eq!(listing["pagination"]["total"], 1);
    assert_eq!(listing["data"][0]["name"], "Semax");

    let response = app
        .request(Method::GET, "/api/v1/products?per_page=2", None)
        .await;
    let listing = response_json(response).await;
    assert_eq!(listing["data"].as_array().unwrap().len(), 2);
    assert_eq!(listing["pagination"]["page"], 1);
    assert_eq!(listing["pagination"]["per_page"], 2);
    assert_eq!(listing["pagination"]["total"], 3);
    assert_eq!(listing["pagination"]["total_pages"], 2);
}

#[tokio::test]
async fn archiving_retires_a_product_and_its_variants() {
    let app = TestApp::new().await;
    let product = create_product(&app, "Thymalin", "thymalin", "PEP-170").await;
    let product_id = product["id"].as_str().unwrap();
    add_variant(&app, product_id, "CAT-4001", "10mg", 5).await;

    let response = app
        .request(Method::DELETE, &format!("/api/v1/products/{}", product_id), None)
        .await;
    assert_eq!(response.status(), 200);
    let archived = response_json(response).await;
    assert_eq!(archived["status"], "archived");

    // The variant can no longer be sold.
    let response = app
        .request(Method::GET, "/api/v1/products/variants/sku/CAT-4001", None)
        .await;
    let variant = response_json(response).await;
    assert_eq!(variant["active"], false);

    // Archiving twice is an error, as is extending an archived product.
    let response = app
        .request(Method::DELETE, &format!("/api/v1/products/{}", product_id), None)
        .await;
    assert_eq!(response.status(), 400);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/products/{}/variants", product_id),
            Some(json!({
                "sku": "CAT-4002",
                "size_label": "5mg",
                "price": "29.00",
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn certificates_surface_by_batch_once_published() {
    let app = TestApp::new().await;
    let product = create_product(&app, "BPC-157", "bpc-157", "PEP-100").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "product_id": product["id"],
                "title": "Certificate of Analysis - Batch B2406-091",
                "payload": {
                    "kind": "certificate_of_analysis",
                    "batch_number": "B2406-091",
                    "purity_percent": "99.2%",
                    "test_results": [{
                        "analyte": "Peptide content",
                        "method": "HPLC-UV",
                        "specification": ">= 99.0%",
                        "result": "99.2%"
                    }]
                }
            })),
        )
        .await;
    assert_eq!(response.status(), 201);
    let document = response_json(response).await;
    assert_eq!(document["category"], "coa");
    assert_eq!(document["batch_number"], "B2406-091");
    assert_eq!(document["published"], false);
    let document_id = document["id"].as_str().unwrap().to_string();

    // Drafts are invisible to the batch lookup.
    let response = app
        .request(Method::GET, "/api/v1/documents/coa/batch/B2406-091", None)
        .await;
    assert_eq!(response.status(), 404);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/documents/{}/publish", document_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);
    let published = response_json(response).await;
    assert_eq!(published["published"], true);

    let response = app
        .request(Method::GET, "/api/v1/documents/coa/batch/B2406-091", None)
        .await;
    assert_eq!(response.status(), 200);
    let found = response_json(response).await;
    assert_eq!(found["id"].as_str().unwrap(), document_id);

    // Publishing again changes nothing; unpublishing hides it again.
    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/documents/{}/publish", document_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(
            Method::POST,
            &format!("/api/v1/documents/{}/unpublish", document_id),
            None,
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .request(Method::GET, "/api/v1/documents/coa/batch/B2406-091", None)
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn documents_require_an_existing_product() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "product_id": Uuid::new_v4(),
                "title": "Orphaned testing report",
                "payload": {
                    "kind": "testing_report",
                    "lab": "Axis Labs",
                    "method": "LC-MS",
                    "result_summary": "Identity confirmed"
                }
            })),
        )
        .await;
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn product_document_listings_hide_drafts_by_default() {
    let app = TestApp::new().await;
    let product = create_product(&app, "GHK-Cu", "ghk-cu", "PEP-120").await;
    let product_id = product["id"].as_str().unwrap();

    let response = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "product_id": product["id"],
                "title": "Certificate of Analysis - Batch B2406-014",
                "published": true,
                "payload": {
                    "kind": "certificate_of_analysis",
                    "batch_number": "B2406-014",
                    "purity_percent": "99.5%",
                    "test_results": [{
                        "analyte": "Peptide content",
                        "method": "HPLC-UV",
                        "specification": ">= 99.0%",
                        "result": "99.5%"
                    }]
                }
            })),
        )
        .await;
    assert_eq!(response.status(), 201);

    let response = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "product_id": product["id"],
                "title": "Technical data sheet",
                "payload": {
                    "kind": "technical_data_sheet",
                    "solubility": "Bacteriostatic water, 1 mg/mL",
                    "storage": "-20C, protect from light",
                    "reconstitution": "Swirl gently, do not vortex"
                }
            })),
        )
        .await;
    assert_eq!(response.status(), 201);

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}/documents", product_id),
            None,
        )
        .await;
    let published_only = response_json(response).await;
    let listed = published_only.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["category"], "coa");

    let response = app
        .request(
            Method::GET,
            &format!("/api/v1/products/{}/documents?published_only=false", product_id),
            None,
        )
        .await;
    let everything = response_json(response).await;
    assert_eq!(everything.as_array().unwrap().len(), 2);

    // Category listings apply the same visibility rule.
    let response = app
        .request(Method::GET, "/api/v1/documents/category/technical_data_sheet", None)
        .await;
    let listing = response_json(response).await;
    assert_eq!(listing["pagination"]["total"], 0);

    let response = app
        .request(
            Method::GET,
            "/api/v1/documents/category/technical_data_sheet?published_only=false",
            None,
        )
        .await;
    let listing = response_json(response).await;
    assert_eq!(listing["pagination"]["total"], 1);
}

#[tokio::test]
async fn incomplete_document_payloads_are_rejected() {
    let app = TestApp::new().await;
    let product = create_product(&app, "Selank", "selank", "PEP-150").await;

    let response = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "product_id": product["id"],
                "title": "Certificate of Analysis",
                "payload": {
                    "kind": "certificate_of_analysis",
                    "batch_number": "B2406-200",
                    "purity_percent": "99.0%",
                    "test_results": []
                }
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
    let body = response_json(response).await;
    assert!(body["message"]
        .as_str()
        .unwrap()
        .contains("at least one test result"));

    let response = app
        .request(
            Method::POST,
            "/api/v1/documents",
            Some(json!({
                "product_id": product["id"],
                "title": "   ",
                "payload": {
                    "kind": "testing_report",
                    "lab": "Axis Labs",
                    "method": "LC-MS",
                    "result_summary": "Identity confirmed"
                }
            })),
        )
        .await;
    assert_eq!(response.status(), 400);
}
