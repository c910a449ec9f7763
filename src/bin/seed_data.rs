//! Seed data script - populates the database with realistic demo data
//!
//! Run with: cargo run --bin seed-data
//!
//! This creates:
//! - 5 peptide products with size variants and stocked inventory
//! - Certificates of analysis and data sheets for the catalog
//! - A demo researcher account with attestation on file
//! - One order taken through cart, checkout, payment, and fulfilment

use std::sync::Arc;
use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use clap::Parser;
use rust_decimal_macros::dec;
use tokio::sync::mpsc;
use tracing::info;

use pepstore_api::cache::TtlCache;
use pepstore_api::config::AppConfig;
use pepstore_api::entities::research_document::{DocumentPayload, TestResult};
use pepstore_api::events::{process_events, EventSender};
use pepstore_api::services::carts::{AddCartItem, CreateCart};
use pepstore_api::services::catalog::{NewProduct, NewVariant};
use pepstore_api::services::checkout::CheckoutRequest;
use pepstore_api::services::documents::NewDocument;
use pepstore_api::services::inventory::UpdateInventoryItem;
use pepstore_api::services::profiles::{UpsertResearchProfile, UpsertUserProfile};
use pepstore_api::services::AppServices;

#[derive(Parser)]
#[command(
    name = "seed-data",
    about = "Populate the database with demo catalog, inventory, and order data"
)]
struct Args {
    /// Database URL; falls back to DATABASE_URL, then an on-disk SQLite file
    #[arg(long)]
    database_url: Option<String>,

    /// Skip running migrations before seeding
    #[arg(long, default_value_t = false)]
    skip_migrations: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let database_url = args
        .database_url
        .or_else(|| std::env::var("DATABASE_URL").ok())
        .unwrap_or_else(|| "sqlite://pepstore.db?mode=rwc".to_string());

    info!("=== Pepstore API Seed Data ===");
    info!("Connecting to database: {}", database_url);

    let db = pepstore_api::db::establish_connection(&database_url).await?;
    if !args.skip_migrations {
        pepstore_api::db::run_migrations(&db).await?;
    }
    let db = Arc::new(db);

    let (event_tx, event_rx) = mpsc::channel(1024);
    let event_sender = Arc::new(EventSender::new(event_tx));
    tokio::spawn(process_events(event_rx));

    let config = Arc::new(AppConfig::new(
        database_url,
        "127.0.0.1".to_string(),
        8080,
        "development".to_string(),
    ));
    let cache = TtlCache::new(Duration::from_secs(300));
    let services = AppServices::new(db, event_sender, cache, config);

    info!("Creating catalog...");
    let variant_ids = create_catalog(&services).await?;
    info!("  Created 5 products with {} variants", variant_ids.len());

    info!("Creating documents...");
    let document_count = create_documents(&services).await?;
    info!("  Created {} research documents", document_count);

    info!("Creating demo researcher account...");
    create_demo_account(&services).await?;
    info!("  Created profile for user demo-researcher");

    info!("Placing a demo order...");
    let order_number = place_demo_order(&services, &variant_ids).await?;
    info!("  Placed and fulfilled order {}", order_number);

    info!("=== Seed Data Complete ===");
    info!("");
    info!("Try these API calls:");
    info!("  curl http://localhost:8080/api/v1/products");
    info!("  curl http://localhost:8080/api/v1/products/slug/bpc-157");
    info!("  curl http://localhost:8080/api/v1/inventory/low-stock");
    info!("  curl http://localhost:8080/api/v1/documents/coa/batch/B2406-118");
    info!("  curl http://localhost:8080/api/v1/orders/by-number/{}", order_number);
    info!("");
    info!("Or explore interactively at: http://localhost:8080/swagger-ui");

    Ok(())
}

/// Products with variants. Adding a variant provisions its inventory item,
/// so initial stock lands in the ledger as received transactions.
async fn create_catalog(services: &AppServices) -> anyhow::Result<Vec<uuid::Uuid>> {
    let catalog = [
        (
            "BPC-157",
            "bpc-157",
            "PEP-100",
            "Body Protection Compound 157, a synthetic pentadecapeptide fragment of human gastric juice protein BPC. Lyophilized powder.",
            vec![("PEP-1001", "5mg", dec!(34.50), 120), ("PEP-1002", "10mg", dec!(59.00), 80)],
        ),
        (
            "TB-500",
            "tb-500",
            "PEP-110",
            "Thymosin Beta-4 fragment peptide. Lyophilized powder in sealed vials.",
            vec![("PEP-1101", "5mg", dec!(42.00), 90), ("PEP-1102", "10mg", dec!(75.00), 60)],
        ),
        (
            "GHK-Cu",
            "ghk-cu",
            "PEP-120",
            "Copper peptide GHK-Cu, a naturally occurring tripeptide copper complex. Blue lyophilized powder.",
            vec![("PEP-1201", "50mg", dec!(28.00), 150)],
        ),
        (
            "Semax",
            "semax",
            "PEP-130",
            "Heptapeptide analog of ACTH(4-10). Lyophilized powder.",
            vec![("PEP-1301", "30mg", dec!(36.00), 45)],
        ),
        (
            "Epithalon",
            "epithalon",
            "PEP-140",
            "Synthetic tetrapeptide Ala-Glu-Asp-Gly. Lyophilized powder.",
            vec![("PEP-1401", "10mg", dec!(33.00), 70)],
        ),
    ];

    let mut variant_ids = Vec::new();
    for (name, slug, catalog_number, description, variants) in catalog {
        let product = services
            .catalog
            .create_product(NewProduct {
                name: name.to_string(),
                slug: slug.to_string(),
                catalog_number: catalog_number.to_string(),
                description: description.to_string(),
                research_use_statement: Some(
                    "For laboratory research use only. Not for human or veterinary use."
                        .to_string(),
                ),
                status: None,
            })
            .await?;

        for (sku, size_label, price, initial_stock) in variants {
            let variant = services
                .catalog
                .add_variant(
                    product.id,
                    NewVariant {
                        sku: sku.to_string(),
                        size_label: size_label.to_string(),
                        price,
                        purity: Some(">= 99.0%".to_string()),
                        initial_stock: Some(initial_stock),
                        reorder_point: Some(25),
                    },
                )
                .await?;
            variant_ids.push(variant.id);
        }
    }

    // Stamp batch and expiry details on one item so expiry reporting and
    // the COA batch lookup have data to hit.
    let item = services.inventory.get_item_by_sku("PEP-1001").await?;
    services
        .inventory
        .update_item(
            item.id,
            UpdateInventoryItem {
                reorder_point: None,
                max_stock: None,
                cost_per_unit: Some(dec!(11.20)),
                batch_number: Some("B2406-118".to_string()),
                expiry_date: Some(Some(Utc::now() + ChronoDuration::days(540))),
                location: Some("FRZ-A3".to_string()),
                temperature_zone: Some("-20C".to_string()),
            },
        )
        .await?;

    Ok(variant_ids)
}

async fn create_documents(services: &AppServices) -> anyhow::Result<usize> {
    let bpc = services.catalog.get_product_by_slug("bpc-157").await?;
    let ghk = services.catalog.get_product_by_slug("ghk-cu").await?;

    let documents = vec![
        NewDocument {
            product_id: bpc.product.id,
            title: "Certificate of Analysis - BPC-157 Batch B2406-118".to_string(),
            payload: DocumentPayload::CertificateOfAnalysis {
                batch_number: "B2406-118".to_string(),
                purity_percent: "99.4".to_string(),
                test_results: vec![
                    TestResult {
                        analyte: "Peptide content".to_string(),
                        method: "HPLC-UV".to_string(),
                        specification: ">= 99.0%".to_string(),
                        result: "99.4%".to_string(),
                    },
                    TestResult {
                        analyte: "Mass confirmation".to_string(),
                        method: "ESI-MS".to_string(),
                        specification: "1419.5 Da +/- 0.5".to_string(),
                        result: "1419.6 Da".to_string(),
                    },
                ],
            },
            published: true,
        },
        NewDocument {
            product_id: bpc.product.id,
            title: "Technical Data Sheet - BPC-157".to_string(),
            payload: DocumentPayload::TechnicalDataSheet {
                solubility: "Soluble in water and bacteriostatic water".to_string(),
                storage: "Lyophilized: -20C. Reconstituted: 2-8C, use within 30 days".to_string(),
                reconstitution: Some(
                    "Reconstitute with bacteriostatic water down the vial wall".to_string(),
                ),
            },
            published: true,
        },
        NewDocument {
            product_id: ghk.product.id,
            title: "Safety Data Sheet - GHK-Cu".to_string(),
            payload: DocumentPayload::SafetyDataSheet {
                hazard_statements: vec!["H315".to_string(), "H319".to_string()],
                ppe: vec!["Nitrile gloves".to_string(), "Safety glasses".to_string()],
                first_aid: "In case of contact, rinse with plenty of water".to_string(),
            },
            published: true,
        },
    ];

    let count = documents.len();
    for document in documents {
        services.documents.create_document(document).await?;
    }

    Ok(count)
}

async fn create_demo_account(services: &AppServices) -> anyhow::Result<()> {
    services
        .profiles
        .upsert_user_profile(
            "demo-researcher",
            UpsertUserProfile {
                email: "researcher@university-lab.edu".to_string(),
                full_name: Some("Demo Researcher".to_string()),
                phone: None,
                default_shipping_address: Some(serde_json::json!({
                    "street": "221 Lab Court",
                    "city": "Cambridge",
                    "state": "MA",
                    "postal_code": "02139",
                    "country": "US"
                })),
                default_billing_address: None,
            },
        )
        .await?;

    services
        .profiles
        .upsert_research_profile(
            "demo-researcher",
            UpsertResearchProfile {
                institution_name: Some("University Research Lab".to_string()),
                institution_type: Some("academic".to_string()),
                field_of_study: Some("Cell biology".to_string()),
                intended_use: Some("In-vitro receptor binding studies".to_string()),
                research_use_attested: true,
            },
        )
        .await?;

    Ok(())
}

/// Run a cart through checkout, settle payment, and fulfil the order.
async fn place_demo_order(
    services: &AppServices,
    variant_ids: &[uuid::Uuid],
) -> anyhow::Result<String> {
    let cart = services
        .carts
        .create_cart(CreateCart {
            session_id: None,
            user_id: Some("demo-researcher".to_string()),
            currency: None,
        })
        .await?;

    services
        .carts
        .add_item(
            cart.id,
            AddCartItem {
                variant_id: variant_ids[0],
                quantity: 2,
            },
        )
        .await?;
    services
        .carts
        .add_item(
            cart.id,
            AddCartItem {
                variant_id: variant_ids[2],
                quantity: 1,
            },
        )
        .await?;

    let order = services
        .checkout
        .checkout(CheckoutRequest {
            cart_id: cart.id,
            user_id: Some("demo-researcher".to_string()),
            shipping_address: None,
            billing_address: None,
            notes: Some("Demo order created by seed-data".to_string()),
        })
        .await?;

    services
        .orders
        .apply_payment_event(order.order.id, true)
        .await?;
    services.orders.fulfill_order(order.order.id).await?;

    Ok(order.order.order_number)
}
