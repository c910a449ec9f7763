use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

use pepstore_api::cache::TtlCache;
use pepstore_api::config::AppConfig;
use pepstore_api::db;
use pepstore_api::entities::product_variant;
use pepstore_api::events::{self, EventSender};
use pepstore_api::services::catalog::{NewProduct, NewVariant};
use pepstore_api::services::profiles::{UpsertResearchProfile, UpsertUserProfile};
use pepstore_api::services::AppServices;
use pepstore_api::AppState;

/// Helper harness for spinning up application state backed by a throwaway
/// SQLite database file.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    db_file: PathBuf,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let db_file = std::env::temp_dir().join(format!(
            "pepstore_test_{}.db",
            Uuid::new_v4().simple()
        ));
        let _ = std::fs::remove_file(&db_file);

        let cfg = AppConfig::new(
            format!("sqlite://{}?mode=rwc", db_file.display()),
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);
        let (event_tx, event_rx) = mpsc::channel(256);
        let event_sender = Arc::new(EventSender::new(event_tx));
        let event_task = tokio::spawn(events::process_events(event_rx));

        let config = Arc::new(cfg);
        let cache = TtlCache::new(Duration::from_secs(300));
        let services = AppServices::new(
            db_arc.clone(),
            event_sender.clone(),
            cache.clone(),
            config.clone(),
        );

        let state = AppState {
            db: db_arc,
            config,
            cache,
            event_sender,
            services,
        };

        let router = Router::new()
            .nest("/api/v1", pepstore_api::api_v1_routes())
            .with_state(state.clone());

        Self {
            router,
            state,
            db_file,
            _event_task: event_task,
        }
    }

    /// Send a JSON request against the router.
    #[allow(dead_code)]
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> axum::response::Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    /// Send a request with extra headers, e.g. webhook signatures.
    #[allow(dead_code)]
    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Create a product with one variant and stocked inventory. The SKU must
    /// match the catalog pattern, e.g. "CHK-1001".
    #[allow(dead_code)]
    pub async fn seed_variant(
        &self,
        sku: &str,
        price: Decimal,
        initial_stock: i32,
        reorder_point: i32,
    ) -> product_variant::Model {
        let catalog = &self.state.services.catalog;
        let product = catalog
            .create_product(NewProduct {
                name: format!("Test Peptide {}", sku),
                slug: format!("test-peptide-{}", sku.to_lowercase()),
                catalog_number: sku.to_string(),
                description: "Seeded for integration tests".to_string(),
                research_use_statement: None,
                status: None,
            })
            .await
            .expect("seed product for tests");

        catalog
            .add_variant(
                product.id,
                NewVariant {
                    sku: sku.to_string(),
                    size_label: "5mg".to_string(),
                    price,
                    purity: None,
                    initial_stock: Some(initial_stock),
                    reorder_point: Some(reorder_point),
                },
            )
            .await
            .expect("seed product variant for tests")
    }

    /// Create a user profile with the research-use attestation on file, as
    /// checkout requires.
    #[allow(dead_code)]
    pub async fn seed_attested_user(&self, user_id: &str) {
        let profiles = &self.state.services.profiles;
        profiles
            .upsert_user_profile(
                user_id,
                UpsertUserProfile {
                    email: format!("{}@lab.test", user_id),
                    full_name: None,
                    phone: None,
                    default_shipping_address: None,
                    default_billing_address: None,
                },
            )
            .await
            .expect("seed user profile for tests");
        profiles
            .upsert_research_profile(
                user_id,
                UpsertResearchProfile {
                    institution_name: Some("Test Lab".to_string()),
                    institution_type: None,
                    field_of_study: None,
                    intended_use: None,
                    research_use_attested: true,
                },
            )
            .await
            .expect("seed research profile for tests");
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
        let _ = std::fs::remove_file(&self.db_file);
    }
}
