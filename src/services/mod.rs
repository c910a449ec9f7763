// Core stock-keeping services
pub mod alerts;
pub mod inventory;

// Storefront services
pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod orders;

// Account and content services
pub mod contact;
pub mod documents;
pub mod invoices;
pub mod profiles;
pub mod saved_products;

use std::sync::Arc;

use crate::{cache::TtlCache, config::AppConfig, db::DbPool, events::EventSender};

/// Container wiring every service with its dependencies. Built once at
/// startup and cloned into the router state.
#[derive(Clone)]
pub struct AppServices {
    pub inventory: Arc<inventory::InventoryService>,
    pub alerts: Arc<alerts::AlertService>,
    pub catalog: Arc<catalog::CatalogService>,
    pub carts: Arc<carts::CartService>,
    pub checkout: Arc<checkout::CheckoutService>,
    pub orders: Arc<orders::OrderService>,
    pub profiles: Arc<profiles::ProfileService>,
    pub saved_products: Arc<saved_products::SavedProductService>,
    pub documents: Arc<documents::DocumentService>,
    pub invoices: Arc<invoices::InvoiceService>,
    pub contact: Arc<contact::ContactService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Arc<EventSender>,
        cache: TtlCache,
        config: Arc<AppConfig>,
    ) -> Self {
        let alerts = Arc::new(alerts::AlertService::new(
            db.clone(),
            event_sender.clone(),
            config.clone(),
        ));
        let inventory = Arc::new(inventory::InventoryService::new(
            db.clone(),
            event_sender.clone(),
            cache.clone(),
            alerts.clone(),
            config.clone(),
        ));
        let catalog = Arc::new(catalog::CatalogService::new(
            db.clone(),
            event_sender.clone(),
            cache.clone(),
            inventory.clone(),
        ));
        let carts = Arc::new(carts::CartService::new(
            db.clone(),
            event_sender.clone(),
            config.clone(),
        ));
        let orders = Arc::new(orders::OrderService::new(
            db.clone(),
            event_sender.clone(),
            cache.clone(),
            inventory.clone(),
        ));
        let checkout = Arc::new(checkout::CheckoutService::new(
            db.clone(),
            event_sender.clone(),
            inventory.clone(),
            orders.clone(),
            config.clone(),
        ));
        let profiles = Arc::new(profiles::ProfileService::new(
            db.clone(),
            event_sender.clone(),
            cache.clone(),
        ));
        let saved_products = Arc::new(saved_products::SavedProductService::new(
            db.clone(),
            event_sender.clone(),
            cache,
        ));
        let documents = Arc::new(documents::DocumentService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let invoices = Arc::new(invoices::InvoiceService::new(db.clone(), config));
        let contact = Arc::new(contact::ContactService::new(db, event_sender));

        Self {
            inventory,
            alerts,
            catalog,
            carts,
            checkout,
            orders,
            profiles,
            saved_products,
            documents,
            invoices,
            contact,
        }
    }
}
