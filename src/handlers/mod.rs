pub mod common;

pub mod alerts;
pub mod carts;
pub mod checkout;
pub mod contact;
pub mod documents;
pub mod inventory;
pub mod orders;
pub mod payment_webhooks;
pub mod products;
pub mod profiles;
pub mod saved_products;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;
