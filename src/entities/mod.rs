pub mod cart;
pub mod cart_item;
pub mod contact_message;
pub mod inventory_item;
pub mod inventory_transaction;
pub mod low_stock_alert;
pub mod order;
pub mod order_item;
pub mod product;
pub mod product_list;
pub mod product_variant;
pub mod research_document;
pub mod research_profile;
pub mod saved_product;
pub mod user_profile;
