use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Pepstore API",
        version = "0.3.0",
        description = r#"
# Pepstore Research Peptide Storefront API

Backend for a research peptide e-commerce storefront. Catalog, carts,
checkout, and orders sit on top of an append-only inventory ledger with
low-stock alerting.

## Features

- **Catalog**: Products with size variants, pricing, and live availability
- **Inventory Ledger**: Every stock movement is an immutable transaction; item counters are derived from the ledger
- **Stock Alerts**: Low stock, out of stock, and expiry alerts with an acknowledge/resolve lifecycle
- **Carts & Checkout**: Session and user carts converting to orders with stock reserved transactionally
- **Orders**: Lifecycle management, payment webhook settlement, fulfilment, cancellation, HTML invoices
- **Research Documents**: Certificates of analysis, safety data sheets, and protocols attached to products
- **Accounts**: Contact profiles, research-use attestations, saved products, and reorder lists

## Research Use Disclaimer

All products are sold for laboratory research use only. They are not for
human or veterinary use. Checkout requires a research-use attestation on
file for the purchasing account.

## Error Handling

The API uses consistent error response formats with appropriate HTTP status codes:

```json
{
  "error": "Not Found",
  "message": "Product 7d9f... not found",
  "request_id": "6f4c...",
  "timestamp": "2026-05-15T10:30:00Z"
}
```

## Pagination

List endpoints support pagination with the following query parameters:
- `page`: Page number (default: 1)
- `per_page`: Items per page (default: 20, capped by server config)
        "#,
        contact(
            name = "Pepstore Engineering",
            email = "eng@pepstore.dev",
            url = "https://pepstore.dev"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "https://api.pepstore.dev/api/v1", description = "Production server"),
        (url = "http://localhost:8080/api/v1", description = "Local development")
    ),
    tags(
        (name = "Products", description = "Catalog management and storefront product pages"),
        (name = "Inventory", description = "Inventory items and the stock transaction ledger"),
        (name = "Alerts", description = "Stock alert lifecycle and reconciliation"),
        (name = "Carts", description = "Shopping cart endpoints"),
        (name = "Checkout", description = "Cart to order conversion"),
        (name = "Orders", description = "Order lifecycle and invoices"),
        (name = "Payments", description = "Payment provider webhooks"),
        (name = "Profiles", description = "User contact and research profiles"),
        (name = "Saved Products", description = "Saved products and reorder lists"),
        (name = "Documents", description = "Certificates of analysis and other research documents"),
        (name = "Contact", description = "Contact form")
    ),
    paths(
        // Products
        crate::handlers::products::list_products,
        crate::handlers::products::create_product,
        crate::handlers::products::get_product,
        crate::handlers::products::get_product_by_slug,
        crate::handlers::products::update_product,
        crate::handlers::products::archive_product,
        crate::handlers::products::list_variants,
        crate::handlers::products::add_variant,
        crate::handlers::products::get_variant,
        crate::handlers::products::get_variant_by_sku,
        crate::handlers::products::update_variant,
        crate::handlers::products::list_product_documents,

        // Inventory
        crate::handlers::inventory::list_items,
        crate::handlers::inventory::create_item,
        crate::handlers::inventory::get_item,
        crate::handlers::inventory::update_item,
        crate::handlers::inventory::get_stock_level,
        crate::handlers::inventory::check_availability,
        crate::handlers::inventory::get_low_stock_items,
        crate::handlers::inventory::get_out_of_stock_items,
        crate::handlers::inventory::get_expiring_items,
        crate::handlers::inventory::create_transaction,
        crate::handlers::inventory::restock,
        crate::handlers::inventory::adjust_stock,
        crate::handlers::inventory::reserve_stock,
        crate::handlers::inventory::release_reservation,
        crate::handlers::inventory::get_item_transactions,
        crate::handlers::inventory::get_transactions_by_reference,

        // Alerts
        crate::handlers::alerts::list_alerts,
        crate::handlers::alerts::get_alert,
        crate::handlers::alerts::get_alerts_for_item,
        crate::handlers::alerts::acknowledge_alert,
        crate::handlers::alerts::resolve_alert,
        crate::handlers::alerts::reconcile_alerts,

        // Carts
        crate::handlers::carts::create_cart,
        crate::handlers::carts::get_cart,
        crate::handlers::carts::find_active_cart,
        crate::handlers::carts::add_item,
        crate::handlers::carts::update_item_quantity,
        crate::handlers::carts::remove_item,
        crate::handlers::carts::clear_cart,
        crate::handlers::carts::abandon_cart,

        // Checkout
        crate::handlers::checkout::checkout,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_by_number,
        crate::handlers::orders::list_user_orders,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::cancel_order,
        crate::handlers::orders::fulfill_order,
        crate::handlers::orders::refund_order,
        crate::handlers::orders::get_invoice,

        // Payments
        crate::handlers::payment_webhooks::payment_webhook,

        // Profiles
        crate::handlers::profiles::get_profile,
        crate::handlers::profiles::upsert_user_profile,
        crate::handlers::profiles::upsert_research_profile,

        // Saved products and lists
        crate::handlers::saved_products::get_saved_products,
        crate::handlers::saved_products::save_product,
        crate::handlers::saved_products::unsave_product,
        crate::handlers::saved_products::get_lists,
        crate::handlers::saved_products::create_list,
        crate::handlers::saved_products::get_list,
        crate::handlers::saved_products::add_to_list,
        crate::handlers::saved_products::remove_from_list,
        crate::handlers::saved_products::delete_list,

        // Documents
        crate::handlers::documents::create_document,
        crate::handlers::documents::get_document,
        crate::handlers::documents::list_by_category,
        crate::handlers::documents::find_coa_by_batch,
        crate::handlers::documents::publish_document,
        crate::handlers::documents::unpublish_document,

        // Contact
        crate::handlers::contact::submit_message,
        crate::handlers::contact::list_messages,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::handlers::common::PaginatedResponse<serde_json::Value>,
            crate::handlers::common::PaginationMeta,

            // Catalog types
            crate::entities::product::Model,
            crate::entities::product::ProductStatus,
            crate::entities::product_variant::Model,
            crate::services::catalog::NewProduct,
            crate::services::catalog::UpdateProduct,
            crate::services::catalog::NewVariant,
            crate::services::catalog::UpdateVariant,
            crate::services::catalog::ProductDetail,
            crate::services::catalog::VariantWithAvailability,

            // Inventory types
            crate::entities::inventory_item::Model,
            crate::entities::inventory_transaction::Model,
            crate::entities::inventory_transaction::TransactionType,
            crate::services::inventory::NewInventoryItem,
            crate::services::inventory::UpdateInventoryItem,
            crate::services::inventory::NewTransaction,
            crate::services::inventory::StockLevel,
            crate::handlers::inventory::TransactionResponse,
            crate::handlers::inventory::RestockRequest,
            crate::handlers::inventory::AdjustStockRequest,
            crate::handlers::inventory::ReservationRequest,

            // Alert types
            crate::entities::low_stock_alert::Model,
            crate::entities::low_stock_alert::AlertType,
            crate::entities::low_stock_alert::AlertStatus,
            crate::services::alerts::ReconcileSummary,
            crate::handlers::alerts::AcknowledgeRequest,

            // Cart and checkout types
            crate::entities::cart::Model,
            crate::entities::cart::CartStatus,
            crate::entities::cart_item::Model,
            crate::services::carts::CreateCart,
            crate::services::carts::AddCartItem,
            crate::services::carts::CartWithItems,
            crate::handlers::carts::UpdateQuantityRequest,
            crate::services::checkout::CheckoutRequest,

            // Order types
            crate::entities::order::Model,
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentStatus,
            crate::entities::order_item::Model,
            crate::services::orders::OrderWithItems,
            crate::handlers::orders::UpdateOrderStatusRequest,

            // Profile types
            crate::entities::user_profile::Model,
            crate::entities::research_profile::Model,
            crate::services::profiles::UpsertUserProfile,
            crate::services::profiles::UpsertResearchProfile,
            crate::services::profiles::ProfileBundle,

            // Saved product types
            crate::entities::saved_product::Model,
            crate::entities::product_list::Model,
            crate::services::saved_products::SavedProductView,
            crate::services::saved_products::NewProductList,
            crate::handlers::saved_products::ProductRef,

            // Document types
            crate::entities::research_document::Model,
            crate::entities::research_document::DocumentCategory,
            crate::entities::research_document::DocumentPayload,
            crate::entities::research_document::TestResult,
            crate::services::documents::NewDocument,

            // Contact types
            crate::entities::contact_message::Model,
            crate::services::contact::NewContactMessage,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_covers_the_v1_surface() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Pepstore API"));
        assert!(json.contains("/api/v1/products"));
        assert!(json.contains("/api/v1/inventory"));
        assert!(json.contains("/api/v1/checkout"));
        assert!(json.contains("/api/v1/payments/webhook"));
    }
}
