use crate::entities::{inventory_item, inventory_transaction};
use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    errors::ApiError,
    services::inventory::{
        NewInventoryItem, NewTransaction, TransactionOutcome, UpdateInventoryItem,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Creates the router for inventory endpoints
pub fn inventory_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_items).post(create_item))
        .route("/low-stock", get(get_low_stock_items))
        .route("/out-of-stock", get(get_out_of_stock_items))
        .route("/expiring", get(get_expiring_items))
        .route("/transactions", post(create_transaction))
        .route(
            "/transactions/by-reference/:reference_id",
            get(get_transactions_by_reference),
        )
        .route("/stock/:sku", get(get_stock_level))
        .route("/stock/:sku/availability", get(check_availability))
        .route("/stock/:sku/restock", post(restock))
        .route("/stock/:sku/adjust", post(adjust_stock))
        .route("/stock/:sku/reserve", post(reserve_stock))
        .route("/stock/:sku/release", post(release_reservation))
        .route("/:id", get(get_item).put(update_item))
        .route("/:id/transactions", get(get_item_transactions))
}

/// Ledger write result: the appended row plus the item after the write.
#[derive(Debug, Serialize, ToSchema)]
pub struct TransactionResponse {
    pub transaction: inventory_transaction::Model,
    pub item: inventory_item::Model,
}

impl From<TransactionOutcome> for TransactionResponse {
    fn from(outcome: TransactionOutcome) -> Self {
        Self {
            transaction: outcome.transaction,
            item: outcome.item,
        }
    }
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ExpiringQuery {
    /// Window in days; defaults to the configured expiry window
    pub within_days: Option<i64>,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AvailabilityQuery {
    /// Units requested; defaults to 1
    #[serde(default = "default_check_quantity")]
    pub quantity: i32,
}

fn default_check_quantity() -> i32 {
    1
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RestockRequest {
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub reason: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AdjustStockRequest {
    /// Signed: positive adds stock, negative removes it
    pub quantity_change: i32,
    #[validate(length(min = 1, message = "Reason is required"))]
    pub reason: String,
    pub created_by: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ReservationRequest {
    #[validate(range(min = 1, message = "Quantity must be positive"))]
    pub quantity: i32,
    pub reference_id: Option<Uuid>,
}

/// List inventory items
#[utoipa::path(
    get,
    path = "/api/v1/inventory",
    params(PaginationParams),
    responses(
        (status = 200, description = "Inventory items", body = Vec<inventory_item::Model>)
    ),
    tag = "Inventory"
)]
pub async fn list_items(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (page, per_page) = pagination.clamped(&state.config);
    let (items, total) = state
        .services
        .inventory
        .list_items(page, per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        items, page, per_page, total,
    )))
}

/// Register a new inventory item
#[utoipa::path(
    post,
    path = "/api/v1/inventory",
    request_body = NewInventoryItem,
    responses(
        (status = 201, description = "Item registered", body = inventory_item::Model),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already exists", body = crate::errors::ErrorResponse)
    ),
    tag = "Inventory"
)]
pub async fn create_item(
    State(state): State<AppState>,
    Json(payload): Json<NewInventoryItem>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let item = state
        .services
        .inventory
        .create_item(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(item))
}

/// Get an inventory item by ID
#[utoipa::path(
    get,
    path = "/api/v1/inventory/:id",
    params(("id" = Uuid, Path, description = "Inventory item ID")),
    responses(
        (status = 200, description = "Inventory item", body = inventory_item::Model),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Inventory"
)]
pub async fn get_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let item = state
        .services
        .inventory
        .get_item(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(item))
}

/// Update item metadata. Stock counters only move through the ledger.
#[utoipa::path(
    put,
    path = "/api/v1/inventory/:id",
    params(("id" = Uuid, Path, description = "Inventory item ID")),
    request_body = UpdateInventoryItem,
    responses(
        (status = 200, description = "Item updated", body = inventory_item::Model),
        (status = 404, description = "Item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Inventory"
)]
pub async fn update_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateInventoryItem>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let item = state
        .services
        .inventory
        .update_item(id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(item))
}

/// Current stock position for a SKU
#[utoipa::path(
    get,
    path = "/api/v1/inventory/stock/:sku",
    params(("sku" = String, Path, description = "Stock keeping unit")),
    responses(
        (status = 200, description = "Stock level", body = crate::services::inventory::StockLevel),
        (status = 404, description = "SKU not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Inventory"
)]
pub async fn get_stock_level(
    State(state): State<AppState>,
    Path(sku): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let level = state
        .services
        .inventory
        .get_stock_level(&sku)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(level))
}

/// Check whether a quantity of a SKU is available. Unknown SKUs report
/// as not in stock rather than erroring.
#[utoipa::path(
    get,
    path = "/api/v1/inventory/stock/:sku/availability",
    params(
        ("sku" = String, Path, description = "Stock keeping unit"),
        AvailabilityQuery
    ),
    responses(
        (status = 200, description = "Availability check result")
    ),
    tag = "Inventory"
)]
pub async fn check_availability(
    State(state): State<AppState>,
    Path(sku): Path<String>,
    Query(query): Query<AvailabilityQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let in_stock = state
        .services
        .inventory
        .is_in_stock(&sku, query.quantity)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(serde_json::json!({
        "sku": sku,
        "quantity": query.quantity,
        "in_stock": in_stock,
    })))
}

/// Items at or below their reorder point
#[utoipa::path(
    get,
    path = "/api/v1/inventory/low-stock",
    responses(
        (status = 200, description = "Low stock items", body = Vec<inventory_item::Model>)
    ),
    tag = "Inventory"
)]
pub async fn get_low_stock_items(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let items = state
        .services
        .inventory
        .get_low_stock_items()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(items))
}

/// Items with zero physical stock
#[utoipa::path(
    get,
    path = "/api/v1/inventory/out-of-stock",
    responses(
        (status = 200, description = "Out of stock items", body = Vec<inventory_item::Model>)
    ),
    tag = "Inventory"
)]
pub async fn get_out_of_stock_items(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let items = state
        .services
        .inventory
        .get_out_of_stock_items()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(items))
}

/// Items whose expiry date falls within the window
#[utoipa::path(
    get,
    path = "/api/v1/inventory/expiring",
    params(ExpiringQuery),
    responses(
        (status = 200, description = "Expiring items", body = Vec<inventory_item::Model>)
    ),
    tag = "Inventory"
)]
pub async fn get_expiring_items(
    State(state): State<AppState>,
    Query(query): Query<ExpiringQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let items = state
        .services
        .inventory
        .get_expiring_items(query.within_days)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(items))
}

/// Append a ledger entry. This is the only write path for stock.
#[utoipa::path(
    post,
    path = "/api/v1/inventory/transactions",
    request_body = NewTransaction,
    responses(
        (status = 201, description = "Transaction recorded", body = TransactionResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "SKU not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Inventory"
)]
pub async fn create_transaction(
    State(state): State<AppState>,
    Json(payload): Json<NewTransaction>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .inventory
        .create_transaction(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(TransactionResponse::from(outcome)))
}

/// Receive stock for a SKU
#[utoipa::path(
    post,
    path = "/api/v1/inventory/stock/:sku/restock",
    params(("sku" = String, Path, description = "Stock keeping unit")),
    request_body = RestockRequest,
    responses(
        (status = 201, description = "Stock received", body = TransactionResponse),
        (status = 404, description = "SKU not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Inventory"
)]
pub async fn restock(
    State(state): State<AppState>,
    Path(sku): Path<String>,
    Json(payload): Json<RestockRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .inventory
        .restock(&sku, payload.quantity, payload.reason, payload.created_by)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(TransactionResponse::from(outcome)))
}

/// Manual stock correction after a count. The reason is mandatory.
#[utoipa::path(
    post,
    path = "/api/v1/inventory/stock/:sku/adjust",
    params(("sku" = String, Path, description = "Stock keeping unit")),
    request_body = AdjustStockRequest,
    responses(
        (status = 201, description = "Adjustment recorded", body = TransactionResponse),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "SKU not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Inventory"
)]
pub async fn adjust_stock(
    State(state): State<AppState>,
    Path(sku): Path<String>,
    Json(payload): Json<AdjustStockRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .inventory
        .adjust_stock(
            &sku,
            payload.quantity_change,
            payload.reason,
            payload.created_by,
        )
        .await
        .map_err(map_service_error)?;

    Ok(created_response(TransactionResponse::from(outcome)))
}

/// Reserve available stock
#[utoipa::path(
    post,
    path = "/api/v1/inventory/stock/:sku/reserve",
    params(("sku" = String, Path, description = "Stock keeping unit")),
    request_body = ReservationRequest,
    responses(
        (status = 201, description = "Stock reserved", body = TransactionResponse),
        (status = 404, description = "SKU not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Inventory"
)]
pub async fn reserve_stock(
    State(state): State<AppState>,
    Path(sku): Path<String>,
    Json(payload): Json<ReservationRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .inventory
        .reserve_stock(&sku, payload.quantity, payload.reference_id)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(TransactionResponse::from(outcome)))
}

/// Return reserved units to the available pool
#[utoipa::path(
    post,
    path = "/api/v1/inventory/stock/:sku/release",
    params(("sku" = String, Path, description = "Stock keeping unit")),
    request_body = ReservationRequest,
    responses(
        (status = 201, description = "Reservation released", body = TransactionResponse),
        (status = 400, description = "Release exceeds reserved stock", body = crate::errors::ErrorResponse),
        (status = 404, description = "SKU not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Inventory"
)]
pub async fn release_reservation(
    State(state): State<AppState>,
    Path(sku): Path<String>,
    Json(payload): Json<ReservationRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let outcome = state
        .services
        .inventory
        .release_reservation(&sku, payload.quantity, payload.reference_id)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(TransactionResponse::from(outcome)))
}

/// Ledger history for an item, newest first
#[utoipa::path(
    get,
    path = "/api/v1/inventory/:id/transactions",
    params(
        ("id" = Uuid, Path, description = "Inventory item ID"),
        PaginationParams
    ),
    responses(
        (status = 200, description = "Ledger entries", body = Vec<inventory_transaction::Model>)
    ),
    tag = "Inventory"
)]
pub async fn get_item_transactions(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (page, per_page) = pagination.clamped(&state.config);
    let (rows, total) = state
        .services
        .inventory
        .get_item_transactions(id, page, per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        rows, page, per_page, total,
    )))
}

/// All ledger entries written on behalf of one reference, e.g. an order
#[utoipa::path(
    get,
    path = "/api/v1/inventory/transactions/by-reference/:reference_id",
    params(("reference_id" = Uuid, Path, description = "Reference ID, e.g. an order ID")),
    responses(
        (status = 200, description = "Ledger entries", body = Vec<inventory_transaction::Model>)
    ),
    tag = "Inventory"
)]
pub async fn get_transactions_by_reference(
    State(state): State<AppState>,
    Path(reference_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let rows = state
        .services
        .inventory
        .get_transactions_by_reference(reference_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(rows))
}
