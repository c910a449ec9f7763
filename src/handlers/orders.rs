use crate::entities::order::{self, OrderStatus};
use crate::handlers::common::{
    map_service_error, success_response, PaginatedResponse, PaginationParams,
};
use crate::{errors::ApiError, services::orders::OrderWithItems, AppState};
use axum::{
    extract::{Json, Path, Query, State},
    response::Html,
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

/// Creates the router for order endpoints
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_orders))
        .route("/by-number/:order_number", get(get_order_by_number))
        .route("/user/:user_id", get(list_user_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", put(update_order_status))
        .route("/:id/cancel", post(cancel_order))
        .route("/:id/fulfill", post(fulfill_order))
        .route("/:id/refund", post(refund_order))
        .route("/:id/invoice", get(get_invoice))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct OrderListQuery {
    pub status: Option<OrderStatus>,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: OrderStatus,
}

/// List orders, filterable by status
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(OrderListQuery),
    responses(
        (status = 200, description = "Orders", body = Vec<order::Model>)
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let pagination = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    };
    let (page, per_page) = pagination.clamped(&state.config);
    let (orders, total) = state
        .services
        .orders
        .list_orders(query.status, page, per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        orders, page, per_page, total,
    )))
}

/// Get an order with its line items
#[utoipa::path(
    get,
    path = "/api/v1/orders/:id",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Order with items", body = OrderWithItems),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Look up an order by its human-readable number
#[utoipa::path(
    get,
    path = "/api/v1/orders/by-number/:order_number",
    params(("order_number" = String, Path, description = "Order number, e.g. PEP-8F2KQ0X4ZD")),
    responses(
        (status = 200, description = "Order with items", body = OrderWithItems),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_order_by_number(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .get_order_by_number(&order_number)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Order history for a user, newest first
#[utoipa::path(
    get,
    path = "/api/v1/orders/user/:user_id",
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "The user's orders", body = Vec<order::Model>)
    ),
    tag = "Orders"
)]
pub async fn list_user_orders(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let orders = state
        .services
        .orders
        .list_user_orders(&user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(orders))
}

/// Move an order along its lifecycle. Cancellation and fulfilment are
/// routed through their dedicated paths so stock stays consistent.
#[utoipa::path(
    put,
    path = "/api/v1/orders/:id/status",
    params(("id" = Uuid, Path, description = "Order ID")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Updated order", body = order::Model),
        (status = 400, description = "Transition not allowed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .update_order_status(id, payload.status)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Cancel an order and release its stock reservations
#[utoipa::path(
    post,
    path = "/api/v1/orders/:id/cancel",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Cancelled order", body = order::Model),
        (status = 400, description = "Order already shipped or closed", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .cancel_order(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Ship an order: reserved stock is consumed and the order moves to shipped
#[utoipa::path(
    post,
    path = "/api/v1/orders/:id/fulfill",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Fulfilled order", body = OrderWithItems),
        (status = 400, description = "Order not ready for fulfilment", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn fulfill_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .fulfill_order(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Mark a paid order as refunded
#[utoipa::path(
    post,
    path = "/api/v1/orders/:id/refund",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Refunded order", body = order::Model),
        (status = 400, description = "Order was not paid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn refund_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .orders
        .mark_refunded(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(order))
}

/// Render the order's invoice as HTML
#[utoipa::path(
    get,
    path = "/api/v1/orders/:id/invoice",
    params(("id" = Uuid, Path, description = "Order ID")),
    responses(
        (status = 200, description = "Invoice HTML", content_type = "text/html"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Orders"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let html = state
        .services
        .invoices
        .render_invoice(id)
        .await
        .map_err(map_service_error)?;

    Ok(Html(html))
}
