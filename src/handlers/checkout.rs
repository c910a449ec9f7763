use crate::handlers::common::{created_response, map_service_error};
use crate::{
    errors::ApiError,
    services::{checkout::CheckoutRequest, orders::OrderWithItems},
    AppState,
};
use axum::{
    extract::{Json, State},
    routing::post,
    Router,
};

/// Creates the router for checkout
pub fn checkout_routes() -> Router<AppState> {
    Router::new().route("/", post(checkout))
}

/// Convert an active cart into a pending order. Prices are re-read and
/// stock is reserved inside one transaction, so a cart that no longer
/// fits available stock fails here rather than after payment.
#[utoipa::path(
    post,
    path = "/api/v1/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order placed", body = OrderWithItems),
        (status = 400, description = "Cart empty, closed, or owned by someone else", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Checkout"
)]
pub async fn checkout(
    State(state): State<AppState>,
    Json(payload): Json<CheckoutRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let order = state
        .services
        .checkout
        .checkout(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(order))
}
