use crate::entities::cart;
use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input,
};
use crate::{
    errors::ApiError,
    services::carts::{AddCartItem, CartWithItems, CreateCart},
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post, put},
    Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Creates the router for cart endpoints
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_cart))
        .route("/active", get(find_active_cart))
        .route("/:id", get(get_cart))
        .route("/:id/items", post(add_item))
        .route(
            "/:id/items/:item_id",
            put(update_item_quantity).delete(remove_item),
        )
        .route("/:id/clear", post(clear_cart))
        .route("/:id/abandon", post(abandon_cart))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ActiveCartQuery {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct UpdateQuantityRequest {
    /// Zero removes the line
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
}

/// Open a cart for a session or a signed-in user
#[utoipa::path(
    post,
    path = "/api/v1/carts",
    request_body = CreateCart,
    responses(
        (status = 201, description = "Cart created", body = cart::Model),
        (status = 400, description = "Neither session nor user given", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn create_cart(
    State(state): State<AppState>,
    Json(payload): Json<CreateCart>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .create_cart(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(cart))
}

/// Get a cart with its line items
#[utoipa::path(
    get,
    path = "/api/v1/carts/:id",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Cart with items", body = CartWithItems),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn get_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .get_cart(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Find the open cart for a session or user, if any
#[utoipa::path(
    get,
    path = "/api/v1/carts/active",
    params(ActiveCartQuery),
    responses(
        (status = 200, description = "Active cart, or null", body = Option<cart::Model>),
        (status = 400, description = "Neither session_id nor user_id given", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn find_active_cart(
    State(state): State<AppState>,
    Query(query): Query<ActiveCartQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = if let Some(session_id) = query.session_id.as_deref().filter(|s| !s.is_empty()) {
        state
            .services
            .carts
            .find_active_cart_for_session(session_id)
            .await
            .map_err(map_service_error)?
    } else if let Some(user_id) = query.user_id.as_deref().filter(|s| !s.is_empty()) {
        state
            .services
            .carts
            .find_active_cart_for_user(user_id)
            .await
            .map_err(map_service_error)?
    } else {
        return Err(ApiError::BadRequest {
            message: "Provide session_id or user_id".to_string(),
            error_code: Some("MISSING_CART_OWNER".to_string()),
        });
    };

    Ok(success_response(cart))
}

/// Add a variant to the cart. Quantities for an existing line merge.
#[utoipa::path(
    post,
    path = "/api/v1/carts/:id/items",
    params(("id" = Uuid, Path, description = "Cart ID")),
    request_body = AddCartItem,
    responses(
        (status = 200, description = "Updated cart", body = CartWithItems),
        (status = 400, description = "Cart not active or quantity invalid", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart or variant not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn add_item(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddCartItem>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .add_item(id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Set a line's quantity. Zero removes the line.
#[utoipa::path(
    put,
    path = "/api/v1/carts/:id/items/:item_id",
    params(
        ("id" = Uuid, Path, description = "Cart ID"),
        ("item_id" = Uuid, Path, description = "Cart item ID")
    ),
    request_body = UpdateQuantityRequest,
    responses(
        (status = 200, description = "Updated cart", body = CartWithItems),
        (status = 404, description = "Cart or item not found", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn update_item_quantity(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateQuantityRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let cart = state
        .services
        .carts
        .update_item_quantity(id, item_id, payload.quantity)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Remove a line from the cart
#[utoipa::path(
    delete,
    path = "/api/v1/carts/:id/items/:item_id",
    params(
        ("id" = Uuid, Path, description = "Cart ID"),
        ("item_id" = Uuid, Path, description = "Cart item ID")
    ),
    responses(
        (status = 200, description = "Updated cart", body = CartWithItems),
        (status = 404, description = "Cart or item not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn remove_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(Uuid, Uuid)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .remove_item(id, item_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Empty the cart but keep it open
#[utoipa::path(
    post,
    path = "/api/v1/carts/:id/clear",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Emptied cart", body = CartWithItems),
        (status = 400, description = "Cart not active", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn clear_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .clear_cart(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}

/// Close a cart without converting it
#[utoipa::path(
    post,
    path = "/api/v1/carts/:id/abandon",
    params(("id" = Uuid, Path, description = "Cart ID")),
    responses(
        (status = 200, description = "Abandoned cart", body = cart::Model),
        (status = 400, description = "Cart not active", body = crate::errors::ErrorResponse),
        (status = 404, description = "Cart not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Carts"
)]
pub async fn abandon_cart(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let cart = state
        .services
        .carts
        .abandon_cart(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(cart))
}
