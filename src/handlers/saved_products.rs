use crate::entities::{product_list, saved_product};
use crate::handlers::common::{
    created_response, map_service_error, no_content_response, success_response, validate_input,
};
use crate::{
    errors::ApiError,
    services::saved_products::{NewProductList, SavedProductView},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{delete, get},
    Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Creates the router for saved products and product lists, nested
/// under /users
pub fn saved_product_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/:user_id/saved-products",
            get(get_saved_products).post(save_product),
        )
        .route(
            "/:user_id/saved-products/:product_id",
            delete(unsave_product),
        )
        .route("/:user_id/lists", get(get_lists).post(create_list))
        .route("/:user_id/lists/:list_id", get(get_list).delete(delete_list))
        .route("/:user_id/lists/:list_id/products", axum::routing::post(add_to_list))
        .route(
            "/:user_id/lists/:list_id/products/:product_id",
            delete(remove_from_list),
        )
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductRef {
    pub product_id: Uuid,
}

/// Products the user has saved, newest first
#[utoipa::path(
    get,
    path = "/api/v1/users/:user_id/saved-products",
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Saved products", body = Vec<SavedProductView>)
    ),
    tag = "Saved Products"
)]
pub async fn get_saved_products(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let saved = state
        .services
        .saved_products
        .get_saved_products(&user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(saved))
}

/// Save a product for later. Saving the same product twice conflicts.
#[utoipa::path(
    post,
    path = "/api/v1/users/:user_id/saved-products",
    params(("user_id" = String, Path, description = "User ID")),
    request_body = ProductRef,
    responses(
        (status = 201, description = "Product saved", body = saved_product::Model),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Product already saved", body = crate::errors::ErrorResponse)
    ),
    tag = "Saved Products"
)]
pub async fn save_product(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<ProductRef>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let saved = state
        .services
        .saved_products
        .save_product(&user_id, payload.product_id)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(saved))
}

/// Remove a saved product
#[utoipa::path(
    delete,
    path = "/api/v1/users/:user_id/saved-products/:product_id",
    params(
        ("user_id" = String, Path, description = "User ID"),
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 204, description = "Removed"),
        (status = 404, description = "Product was not saved", body = crate::errors::ErrorResponse)
    ),
    tag = "Saved Products"
)]
pub async fn unsave_product(
    State(state): State<AppState>,
    Path((user_id, product_id)): Path<(String, Uuid)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .saved_products
        .unsave_product(&user_id, product_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}

/// The user's product lists
#[utoipa::path(
    get,
    path = "/api/v1/users/:user_id/lists",
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Product lists", body = Vec<product_list::Model>)
    ),
    tag = "Saved Products"
)]
pub async fn get_lists(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let lists = state
        .services
        .saved_products
        .get_lists(&user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(lists))
}

/// Create a named product list
#[utoipa::path(
    post,
    path = "/api/v1/users/:user_id/lists",
    params(("user_id" = String, Path, description = "User ID")),
    request_body = NewProductList,
    responses(
        (status = 201, description = "List created", body = product_list::Model),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Saved Products"
)]
pub async fn create_list(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<NewProductList>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let list = state
        .services
        .saved_products
        .create_list(&user_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(list))
}

/// Get one list
#[utoipa::path(
    get,
    path = "/api/v1/users/:user_id/lists/:list_id",
    params(
        ("user_id" = String, Path, description = "User ID"),
        ("list_id" = Uuid, Path, description = "List ID")
    ),
    responses(
        (status = 200, description = "Product list", body = product_list::Model),
        (status = 404, description = "List not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Saved Products"
)]
pub async fn get_list(
    State(state): State<AppState>,
    Path((user_id, list_id)): Path<(String, Uuid)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let list = state
        .services
        .saved_products
        .get_list(&user_id, list_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(list))
}

/// Append a product to a list. Duplicates are ignored.
#[utoipa::path(
    post,
    path = "/api/v1/users/:user_id/lists/:list_id/products",
    params(
        ("user_id" = String, Path, description = "User ID"),
        ("list_id" = Uuid, Path, description = "List ID")
    ),
    request_body = ProductRef,
    responses(
        (status = 200, description = "Updated list", body = product_list::Model),
        (status = 404, description = "List or product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Saved Products"
)]
pub async fn add_to_list(
    State(state): State<AppState>,
    Path((user_id, list_id)): Path<(String, Uuid)>,
    Json(payload): Json<ProductRef>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let list = state
        .services
        .saved_products
        .add_to_list(&user_id, list_id, payload.product_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(list))
}

/// Drop a product from a list
#[utoipa::path(
    delete,
    path = "/api/v1/users/:user_id/lists/:list_id/products/:product_id",
    params(
        ("user_id" = String, Path, description = "User ID"),
        ("list_id" = Uuid, Path, description = "List ID"),
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Updated list", body = product_list::Model),
        (status = 404, description = "List not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Saved Products"
)]
pub async fn remove_from_list(
    State(state): State<AppState>,
    Path((user_id, list_id, product_id)): Path<(String, Uuid, Uuid)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let list = state
        .services
        .saved_products
        .remove_from_list(&user_id, list_id, product_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(list))
}

/// Delete a list
#[utoipa::path(
    delete,
    path = "/api/v1/users/:user_id/lists/:list_id",
    params(
        ("user_id" = String, Path, description = "User ID"),
        ("list_id" = Uuid, Path, description = "List ID")
    ),
    responses(
        (status = 204, description = "List deleted"),
        (status = 404, description = "List not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Saved Products"
)]
pub async fn delete_list(
    State(state): State<AppState>,
    Path((user_id, list_id)): Path<(String, Uuid)>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    state
        .services
        .saved_products
        .delete_list(&user_id, list_id)
        .await
        .map_err(map_service_error)?;

    Ok(no_content_response())
}
