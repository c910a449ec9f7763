use crate::entities::product::{self, ProductStatus};
use crate::entities::{product_variant, research_document};
use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{
    errors::ApiError,
    services::catalog::{
        NewProduct, NewVariant, ProductDetail, ProductFilter, UpdateProduct, UpdateVariant,
        VariantWithAvailability,
    },
    AppState,
};
use axum::{
    extract::{Json, Path, Query, State},
    routing::get,
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

/// Creates the router for catalog endpoints
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route("/slug/:slug", get(get_product_by_slug))
        .route("/variants/sku/:sku", get(get_variant_by_sku))
        .route(
            "/variants/:variant_id",
            get(get_variant).put(update_variant),
        )
        .route(
            "/:id",
            get(get_product).put(update_product).delete(archive_product),
        )
        .route("/:id/variants", get(list_variants).post(add_variant))
        .route("/:id/documents", get(list_product_documents))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct ProductListQuery {
    pub status: Option<ProductStatus>,
    /// Case-insensitive match against name and catalog number
    pub search: Option<String>,
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

#[derive(Debug, Deserialize, IntoParams)]
pub struct DocumentListQuery {
    /// When false, returns drafts as well. Defaults to published only.
    #[serde(default = "default_published_only")]
    pub published_only: bool,
}

fn default_published_only() -> bool {
    true
}

/// List products, filterable by status and search term
#[utoipa::path(
    get,
    path = "/api/v1/products",
    params(ProductListQuery),
    responses(
        (status = 200, description = "Products", body = Vec<product::Model>)
    ),
    tag = "Products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ProductListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let pagination = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    };
    let (page, per_page) = pagination.clamped(&state.config);
    let filter = ProductFilter {
        status: query.status,
        search: query.search,
    };
    let (products, total) = state
        .services
        .catalog
        .list_products(filter, page, per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        products, page, per_page, total,
    )))
}

/// Create a product
#[utoipa::path(
    post,
    path = "/api/v1/products",
    request_body = NewProduct,
    responses(
        (status = 201, description = "Product created", body = product::Model),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 409, description = "Slug or catalog number already exists", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<NewProduct>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let product = state
        .services
        .catalog
        .create_product(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(product))
}

/// Get a product by ID
#[utoipa::path(
    get,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product", body = product::Model),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .get_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

/// Storefront product page: product plus variants with live availability
#[utoipa::path(
    get,
    path = "/api/v1/products/slug/:slug",
    params(("slug" = String, Path, description = "URL slug")),
    responses(
        (status = 200, description = "Product detail", body = ProductDetail),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_product_by_slug(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let detail = state
        .services
        .catalog
        .get_product_by_slug(&slug)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(detail))
}

/// Update a product
#[utoipa::path(
    put,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProduct,
    responses(
        (status = 200, description = "Product updated", body = product::Model),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProduct>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .update_product(id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

/// Archive a product. Products are never hard-deleted so order history
/// keeps its references.
#[utoipa::path(
    delete,
    path = "/api/v1/products/:id",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product archived", body = product::Model),
        (status = 400, description = "Product already archived", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn archive_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let product = state
        .services
        .catalog
        .archive_product(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(product))
}

/// Variants of a product with live availability
#[utoipa::path(
    get,
    path = "/api/v1/products/:id/variants",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Variants", body = Vec<VariantWithAvailability>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn list_variants(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let variants = state
        .services
        .catalog
        .list_variants(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(variants))
}

/// Add a size variant to a product. Also registers the inventory item.
#[utoipa::path(
    post,
    path = "/api/v1/products/:id/variants",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = NewVariant,
    responses(
        (status = 201, description = "Variant created", body = product_variant::Model),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "SKU already exists", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn add_variant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<NewVariant>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let variant = state
        .services
        .catalog
        .add_variant(id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(variant))
}

/// Get a variant by ID
#[utoipa::path(
    get,
    path = "/api/v1/products/variants/:variant_id",
    params(("variant_id" = Uuid, Path, description = "Variant ID")),
    responses(
        (status = 200, description = "Variant", body = product_variant::Model),
        (status = 404, description = "Variant not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_variant(
    State(state): State<AppState>,
    Path(variant_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let variant = state
        .services
        .catalog
        .get_variant(variant_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(variant))
}

/// Look up a variant by SKU
#[utoipa::path(
    get,
    path = "/api/v1/products/variants/sku/:sku",
    params(("sku" = String, Path, description = "Stock keeping unit")),
    responses(
        (status = 200, description = "Variant", body = product_variant::Model),
        (status = 404, description = "Variant not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn get_variant_by_sku(
    State(state): State<AppState>,
    Path(sku): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let variant = state
        .services
        .catalog
        .get_variant_by_sku(&sku)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(variant))
}

/// Update a variant's price or labeling
#[utoipa::path(
    put,
    path = "/api/v1/products/variants/:variant_id",
    params(("variant_id" = Uuid, Path, description = "Variant ID")),
    request_body = UpdateVariant,
    responses(
        (status = 200, description = "Variant updated", body = product_variant::Model),
        (status = 400, description = "Invalid price", body = crate::errors::ErrorResponse),
        (status = 404, description = "Variant not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn update_variant(
    State(state): State<AppState>,
    Path(variant_id): Path<Uuid>,
    Json(payload): Json<UpdateVariant>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let variant = state
        .services
        .catalog
        .update_variant(variant_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(variant))
}

/// Documents attached to a product, e.g. certificates of analysis
#[utoipa::path(
    get,
    path = "/api/v1/products/:id/documents",
    params(
        ("id" = Uuid, Path, description = "Product ID"),
        DocumentListQuery
    ),
    responses(
        (status = 200, description = "Product documents", body = Vec<research_document::Model>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Products"
)]
pub async fn list_product_documents(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(query): Query<DocumentListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let documents = state
        .services
        .documents
        .list_by_product(id, query.published_only)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(documents))
}
