use crate::entities::research_document::{self, DocumentCategory};
use crate::handlers::common::{
    created_response, map_service_error, success_response, PaginatedResponse, PaginationParams,
};
use crate::{errors::ApiError, services::documents::NewDocument, AppState};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

/// Creates the router for research document endpoints
pub fn document_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(create_document))
        .route("/category/:category", get(list_by_category))
        .route("/coa/batch/:batch_number", get(find_coa_by_batch))
        .route("/:id", get(get_document))
        .route("/:id/publish", post(publish_document))
        .route("/:id/unpublish", post(unpublish_document))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CategoryListQuery {
    /// When false, includes drafts. Defaults to published only.
    #[serde(default = "default_published_only")]
    pub published_only: bool,
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_per_page")]
    pub per_page: u64,
}

fn default_published_only() -> bool {
    true
}

fn default_page() -> u64 {
    1
}

fn default_per_page() -> u64 {
    20
}

/// Attach a document to a product. The payload kind sets the category.
#[utoipa::path(
    post,
    path = "/api/v1/documents",
    request_body = NewDocument,
    responses(
        (status = 201, description = "Document created", body = research_document::Model),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Documents"
)]
pub async fn create_document(
    State(state): State<AppState>,
    Json(payload): Json<NewDocument>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let document = state
        .services
        .documents
        .create_document(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(document))
}

/// Get a document by ID
#[utoipa::path(
    get,
    path = "/api/v1/documents/:id",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Document", body = research_document::Model),
        (status = 404, description = "Document not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Documents"
)]
pub async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let document = state
        .services
        .documents
        .get_document(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(document))
}

/// Documents in one category, e.g. every published certificate of analysis
#[utoipa::path(
    get,
    path = "/api/v1/documents/category/:category",
    params(
        ("category" = DocumentCategory, Path, description = "Document category"),
        CategoryListQuery
    ),
    responses(
        (status = 200, description = "Documents", body = Vec<research_document::Model>)
    ),
    tag = "Documents"
)]
pub async fn list_by_category(
    State(state): State<AppState>,
    Path(category): Path<DocumentCategory>,
    Query(query): Query<CategoryListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let pagination = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    };
    let (page, per_page) = pagination.clamped(&state.config);
    let (documents, total) = state
        .services
        .documents
        .list_by_category(category, query.published_only, page, per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        documents, page, per_page, total,
    )))
}

/// Published certificate of analysis for a batch
#[utoipa::path(
    get,
    path = "/api/v1/documents/coa/batch/:batch_number",
    params(("batch_number" = String, Path, description = "Batch number printed on the vial")),
    responses(
        (status = 200, description = "Certificate of analysis", body = research_document::Model),
        (status = 404, description = "No published certificate for the batch", body = crate::errors::ErrorResponse)
    ),
    tag = "Documents"
)]
pub async fn find_coa_by_batch(
    State(state): State<AppState>,
    Path(batch_number): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let document = state
        .services
        .documents
        .find_coa_by_batch(&batch_number)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(document))
}

/// Make a document publicly visible. Idempotent.
#[utoipa::path(
    post,
    path = "/api/v1/documents/:id/publish",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Published document", body = research_document::Model),
        (status = 404, description = "Document not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Documents"
)]
pub async fn publish_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let document = state
        .services
        .documents
        .set_published(id, true)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(document))
}

/// Pull a document back to draft. Idempotent.
#[utoipa::path(
    post,
    path = "/api/v1/documents/:id/unpublish",
    params(("id" = Uuid, Path, description = "Document ID")),
    responses(
        (status = 200, description = "Unpublished document", body = research_document::Model),
        (status = 404, description = "Document not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Documents"
)]
pub async fn unpublish_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let document = state
        .services
        .documents
        .set_published(id, false)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(document))
}
