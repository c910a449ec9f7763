use crate::entities::contact_message;
use crate::handlers::common::{
    created_response, map_service_error, success_response, validate_input, PaginatedResponse,
    PaginationParams,
};
use crate::{errors::ApiError, services::contact::NewContactMessage, AppState};
use axum::{
    extract::{Json, Query, State},
    routing::get,
    Router,
};

/// Creates the router for contact form endpoints
pub fn contact_routes() -> Router<AppState> {
    Router::new().route("/", get(list_messages).post(submit_message))
}

/// Take a contact form submission
#[utoipa::path(
    post,
    path = "/api/v1/contact",
    request_body = NewContactMessage,
    responses(
        (status = 201, description = "Message received", body = contact_message::Model),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Contact"
)]
pub async fn submit_message(
    State(state): State<AppState>,
    Json(payload): Json<NewContactMessage>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let message = state
        .services
        .contact
        .submit(payload)
        .await
        .map_err(map_service_error)?;

    Ok(created_response(message))
}

/// Inbox listing, newest first
#[utoipa::path(
    get,
    path = "/api/v1/contact",
    params(PaginationParams),
    responses(
        (status = 200, description = "Contact messages", body = Vec<contact_message::Model>)
    ),
    tag = "Contact"
)]
pub async fn list_messages(
    State(state): State<AppState>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let (page, per_page) = pagination.clamped(&state.config);
    let (messages, total) = state
        .services
        .contact
        .list(page, per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        messages, page, per_page, total,
    )))
}
