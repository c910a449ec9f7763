use crate::entities::{research_profile, user_profile};
use crate::handlers::common::{map_service_error, success_response, validate_input};
use crate::{
    errors::ApiError,
    services::profiles::{ProfileBundle, UpsertResearchProfile, UpsertUserProfile},
    AppState,
};
use axum::{
    extract::{Json, Path, State},
    routing::{get, put},
    Router,
};

/// Creates the router for profile endpoints
pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/:user_id", get(get_profile).put(upsert_user_profile))
        .route("/:user_id/research", put(upsert_research_profile))
}

/// Contact and research profile for a user
#[utoipa::path(
    get,
    path = "/api/v1/profiles/:user_id",
    params(("user_id" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Profile bundle", body = ProfileBundle)
    ),
    tag = "Profiles"
)]
pub async fn get_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let bundle = state
        .services
        .profiles
        .get_profile(&user_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(bundle))
}

/// Create or replace the user's contact profile
#[utoipa::path(
    put,
    path = "/api/v1/profiles/:user_id",
    params(("user_id" = String, Path, description = "User ID")),
    request_body = UpsertUserProfile,
    responses(
        (status = 200, description = "Saved profile", body = user_profile::Model),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse)
    ),
    tag = "Profiles"
)]
pub async fn upsert_user_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<UpsertUserProfile>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let profile = state
        .services
        .profiles
        .upsert_user_profile(&user_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(profile))
}

/// Create or replace the user's research attestation profile
#[utoipa::path(
    put,
    path = "/api/v1/profiles/:user_id/research",
    params(("user_id" = String, Path, description = "User ID")),
    request_body = UpsertResearchProfile,
    responses(
        (status = 200, description = "Saved research profile", body = research_profile::Model),
        (status = 400, description = "Attestation missing", body = crate::errors::ErrorResponse)
    ),
    tag = "Profiles"
)]
pub async fn upsert_research_profile(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<UpsertResearchProfile>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let profile = state
        .services
        .profiles
        .upsert_research_profile(&user_id, payload)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(profile))
}
