use crate::entities::low_stock_alert::{self, AlertStatus, AlertType};
use crate::handlers::common::{
    map_service_error, success_response, validate_input, PaginatedResponse, PaginationParams,
};
use crate::{errors::ApiError, services::alerts::ReconcileSummary, AppState};
use axum::{
    extract::{Json, Path, Query, State},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

/// Creates the router for stock alert endpoints
pub fn alert_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(list_alerts))
        .route("/reconcile", post(reconcile_alerts))
        .route("/item/:item_id", get(get_alerts_for_item))
        .route("/:id", get(get_alert))
        .route("/:id/acknowledge", post(acknowledge_alert))
        .route("/:id/resolve", post(resolve_alert))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct AlertListQuery {
    pub status: Option<AlertStatus>,
    pub alert_type: Option<AlertType>,
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

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct AcknowledgeRequest {
    #[validate(length(min = 1, message = "acknowledged_by is required"))]
    pub acknowledged_by: String,
}

/// List alerts, filterable by status and type
#[utoipa::path(
    get,
    path = "/api/v1/alerts",
    params(AlertListQuery),
    responses(
        (status = 200, description = "Stock alerts", body = Vec<low_stock_alert::Model>)
    ),
    tag = "Alerts"
)]
pub async fn list_alerts(
    State(state): State<AppState>,
    Query(query): Query<AlertListQuery>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let pagination = PaginationParams {
        page: query.page,
        per_page: query.per_page,
    };
    let (page, per_page) = pagination.clamped(&state.config);
    let (alerts, total) = state
        .services
        .alerts
        .list_alerts(query.status, query.alert_type, page, per_page)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(PaginatedResponse::new(
        alerts, page, per_page, total,
    )))
}

/// Get an alert by ID
#[utoipa::path(
    get,
    path = "/api/v1/alerts/:id",
    params(("id" = Uuid, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Stock alert", body = low_stock_alert::Model),
        (status = 404, description = "Alert not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Alerts"
)]
pub async fn get_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let alert = state
        .services
        .alerts
        .get_alert(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(alert))
}

/// All alerts raised against one inventory item
#[utoipa::path(
    get,
    path = "/api/v1/alerts/item/:item_id",
    params(("item_id" = Uuid, Path, description = "Inventory item ID")),
    responses(
        (status = 200, description = "Alerts for the item", body = Vec<low_stock_alert::Model>)
    ),
    tag = "Alerts"
)]
pub async fn get_alerts_for_item(
    State(state): State<AppState>,
    Path(item_id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let alerts = state
        .services
        .alerts
        .get_alerts_for_item(item_id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(alerts))
}

/// Mark an alert as seen by an operator
#[utoipa::path(
    post,
    path = "/api/v1/alerts/:id/acknowledge",
    params(("id" = Uuid, Path, description = "Alert ID")),
    request_body = AcknowledgeRequest,
    responses(
        (status = 200, description = "Alert acknowledged", body = low_stock_alert::Model),
        (status = 400, description = "Alert already resolved", body = crate::errors::ErrorResponse),
        (status = 404, description = "Alert not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Alerts"
)]
pub async fn acknowledge_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AcknowledgeRequest>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    validate_input(&payload)?;

    let alert = state
        .services
        .alerts
        .acknowledge_alert(id, payload.acknowledged_by)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(alert))
}

/// Manually resolve an alert. Idempotent.
#[utoipa::path(
    post,
    path = "/api/v1/alerts/:id/resolve",
    params(("id" = Uuid, Path, description = "Alert ID")),
    responses(
        (status = 200, description = "Alert resolved", body = low_stock_alert::Model),
        (status = 404, description = "Alert not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Alerts"
)]
pub async fn resolve_alert(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let alert = state
        .services
        .alerts
        .resolve_alert(id)
        .await
        .map_err(map_service_error)?;

    Ok(success_response(alert))
}

/// Sweep every item and raise or resolve alerts to match current stock
#[utoipa::path(
    post,
    path = "/api/v1/alerts/reconcile",
    responses(
        (status = 200, description = "Reconciliation summary", body = ReconcileSummary)
    ),
    tag = "Alerts"
)]
pub async fn reconcile_alerts(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ApiError> {
    let summary = state
        .services
        .alerts
        .reconcile_alerts()
        .await
        .map_err(map_service_error)?;

    Ok(success_response(summary))
}
