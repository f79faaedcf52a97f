//! Tour routes — host CRUD, public listings, admin moderation.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::{AdminUser, AuthUser};
use crate::services::tour::{self, NewTour, TourPage, TourPatch, TourRow, TourStatus};
use crate::state::AppState;

pub(crate) fn tour_error_to_status(err: &tour::TourError) -> StatusCode {
    use tour::TourError;
    match err {
        TourError::NotFound(_) => StatusCode::NOT_FOUND,
        TourError::Forbidden | TourError::HostNotVerified => StatusCode::FORBIDDEN,
        TourError::WrongState(_) | TourError::InvalidTransition => StatusCode::CONFLICT,
        TourError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

type TourResult<T> = Result<Json<T>, (StatusCode, String)>;

fn map_err<T>(result: Result<T, tour::TourError>) -> Result<T, (StatusCode, String)> {
    result.map_err(|e| (tour_error_to_status(&e), e.to_string()))
}

// =============================================================================
// HOST ENDPOINTS
// =============================================================================

/// `POST /api/tours` — submit a tour for approval.
pub async fn create_tour(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewTour>,
) -> Result<(StatusCode, Json<TourRow>), (StatusCode, String)> {
    let row = map_err(tour::create_tour(&state.pool, &auth.user, &body).await)?;
    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Deserialize)]
pub struct StatusFilterQuery {
    status: Option<String>,
}

fn parse_status_filter(raw: Option<&str>) -> Result<Option<TourStatus>, (StatusCode, String)> {
    match raw {
        None | Some("all") => Ok(None),
        Some(s) => TourStatus::from_str(s)
            .map(Some)
            .ok_or((StatusCode::BAD_REQUEST, format!("unknown status: {s}"))),
    }
}

/// `GET /api/tours/mine` — the host's own tours, optionally filtered.
pub async fn my_tours(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<StatusFilterQuery>,
) -> TourResult<Vec<TourRow>> {
    let status = parse_status_filter(query.status.as_deref())?;
    let rows = map_err(tour::list_for_host(&state.pool, auth.user.id, status).await)?;
    Ok(Json(rows))
}

/// `PATCH /api/tours/{id}` — edit an own pending tour.
pub async fn update_tour(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tour_id): Path<Uuid>,
    Json(body): Json<TourPatch>,
) -> TourResult<TourRow> {
    let row = map_err(tour::update_tour(&state.pool, tour_id, auth.user.id, &body).await)?;
    Ok(Json(row))
}

/// `DELETE /api/tours/{id}` — host withdraws a pending tour; admin removes any.
pub async fn delete_tour(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tour_id): Path<Uuid>,
) -> TourResult<serde_json::Value> {
    map_err(tour::delete_tour(&state.pool, tour_id, &auth.user).await)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

/// `POST /api/tours/{id}/cancel` — host cancels an approved tour.
pub async fn cancel_tour(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(tour_id): Path<Uuid>,
) -> TourResult<TourRow> {
    let row = map_err(tour::cancel_tour(&state.pool, tour_id, auth.user.id).await)?;
    Ok(Json(row))
}

// =============================================================================
// PUBLIC ENDPOINTS
// =============================================================================

/// `GET /api/tours` — approved tours, newest first.
pub async fn list_approved_tours(State(state): State<AppState>) -> TourResult<Vec<TourRow>> {
    let rows = map_err(tour::list_approved(&state.pool).await)?;
    Ok(Json(rows))
}

/// `GET /api/tours/{id}` — single-tour detail with host and approver names.
pub async fn tour_detail(State(state): State<AppState>, Path(tour_id): Path<Uuid>) -> TourResult<TourRow> {
    let row = map_err(tour::tour_details(&state.pool, tour_id).await)?;
    Ok(Json(row))
}

// =============================================================================
// ADMIN ENDPOINTS
// =============================================================================

#[derive(Deserialize)]
pub struct AdminListQuery {
    status: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

/// `GET /api/admin/tours` — paginated listing across all hosts.
pub async fn admin_list_tours(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminListQuery>,
) -> TourResult<TourPage> {
    let status = parse_status_filter(query.status.as_deref())?;
    let page = map_err(
        tour::list_all(&state.pool, status, query.page.unwrap_or(1), query.limit.unwrap_or(10)).await,
    )?;
    Ok(Json(page))
}

#[derive(Deserialize)]
pub struct DecisionBody {
    status: String,
    admin_notes: Option<String>,
}

/// `POST /api/admin/tours/{id}/decision` — approve or reject a pending tour.
pub async fn admin_decide_tour(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(tour_id): Path<Uuid>,
    Json(body): Json<DecisionBody>,
) -> TourResult<TourRow> {
    let decision = match TourStatus::from_str(&body.status) {
        Some(s @ (TourStatus::Approved | TourStatus::Rejected)) => s,
        _ => return Err((StatusCode::BAD_REQUEST, "status must be approved or rejected".into())),
    };

    let row = map_err(
        tour::decide_tour(&state.pool, tour_id, admin.user.id, decision, body.admin_notes.as_deref()).await,
    )?;
    Ok(Json(row))
}
