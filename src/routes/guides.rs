//! Guide application routes — apply, public listing, admin moderation.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use super::auth::{AdminUser, AuthUser};
use crate::services::guide::{self, ApplicationRow, GuidePage, NewApplication};
use crate::state::AppState;

pub(crate) fn guide_error_to_status(err: &guide::GuideError) -> StatusCode {
    use guide::GuideError;
    match err {
        GuideError::NotFound(_) => StatusCode::NOT_FOUND,
        GuideError::AlreadyPending | GuideError::NotPending => StatusCode::CONFLICT,
        GuideError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        _ => StatusCode::BAD_REQUEST,
    }
}

fn map_err<T>(result: Result<T, guide::GuideError>) -> Result<T, (StatusCode, String)> {
    result.map_err(|e| (guide_error_to_status(&e), e.to_string()))
}

/// `POST /api/guides/apply` — submit an application. Notifies the admin
/// mailbox best-effort.
pub async fn apply_guide(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewApplication>,
) -> Result<(StatusCode, Json<ApplicationRow>), (StatusCode, String)> {
    let row = map_err(guide::apply(&state.pool, &auth.user, &body).await)?;
    guide::notify_admin_fire_and_forget(state.mailer.clone(), &row);
    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Deserialize)]
pub struct GuideListQuery {
    destination: Option<String>,
    language: Option<String>,
    page: Option<i64>,
    limit: Option<i64>,
}

/// `GET /api/guides` — approved guides with optional filters, paginated.
pub async fn list_guides(
    State(state): State<AppState>,
    Query(query): Query<GuideListQuery>,
) -> Result<Json<GuidePage>, (StatusCode, String)> {
    let page = map_err(
        guide::list_approved(
            &state.pool,
            query.destination.as_deref(),
            query.language.as_deref(),
            query.page.unwrap_or(1),
            query.limit.unwrap_or(10),
        )
        .await,
    )?;
    Ok(Json(page))
}

/// `GET /api/admin/guides` — pending applications, oldest first.
pub async fn admin_list_applications(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<Vec<ApplicationRow>>, (StatusCode, String)> {
    let rows = map_err(guide::list_pending(&state.pool).await)?;
    Ok(Json(rows))
}

#[derive(Deserialize)]
pub struct DecisionBody {
    status: String,
    admin_notes: Option<String>,
}

/// `POST /api/admin/guides/{id}/decision` — approve (promoting the user to
/// the guide role) or reject a pending application.
pub async fn admin_decide_application(
    State(state): State<AppState>,
    admin: AdminUser,
    Path(application_id): Path<Uuid>,
    Json(body): Json<DecisionBody>,
) -> Result<Json<ApplicationRow>, (StatusCode, String)> {
    let approve = match body.status.as_str() {
        "approved" => true,
        "rejected" => false,
        _ => return Err((StatusCode::BAD_REQUEST, "status must be approved or rejected".into())),
    };

    let row = map_err(
        guide::decide(&state.pool, application_id, admin.user.id, approve, body.admin_notes.as_deref()).await,
    )?;
    Ok(Json(row))
}
