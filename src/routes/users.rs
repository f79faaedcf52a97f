//! User profile routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use sqlx::Row;
use uuid::Uuid;

use super::auth::AuthUser;
use crate::state::AppState;

#[derive(Serialize)]
pub struct UserProfile {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub verified: bool,
    pub avatar_url: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub member_since: Option<String>,
}

fn profile_from_row(row: &sqlx::postgres::PgRow) -> UserProfile {
    UserProfile {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role: row.get("role"),
        verified: row.get("verified"),
        avatar_url: row.get("avatar_url"),
        phone: row.get("phone"),
        location: row.get("location"),
        bio: row.get("bio"),
        member_since: row.get("member_since"),
    }
}

const PROFILE_SELECT: &str = r"
    SELECT id, name, email, role, verified, avatar_url, phone, location, bio,
           to_char(created_at, 'YYYY-MM-DD') AS member_since
    FROM users";

/// `GET /api/users/me` — the authenticated user's own profile.
/// Password hash and OTP state never leave the database here.
pub async fn me_profile(State(state): State<AppState>, auth: AuthUser) -> Result<Json<UserProfile>, StatusCode> {
    let row = sqlx::query(&format!("{PROFILE_SELECT} WHERE id = $1"))
        .bind(auth.user.id)
        .fetch_optional(&state.pool)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(profile_from_row(&row)))
}

#[derive(Deserialize)]
pub struct UpdateProfileBody {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
}

/// `PATCH /api/users/me` — update the editable profile fields. Email, role,
/// and verification state are not host-editable.
pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateProfileBody>,
) -> Result<Json<UserProfile>, StatusCode> {
    if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let row = sqlx::query(
        r"UPDATE users
          SET name = COALESCE($1, name),
              phone = COALESCE($2, phone),
              location = COALESCE($3, location),
              bio = COALESCE($4, bio),
              updated_at = now()
          WHERE id = $5
          RETURNING id, name, email, role, verified, avatar_url, phone, location, bio,
                    to_char(created_at, 'YYYY-MM-DD') AS member_since",
    )
    .bind(body.name.as_deref().map(str::trim))
    .bind(&body.phone)
    .bind(&body.location)
    .bind(&body.bio)
    .bind(auth.user.id)
    .fetch_optional(&state.pool)
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
    .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(profile_from_row(&row)))
}
