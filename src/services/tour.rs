//! Tour service — listing CRUD and the moderation state machine.
//!
//! DESIGN
//! ======
//! A tour's lifecycle is a four-state machine over its `status` column:
//! `pending` at creation, `approved` or `rejected` by admin decision, and
//! `cancelled` by the host once approved. Transitions are enforced with
//! conditional UPDATEs so concurrent decisions cannot double-apply.
//!
//! Hosts may edit or withdraw only their own pending tours; moderation
//! fields never pass through host updates.

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::frame::now_ms;
use crate::services::session::SessionUser;

const MAX_TITLE_LEN: usize = 100;
const MAX_DESCRIPTION_LEN: usize = 1000;
const MAX_NOTES_LEN: usize = 500;
const MAX_PARTICIPANTS: i32 = 50;
const MAX_DURATION_DAYS: i32 = 30;

const MS_PER_DAY: i64 = 86_400_000;

/// Category labels accepted at creation.
pub const CATEGORIES: &[&str] = &[
    "Adventure",
    "Cultural",
    "Historical",
    "Nature",
    "Food",
    "City",
    "Beach",
    "Mountain",
    "Other",
];

/// Difficulty labels accepted at creation.
pub const DIFFICULTIES: &[&str] = &["Easy", "Moderate", "Hard", "Expert"];

// =============================================================================
// STATUS
// =============================================================================

/// Moderation status of a tour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourStatus {
    Pending,
    Approved,
    Rejected,
    Cancelled,
}

impl TourStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Allowed edges of the status machine. Everything else is an error.
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Pending, Self::Approved) | (Self::Pending, Self::Rejected) | (Self::Approved, Self::Cancelled)
        )
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum TourError {
    #[error("title must be 1-{MAX_TITLE_LEN} characters")]
    InvalidTitle,
    #[error("description must be 1-{MAX_DESCRIPTION_LEN} characters")]
    InvalidDescription,
    #[error("location is required")]
    InvalidLocation,
    #[error("price must not be negative")]
    InvalidPrice,
    #[error("max participants must be 1-{MAX_PARTICIPANTS}")]
    InvalidParticipants,
    #[error("start date must be in the future")]
    StartNotFuture,
    #[error("end date must be after start date")]
    EndBeforeStart,
    #[error("tours are capped at {MAX_DURATION_DAYS} days")]
    TooLong,
    #[error("unknown category")]
    InvalidCategory,
    #[error("unknown difficulty")]
    InvalidDifficulty,
    #[error("admin notes must be at most {MAX_NOTES_LEN} characters")]
    NotesTooLong,
    #[error("verify your email before hosting tours")]
    HostNotVerified,
    #[error("tour not found: {0}")]
    NotFound(Uuid),
    #[error("not your tour")]
    Forbidden,
    #[error("tour is not {0}")]
    WrongState(&'static str),
    #[error("invalid status transition")]
    InvalidTransition,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// =============================================================================
// TYPES
// =============================================================================

/// Host-supplied tour fields. Dates are epoch milliseconds; duration is
/// derived, never accepted from the client.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewTour {
    pub title: String,
    pub description: String,
    pub location: String,
    pub price: f64,
    pub max_participants: i32,
    pub start_ms: i64,
    pub end_ms: i64,
    pub category: String,
    pub difficulty: String,
}

/// Host-editable subset for updates. Moderation fields are not here on
/// purpose.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct TourPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub price: Option<f64>,
    pub max_participants: Option<i32>,
    pub start_ms: Option<i64>,
    pub end_ms: Option<i64>,
    pub category: Option<String>,
    pub difficulty: Option<String>,
}

/// A tour row with host identity joined in.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TourRow {
    pub id: Uuid,
    pub host_id: Uuid,
    pub host_name: String,
    pub host_email: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub duration_days: i32,
    pub price: f64,
    pub max_participants: i32,
    pub start_ms: i64,
    pub end_ms: i64,
    pub category: String,
    pub difficulty: String,
    pub status: String,
    pub admin_notes: Option<String>,
    pub approved_by_name: Option<String>,
    pub approved_at: Option<String>,
    pub created_at: Option<String>,
}

/// A page of tours plus the unpaginated total.
#[derive(Debug, serde::Serialize)]
pub struct TourPage {
    pub tours: Vec<TourRow>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Validate host-supplied fields against `now` and derive the duration in
/// days. Split out from the DB path so the rules are testable on their own.
pub fn validate_new_tour(tour: &NewTour, now: i64) -> Result<i32, TourError> {
    let title = tour.title.trim();
    if title.is_empty() || title.chars().count() > MAX_TITLE_LEN {
        return Err(TourError::InvalidTitle);
    }
    let description = tour.description.trim();
    if description.is_empty() || description.chars().count() > MAX_DESCRIPTION_LEN {
        return Err(TourError::InvalidDescription);
    }
    if tour.location.trim().is_empty() {
        return Err(TourError::InvalidLocation);
    }
    if !tour.price.is_finite() || tour.price < 0.0 {
        return Err(TourError::InvalidPrice);
    }
    if tour.max_participants < 1 || tour.max_participants > MAX_PARTICIPANTS {
        return Err(TourError::InvalidParticipants);
    }
    if tour.start_ms <= now {
        return Err(TourError::StartNotFuture);
    }
    if tour.end_ms <= tour.start_ms {
        return Err(TourError::EndBeforeStart);
    }
    if !CATEGORIES.contains(&tour.category.as_str()) {
        return Err(TourError::InvalidCategory);
    }
    if !DIFFICULTIES.contains(&tour.difficulty.as_str()) {
        return Err(TourError::InvalidDifficulty);
    }

    let duration_days = duration_days(tour.start_ms, tour.end_ms);
    if duration_days > MAX_DURATION_DAYS {
        return Err(TourError::TooLong);
    }
    Ok(duration_days)
}

/// Duration in whole days, rounded up. A tour ending mid-day counts the day.
#[must_use]
pub fn duration_days(start_ms: i64, end_ms: i64) -> i32 {
    let span = end_ms.saturating_sub(start_ms).max(0);
    let days = span / MS_PER_DAY + i64::from(span % MS_PER_DAY != 0);
    i32::try_from(days).unwrap_or(i32::MAX)
}

fn validate_notes(notes: Option<&str>) -> Result<(), TourError> {
    if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_LEN) {
        return Err(TourError::NotesTooLong);
    }
    Ok(())
}

// =============================================================================
// CREATE / UPDATE / DELETE
// =============================================================================

fn tour_from_row(row: &sqlx::postgres::PgRow) -> TourRow {
    TourRow {
        id: row.get("id"),
        host_id: row.get("host_id"),
        host_name: row.get("host_name"),
        host_email: row.get("host_email"),
        title: row.get("title"),
        description: row.get("description"),
        location: row.get("location"),
        duration_days: row.get("duration_days"),
        price: row.get("price"),
        max_participants: row.get("max_participants"),
        start_ms: row.get("start_ms"),
        end_ms: row.get("end_ms"),
        category: row.get("category"),
        difficulty: row.get("difficulty"),
        status: row.get("status"),
        admin_notes: row.get("admin_notes"),
        approved_by_name: row.get("approved_by_name"),
        approved_at: row.get("approved_at"),
        created_at: row.get("created_at"),
    }
}

const TOUR_SELECT: &str = r"
    SELECT t.id, t.host_id, h.name AS host_name, h.email AS host_email,
           t.title, t.description, t.location, t.duration_days, t.price,
           t.max_participants, t.start_ms, t.end_ms, t.category, t.difficulty,
           t.status, t.admin_notes, a.name AS approved_by_name,
           to_char(t.approved_at, 'YYYY-MM-DD HH24:MI') AS approved_at,
           to_char(t.created_at, 'YYYY-MM-DD HH24:MI') AS created_at
    FROM tours t
    JOIN users h ON h.id = t.host_id
    LEFT JOIN users a ON a.id = t.approved_by";

/// Create a tour in `pending` state. The host account must be verified.
pub async fn create_tour(pool: &PgPool, host: &SessionUser, tour: &NewTour) -> Result<TourRow, TourError> {
    if !host.verified {
        return Err(TourError::HostNotVerified);
    }
    let duration = validate_new_tour(tour, now_ms())?;

    let id: Uuid = sqlx::query_scalar(
        r"INSERT INTO tours (host_id, title, description, location, duration_days, price,
                             max_participants, start_ms, end_ms, category, difficulty)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
          RETURNING id",
    )
    .bind(host.id)
    .bind(tour.title.trim())
    .bind(tour.description.trim())
    .bind(tour.location.trim())
    .bind(duration)
    .bind(tour.price)
    .bind(tour.max_participants)
    .bind(tour.start_ms)
    .bind(tour.end_ms)
    .bind(&tour.category)
    .bind(&tour.difficulty)
    .fetch_one(pool)
    .await?;

    tracing::info!(tour_id = %id, host_id = %host.id, "tour submitted for approval");
    tour_details(pool, id).await
}

/// Apply a host edit to an own pending tour. The patch is merged onto the
/// stored fields and the whole result re-validated, so a date change cannot
/// smuggle in an over-long duration.
pub async fn update_tour(pool: &PgPool, tour_id: Uuid, host_id: Uuid, patch: &TourPatch) -> Result<TourRow, TourError> {
    let current = fetch_for_host(pool, tour_id, host_id).await?;
    if current.status != TourStatus::Pending.as_str() {
        return Err(TourError::WrongState("pending"));
    }

    let merged = NewTour {
        title: patch.title.clone().unwrap_or(current.title),
        description: patch.description.clone().unwrap_or(current.description),
        location: patch.location.clone().unwrap_or(current.location),
        price: patch.price.unwrap_or(current.price),
        max_participants: patch.max_participants.unwrap_or(current.max_participants),
        start_ms: patch.start_ms.unwrap_or(current.start_ms),
        end_ms: patch.end_ms.unwrap_or(current.end_ms),
        category: patch.category.clone().unwrap_or(current.category),
        difficulty: patch.difficulty.clone().unwrap_or(current.difficulty),
    };
    let duration = validate_new_tour(&merged, now_ms())?;

    sqlx::query(
        r"UPDATE tours
          SET title = $1, description = $2, location = $3, duration_days = $4,
              price = $5, max_participants = $6, start_ms = $7, end_ms = $8,
              category = $9, difficulty = $10, updated_at = now()
          WHERE id = $11 AND host_id = $12 AND status = 'pending'",
    )
    .bind(merged.title.trim())
    .bind(merged.description.trim())
    .bind(merged.location.trim())
    .bind(duration)
    .bind(merged.price)
    .bind(merged.max_participants)
    .bind(merged.start_ms)
    .bind(merged.end_ms)
    .bind(&merged.category)
    .bind(&merged.difficulty)
    .bind(tour_id)
    .bind(host_id)
    .execute(pool)
    .await?;

    tour_details(pool, tour_id).await
}

/// Delete a tour. Hosts may remove only their own pending tours; admins may
/// remove any tour.
pub async fn delete_tour(pool: &PgPool, tour_id: Uuid, user: &SessionUser) -> Result<(), TourError> {
    if user.is_admin() {
        let result = sqlx::query("DELETE FROM tours WHERE id = $1")
            .bind(tour_id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(TourError::NotFound(tour_id));
        }
        return Ok(());
    }

    let current = fetch_for_host(pool, tour_id, user.id).await?;
    if current.status != TourStatus::Pending.as_str() {
        return Err(TourError::WrongState("pending"));
    }

    sqlx::query("DELETE FROM tours WHERE id = $1 AND host_id = $2 AND status = 'pending'")
        .bind(tour_id)
        .bind(user.id)
        .execute(pool)
        .await?;
    Ok(())
}

// =============================================================================
// TRANSITIONS
// =============================================================================

/// Apply an admin decision to a pending tour. Approval stamps the deciding
/// admin and timestamp; both outcomes record the optional notes.
pub async fn decide_tour(
    pool: &PgPool,
    tour_id: Uuid,
    admin_id: Uuid,
    decision: TourStatus,
    notes: Option<&str>,
) -> Result<TourRow, TourError> {
    if !TourStatus::Pending.can_transition(decision) {
        return Err(TourError::InvalidTransition);
    }
    validate_notes(notes)?;

    // Conditional UPDATE: the pending check and the write are one statement,
    // so two admins deciding at once cannot both win.
    let updated = sqlx::query(
        r"UPDATE tours
          SET status = $1,
              admin_notes = COALESCE($2, ''),
              approved_by = CASE WHEN $1 = 'approved' THEN $3 ELSE approved_by END,
              approved_at = CASE WHEN $1 = 'approved' THEN now() ELSE approved_at END,
              updated_at = now()
          WHERE id = $4 AND status = 'pending'
          RETURNING id",
    )
    .bind(decision.as_str())
    .bind(notes)
    .bind(admin_id)
    .bind(tour_id)
    .fetch_optional(pool)
    .await?;

    if updated.is_none() {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM tours WHERE id = $1)")
            .bind(tour_id)
            .fetch_one(pool)
            .await?;
        if !exists {
            return Err(TourError::NotFound(tour_id));
        }
        return Err(TourError::WrongState("pending"));
    }

    tracing::info!(%tour_id, %admin_id, status = decision.as_str(), "tour decision applied");
    tour_details(pool, tour_id).await
}

/// Host cancellation of an approved tour.
pub async fn cancel_tour(pool: &PgPool, tour_id: Uuid, host_id: Uuid) -> Result<TourRow, TourError> {
    let updated = sqlx::query(
        r"UPDATE tours
          SET status = 'cancelled', updated_at = now()
          WHERE id = $1 AND host_id = $2 AND status = 'approved'
          RETURNING id",
    )
    .bind(tour_id)
    .bind(host_id)
    .fetch_optional(pool)
    .await?;

    if updated.is_none() {
        // Distinguish the failure for a useful status code.
        let current = fetch_for_host(pool, tour_id, host_id).await?;
        let status = TourStatus::from_str(&current.status).unwrap_or(TourStatus::Pending);
        if !status.can_transition(TourStatus::Cancelled) {
            return Err(TourError::WrongState("approved"));
        }
        return Err(TourError::NotFound(tour_id));
    }

    tracing::info!(%tour_id, %host_id, "tour cancelled by host");
    tour_details(pool, tour_id).await
}

// =============================================================================
// LISTINGS
// =============================================================================

/// Public listing of approved tours, newest first.
pub async fn list_approved(pool: &PgPool) -> Result<Vec<TourRow>, TourError> {
    let rows = sqlx::query(&format!("{TOUR_SELECT} WHERE t.status = 'approved' ORDER BY t.created_at DESC"))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(tour_from_row).collect())
}

/// Host's own tours with an optional status filter, newest first.
pub async fn list_for_host(pool: &PgPool, host_id: Uuid, status: Option<TourStatus>) -> Result<Vec<TourRow>, TourError> {
    let rows = sqlx::query(&format!(
        "{TOUR_SELECT}
         WHERE t.host_id = $1 AND ($2::text IS NULL OR t.status = $2)
         ORDER BY t.created_at DESC"
    ))
    .bind(host_id)
    .bind(status.map(TourStatus::as_str))
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(tour_from_row).collect())
}

/// Admin listing across all hosts with optional status filter and paging.
pub async fn list_all(
    pool: &PgPool,
    status: Option<TourStatus>,
    page: i64,
    limit: i64,
) -> Result<TourPage, TourError> {
    let page = page.max(1);
    let limit = limit.clamp(1, 100);

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tours WHERE $1::text IS NULL OR status = $1")
        .bind(status.map(TourStatus::as_str))
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query(&format!(
        "{TOUR_SELECT}
         WHERE $1::text IS NULL OR t.status = $1
         ORDER BY t.created_at DESC
         LIMIT $2 OFFSET $3"
    ))
    .bind(status.map(TourStatus::as_str))
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(pool)
    .await?;

    Ok(TourPage {
        tours: rows.iter().map(tour_from_row).collect(),
        total,
        page,
        total_pages: (total + limit - 1) / limit,
    })
}

/// Single-tour detail with host and approver identity.
pub async fn tour_details(pool: &PgPool, tour_id: Uuid) -> Result<TourRow, TourError> {
    let row = sqlx::query(&format!("{TOUR_SELECT} WHERE t.id = $1"))
        .bind(tour_id)
        .fetch_optional(pool)
        .await?
        .ok_or(TourError::NotFound(tour_id))?;
    Ok(tour_from_row(&row))
}

// =============================================================================
// HELPERS
// =============================================================================

/// Fetch a tour and check host ownership.
async fn fetch_for_host(pool: &PgPool, tour_id: Uuid, host_id: Uuid) -> Result<TourRow, TourError> {
    let tour = tour_details(pool, tour_id).await?;
    if tour.host_id != host_id {
        return Err(TourError::Forbidden);
    }
    Ok(tour)
}

#[cfg(test)]
#[path = "tour_test.rs"]
mod tests;
