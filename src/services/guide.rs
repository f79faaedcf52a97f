//! Guide application service — submission, public listing, admin decision.
//!
//! DESIGN
//! ======
//! Applications hang off user accounts; approval flips `users.role` to
//! `guide` in the same transaction as the decision. One pending application
//! per user, enforced by a partial unique index and surfaced as a typed
//! error.

use std::sync::Arc;

use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::services::mail::{self, MailSender};
use crate::services::session::SessionUser;

const MIN_HOURLY_RATE: f64 = 100.0;
const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;

#[derive(Debug, thiserror::Error)]
pub enum GuideError {
    #[error("phone must be {MIN_PHONE_DIGITS}-{MAX_PHONE_DIGITS} digits")]
    InvalidPhone,
    #[error("hourly rate must be at least {MIN_HOURLY_RATE}")]
    RateTooLow,
    #[error("experience, bio, languages and destinations are required")]
    MissingFields,
    #[error("an application is already under review")]
    AlreadyPending,
    #[error("application not found: {0}")]
    NotFound(Uuid),
    #[error("application is not pending")]
    NotPending,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

// =============================================================================
// TYPES
// =============================================================================

/// Applicant-supplied fields.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewApplication {
    pub phone: String,
    pub experience: String,
    pub languages: Vec<String>,
    pub destinations: Vec<String>,
    pub bio: String,
    pub hourly_rate: f64,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ApplicationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub applicant_name: String,
    pub applicant_email: String,
    pub phone: String,
    pub experience: String,
    pub languages: Vec<String>,
    pub destinations: Vec<String>,
    pub bio: String,
    pub hourly_rate: f64,
    pub status: String,
    pub admin_notes: Option<String>,
    pub rating: f64,
    pub tours_completed: i32,
    pub created_at: Option<String>,
}

/// A page of approved guides plus the unpaginated total.
#[derive(Debug, serde::Serialize)]
pub struct GuidePage {
    pub guides: Vec<ApplicationRow>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// Normalize a phone number to digits and check its length.
pub fn normalize_phone(phone: &str) -> Result<String, GuideError> {
    let digits: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    if digits.len() < MIN_PHONE_DIGITS || digits.len() > MAX_PHONE_DIGITS || !digits.chars().all(|c| c.is_ascii_digit())
    {
        return Err(GuideError::InvalidPhone);
    }
    Ok(digits)
}

fn validate_application(app: &NewApplication) -> Result<String, GuideError> {
    let phone = normalize_phone(&app.phone)?;
    if !app.hourly_rate.is_finite() || app.hourly_rate < MIN_HOURLY_RATE {
        return Err(GuideError::RateTooLow);
    }
    if app.experience.trim().is_empty()
        || app.bio.trim().is_empty()
        || app.languages.iter().all(|l| l.trim().is_empty())
        || app.destinations.iter().all(|d| d.trim().is_empty())
    {
        return Err(GuideError::MissingFields);
    }
    Ok(phone)
}

// =============================================================================
// SUBMISSION
// =============================================================================

fn application_from_row(row: &sqlx::postgres::PgRow) -> ApplicationRow {
    ApplicationRow {
        id: row.get("id"),
        user_id: row.get("user_id"),
        applicant_name: row.get("applicant_name"),
        applicant_email: row.get("applicant_email"),
        phone: row.get("phone"),
        experience: row.get("experience"),
        languages: row.get("languages"),
        destinations: row.get("destinations"),
        bio: row.get("bio"),
        hourly_rate: row.get("hourly_rate"),
        status: row.get("status"),
        admin_notes: row.get("admin_notes"),
        rating: row.get("rating"),
        tours_completed: row.get("tours_completed"),
        created_at: row.get("created_at"),
    }
}

const APPLICATION_SELECT: &str = r"
    SELECT g.id, g.user_id, u.name AS applicant_name, u.email AS applicant_email,
           g.phone, g.experience, g.languages, g.destinations, g.bio,
           g.hourly_rate, g.status, g.admin_notes, g.rating, g.tours_completed,
           to_char(g.created_at, 'YYYY-MM-DD HH24:MI') AS created_at
    FROM guide_applications g
    JOIN users u ON u.id = g.user_id";

/// Submit a guide application for the authenticated user.
pub async fn apply(pool: &PgPool, user: &SessionUser, app: &NewApplication) -> Result<ApplicationRow, GuideError> {
    let phone = validate_application(app)?;

    let pending: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM guide_applications WHERE user_id = $1 AND status = 'pending')",
    )
    .bind(user.id)
    .fetch_one(pool)
    .await?;
    if pending {
        return Err(GuideError::AlreadyPending);
    }

    let languages: Vec<String> = app.languages.iter().map(|l| l.trim().to_owned()).filter(|l| !l.is_empty()).collect();
    let destinations: Vec<String> =
        app.destinations.iter().map(|d| d.trim().to_owned()).filter(|d| !d.is_empty()).collect();

    let id: Uuid = sqlx::query_scalar(
        r"INSERT INTO guide_applications (user_id, phone, experience, languages, destinations, bio, hourly_rate)
          VALUES ($1, $2, $3, $4, $5, $6, $7)
          RETURNING id",
    )
    .bind(user.id)
    .bind(&phone)
    .bind(app.experience.trim())
    .bind(&languages)
    .bind(&destinations)
    .bind(app.bio.trim())
    .bind(app.hourly_rate)
    .fetch_one(pool)
    .await?;

    tracing::info!(application_id = %id, user_id = %user.id, "guide application submitted");
    application_details(pool, id).await
}

/// Fire-and-forget admin notification for a new application. Failure is
/// logged and never blocks the submission.
pub fn notify_admin_fire_and_forget(mailer: Option<Arc<dyn MailSender>>, row: &ApplicationRow) {
    let Some(mailer) = mailer else {
        return;
    };
    let Ok(admin_email) = std::env::var("ADMIN_EMAIL") else {
        return;
    };

    let html = mail::render_guide_application_email(
        &row.applicant_name,
        &row.applicant_email,
        &row.destinations,
        row.hourly_rate,
    );
    let application_id = row.id;
    tokio::spawn(async move {
        if let Err(e) = mailer.send(&admin_email, "New Guide Application Received", &html).await {
            tracing::warn!(error = %e, %application_id, "admin notification mail failed");
        }
    });
}

// =============================================================================
// MODERATION
// =============================================================================

/// Admin listing of pending applications, oldest first.
pub async fn list_pending(pool: &PgPool) -> Result<Vec<ApplicationRow>, GuideError> {
    let rows = sqlx::query(&format!(
        "{APPLICATION_SELECT} WHERE g.status = 'pending' ORDER BY g.created_at ASC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(application_from_row).collect())
}

/// Apply an admin decision. Approval promotes the applicant's role in the
/// same transaction so the two writes cannot diverge.
pub async fn decide(
    pool: &PgPool,
    application_id: Uuid,
    admin_id: Uuid,
    approve: bool,
    notes: Option<&str>,
) -> Result<ApplicationRow, GuideError> {
    let status = if approve { "approved" } else { "rejected" };

    let mut tx = pool.begin().await?;

    let updated = sqlx::query(
        r"UPDATE guide_applications
          SET status = $1, admin_notes = $2, decided_by = $3, decided_at = now()
          WHERE id = $4 AND status = 'pending'
          RETURNING user_id",
    )
    .bind(status)
    .bind(notes)
    .bind(admin_id)
    .bind(application_id)
    .fetch_optional(tx.as_mut())
    .await?;

    let Some(row) = updated else {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM guide_applications WHERE id = $1)")
            .bind(application_id)
            .fetch_one(tx.as_mut())
            .await?;
        return Err(if exists { GuideError::NotPending } else { GuideError::NotFound(application_id) });
    };
    let user_id: Uuid = row.get("user_id");

    if approve {
        sqlx::query("UPDATE users SET role = 'guide', updated_at = now() WHERE id = $1")
            .bind(user_id)
            .execute(tx.as_mut())
            .await?;
    }
    tx.commit().await?;

    tracing::info!(%application_id, %user_id, status, "guide application decided");
    application_details(pool, application_id).await
}

// =============================================================================
// PUBLIC LISTING
// =============================================================================

/// Approved guides with optional case-insensitive destination/language
/// filters, ordered by rating then track record.
pub async fn list_approved(
    pool: &PgPool,
    destination: Option<&str>,
    language: Option<&str>,
    page: i64,
    limit: i64,
) -> Result<GuidePage, GuideError> {
    let page = page.max(1);
    let limit = limit.clamp(1, 100);

    let filter = r"
        g.status = 'approved'
        AND ($1::text IS NULL OR EXISTS (
            SELECT 1 FROM unnest(g.destinations) d WHERE d ILIKE '%' || $1 || '%'
        ))
        AND ($2::text IS NULL OR EXISTS (
            SELECT 1 FROM unnest(g.languages) l WHERE l ILIKE '%' || $2 || '%'
        ))";

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM guide_applications g WHERE {filter}"))
        .bind(destination)
        .bind(language)
        .fetch_one(pool)
        .await?;

    let rows = sqlx::query(&format!(
        "{APPLICATION_SELECT}
         WHERE {filter}
         ORDER BY g.rating DESC, g.tours_completed DESC
         LIMIT $3 OFFSET $4"
    ))
    .bind(destination)
    .bind(language)
    .bind(limit)
    .bind((page - 1) * limit)
    .fetch_all(pool)
    .await?;

    Ok(GuidePage {
        guides: rows.iter().map(application_from_row).collect(),
        total,
        page,
        total_pages: (total + limit - 1) / limit,
    })
}

/// Single application with applicant identity.
pub async fn application_details(pool: &PgPool, application_id: Uuid) -> Result<ApplicationRow, GuideError> {
    let row = sqlx::query(&format!("{APPLICATION_SELECT} WHERE g.id = $1"))
        .bind(application_id)
        .fetch_optional(pool)
        .await?
        .ok_or(GuideError::NotFound(application_id))?;
    Ok(application_from_row(&row))
}

#[cfg(test)]
#[path = "guide_test.rs"]
mod tests;
