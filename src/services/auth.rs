//! Account service — registration, credential login, Google OAuth.
//!
//! DESIGN
//! ======
//! Passwords are hashed with Argon2id and never leave this module. OAuth
//! users carry no usable password; they are linked by `(provider, subject)`
//! first and by email second, so a local account that later signs in with
//! Google becomes one account, not two.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::services::session::SessionUser;

const MIN_PASSWORD_LEN: usize = 8;
const MAX_EMAIL_LEN: usize = 254;

/// Throwaway mail domains rejected at registration.
const DISPOSABLE_DOMAINS: &[&str] = &[
    "10minutemail.com",
    "guerrillamail.com",
    "mailinator.com",
    "maildrop.cc",
    "sharklasers.com",
    "temp-mail.org",
    "tempmail.org",
    "yopmail.com",
];

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email address")]
    InvalidEmail,
    #[error("disposable email addresses are not allowed")]
    DisposableEmail,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("invalid role")]
    InvalidRole,
    #[error("user already exists")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("account is blocked")]
    Blocked,
    #[error("account is deactivated")]
    Deactivated,
    #[error("account already verified")]
    AlreadyVerified,
    #[error("user not found")]
    UserNotFound,
    #[error("password hashing failed")]
    PasswordHash,
    #[error("oauth token exchange failed: {0}")]
    TokenExchange(String),
    #[error("oauth api error: {0}")]
    OAuthApi(String),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::DisposableEmail => "E_DISPOSABLE_EMAIL",
            Self::WeakPassword => "E_WEAK_PASSWORD",
            Self::InvalidRole => "E_INVALID_ROLE",
            Self::EmailTaken => "E_EMAIL_TAKEN",
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::Blocked => "E_ACCOUNT_BLOCKED",
            Self::Deactivated => "E_ACCOUNT_DEACTIVATED",
            Self::AlreadyVerified => "E_ALREADY_VERIFIED",
            Self::UserNotFound => "E_USER_NOT_FOUND",
            Self::PasswordHash => "E_PASSWORD_HASH",
            Self::TokenExchange(_) => "E_TOKEN_EXCHANGE",
            Self::OAuthApi(_) => "E_OAUTH_API",
            Self::Db(_) => "E_DATABASE",
        }
    }
}

// =============================================================================
// EMAIL VALIDATION
// =============================================================================

/// Normalize and validate an email address. Returns the lowercased form.
#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    if normalized.is_empty() || normalized.len() > MAX_EMAIL_LEN {
        return None;
    }
    let parts = normalized.split('@').collect::<Vec<_>>();
    if parts.len() != 2 || parts[0].is_empty() || parts[1].is_empty() || !parts[1].contains('.') {
        return None;
    }
    if normalized.chars().any(char::is_whitespace) {
        return None;
    }
    Some(normalized)
}

/// Check whether a normalized email's domain is a known throwaway provider.
#[must_use]
pub fn is_disposable(email: &str) -> bool {
    email
        .split('@')
        .nth(1)
        .map(|domain| DISPOSABLE_DOMAINS.contains(&domain))
        .unwrap_or(false)
}

fn validate_email(email: &str) -> Result<String, AuthError> {
    let normalized = normalize_email(email).ok_or(AuthError::InvalidEmail)?;
    if is_disposable(&normalized) {
        return Err(AuthError::DisposableEmail);
    }
    Ok(normalized)
}

// =============================================================================
// PASSWORDS
// =============================================================================

/// Hash a password using Argon2id.
fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|_| AuthError::PasswordHash)
}

/// Verify a password against a stored Argon2 hash.
fn verify_password(password: &str, hash: &str) -> Result<(), AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidCredentials)?;
    let argon2 = Argon2::default();

    argon2
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AuthError::InvalidCredentials)
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

// =============================================================================
// REGISTRATION / LOGIN
// =============================================================================

fn session_user_from_row(row: &sqlx::postgres::PgRow) -> SessionUser {
    SessionUser {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        role: row.get("role"),
        verified: row.get("verified"),
        avatar_url: row.get("avatar_url"),
    }
}

/// Register a local account. Accounts start unverified; the OTP flow
/// upgrades them. Admin accounts are never self-service.
pub async fn register_user(
    pool: &PgPool,
    name: &str,
    email: &str,
    password: &str,
    role: &str,
) -> Result<SessionUser, AuthError> {
    let normalized = validate_email(email)?;
    validate_password(password)?;
    if !matches!(role, "traveler" | "guide") {
        return Err(AuthError::InvalidRole);
    }

    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&normalized)
        .fetch_one(pool)
        .await?;
    if exists {
        return Err(AuthError::EmailTaken);
    }

    let password_hash = hash_password(password)?;
    let row = sqlx::query(
        r"INSERT INTO users (name, email, password_hash, role)
          VALUES ($1, $2, $3, $4)
          RETURNING id, name, email, role, verified, avatar_url",
    )
    .bind(name)
    .bind(&normalized)
    .bind(&password_hash)
    .bind(role)
    .fetch_one(pool)
    .await?;

    Ok(session_user_from_row(&row))
}

/// Verify credentials for login. Stamps `last_login_at` on success.
pub async fn verify_credentials(pool: &PgPool, email: &str, password: &str) -> Result<SessionUser, AuthError> {
    let normalized = normalize_email(email).ok_or(AuthError::InvalidEmail)?;

    let row = sqlx::query(
        r"SELECT id, name, email, role, verified, avatar_url, password_hash, is_active, is_blocked
          FROM users WHERE email = $1",
    )
    .bind(&normalized)
    .fetch_optional(pool)
    .await?
    .ok_or(AuthError::InvalidCredentials)?;

    if row.get::<bool, _>("is_blocked") {
        return Err(AuthError::Blocked);
    }
    if !row.get::<bool, _>("is_active") {
        return Err(AuthError::Deactivated);
    }

    let password_hash: Option<String> = row.get("password_hash");
    let password_hash = password_hash.ok_or(AuthError::InvalidCredentials)?;
    verify_password(password, &password_hash)?;

    let user = session_user_from_row(&row);
    sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
        .bind(user.id)
        .execute(pool)
        .await?;

    Ok(user)
}

/// Change an authenticated user's password after verifying the current one.
pub async fn change_password(
    pool: &PgPool,
    user_id: Uuid,
    current_password: &str,
    new_password: &str,
) -> Result<(), AuthError> {
    validate_password(new_password)?;

    let stored: Option<String> = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(AuthError::UserNotFound)?;
    let stored = stored.ok_or(AuthError::InvalidCredentials)?;
    verify_password(current_password, &stored)?;

    let new_hash = hash_password(new_password)?;
    sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE id = $2")
        .bind(&new_hash)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Replace a user's password after an OTP-verified reset.
pub async fn reset_password(pool: &PgPool, email: &str, new_password: &str) -> Result<(), AuthError> {
    validate_password(new_password)?;
    let new_hash = hash_password(new_password)?;

    let result = sqlx::query("UPDATE users SET password_hash = $1, updated_at = now() WHERE email = $2")
        .bind(&new_hash)
        .bind(email)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(AuthError::UserNotFound);
    }
    Ok(())
}

/// Mark a user's email verified after an OTP check.
pub async fn mark_verified(pool: &PgPool, email: &str) -> Result<(), AuthError> {
    let result = sqlx::query(
        "UPDATE users SET verified = TRUE, email_verified_at = now(), updated_at = now() WHERE email = $1",
    )
    .bind(email)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(AuthError::UserNotFound);
    }
    Ok(())
}

/// Promote the account named by `ADMIN_EMAIL` (if set) to the admin role.
/// Called once at startup; a no-op when unset or the account doesn't exist.
pub async fn promote_admin_from_env(pool: &PgPool) -> Result<(), AuthError> {
    let Some(email) = std::env::var("ADMIN_EMAIL").ok().and_then(|e| normalize_email(&e)) else {
        return Ok(());
    };

    let result = sqlx::query("UPDATE users SET role = 'admin', updated_at = now() WHERE email = $1")
        .bind(&email)
        .execute(pool)
        .await?;
    if result.rows_affected() > 0 {
        tracing::info!(%email, "admin account promoted from ADMIN_EMAIL");
    } else {
        tracing::warn!(%email, "ADMIN_EMAIL set but no matching account exists yet");
    }
    Ok(())
}

// =============================================================================
// GOOGLE OAUTH
// =============================================================================

/// Google OAuth configuration loaded from environment.
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
}

impl GoogleConfig {
    /// Load from `GOOGLE_CLIENT_ID`, `GOOGLE_CLIENT_SECRET`, `GOOGLE_REDIRECT_URI`.
    /// Returns `None` if any are missing (OAuth login will be disabled).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID").ok()?;
        let client_secret = std::env::var("GOOGLE_CLIENT_SECRET").ok()?;
        let redirect_uri = std::env::var("GOOGLE_REDIRECT_URI").ok()?;
        Some(Self { client_id, client_secret, redirect_uri })
    }

    /// Build the Google authorization URL with a CSRF state token.
    #[must_use]
    pub fn authorize_url(&self, state: &str) -> String {
        format!(
            "https://accounts.google.com/o/oauth2/v2/auth?client_id={}&redirect_uri={}&response_type=code&scope=openid%20email%20profile&state={state}",
            self.client_id, self.redirect_uri
        )
    }
}

#[derive(Debug, serde::Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, serde::Deserialize)]
pub struct GoogleUser {
    pub sub: String,
    pub name: Option<String>,
    pub email: String,
    pub picture: Option<String>,
}

/// Exchange an OAuth code for an access token.
pub async fn exchange_code(config: &GoogleConfig, code: &str) -> Result<String, AuthError> {
    let client = reqwest::Client::new();
    let resp = client
        .post("https://oauth2.googleapis.com/token")
        .form(&[
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", config.redirect_uri.as_str()),
        ])
        .send()
        .await
        .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

    let body = resp
        .text()
        .await
        .map_err(|e| AuthError::TokenExchange(e.to_string()))?;
    let token_resp: TokenResponse =
        serde_json::from_str(&body).map_err(|_| AuthError::TokenExchange(format!("unexpected response: {body}")))?;
    Ok(token_resp.access_token)
}

/// Fetch the authenticated Google user's profile.
pub async fn fetch_google_user(access_token: &str) -> Result<GoogleUser, AuthError> {
    let client = reqwest::Client::new();
    let resp = client
        .get("https://openidconnect.googleapis.com/v1/userinfo")
        .header("Authorization", format!("Bearer {access_token}"))
        .send()
        .await
        .map_err(|e| AuthError::OAuthApi(e.to_string()))?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        return Err(AuthError::OAuthApi(format!("{status}: {body}")));
    }

    resp.json::<GoogleUser>()
        .await
        .map_err(|e| AuthError::OAuthApi(e.to_string()))
}

/// Upsert a user from their Google profile. Links by `(provider, subject)`
/// first, then by email, else creates a pre-verified traveler.
pub async fn upsert_oauth_user(pool: &PgPool, google: &GoogleUser) -> Result<SessionUser, AuthError> {
    let email = validate_email(&google.email)?;
    let name = google
        .name
        .clone()
        .unwrap_or_else(|| email.split('@').next().unwrap_or("traveler").to_owned());

    let linked = sqlx::query(
        r"SELECT id, name, email, role, verified, avatar_url
          FROM users
          WHERE oauth_provider = 'google' AND oauth_subject = $1",
    )
    .bind(&google.sub)
    .fetch_optional(pool)
    .await?;

    let row = if let Some(row) = linked {
        row
    } else {
        let by_email: Option<Uuid> = sqlx::query_scalar("SELECT id FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(pool)
            .await?;

        if let Some(user_id) = by_email {
            // Link the existing local account; OAuth emails count as verified.
            sqlx::query(
                r"UPDATE users
                  SET oauth_provider = 'google',
                      oauth_subject = $1,
                      avatar_url = COALESCE($2, avatar_url),
                      verified = TRUE,
                      email_verified_at = COALESCE(email_verified_at, now()),
                      updated_at = now()
                  WHERE id = $3
                  RETURNING id, name, email, role, verified, avatar_url",
            )
            .bind(&google.sub)
            .bind(&google.picture)
            .bind(user_id)
            .fetch_one(pool)
            .await?
        } else {
            sqlx::query(
                r"INSERT INTO users (name, email, oauth_provider, oauth_subject, avatar_url, verified, email_verified_at)
                  VALUES ($1, $2, 'google', $3, $4, TRUE, now())
                  RETURNING id, name, email, role, verified, avatar_url",
            )
            .bind(&name)
            .bind(&email)
            .bind(&google.sub)
            .bind(&google.picture)
            .fetch_one(pool)
            .await?
        }
    };

    let user = session_user_from_row(&row);
    sqlx::query("UPDATE users SET last_login_at = now() WHERE id = $1")
        .bind(user.id)
        .execute(pool)
        .await?;

    Ok(user)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
