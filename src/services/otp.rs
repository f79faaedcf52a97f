//! One-time code service.
//!
//! Creates and verifies short-lived six-digit codes for email verification
//! and password reset. Codes are hashed at rest; a handful of wrong guesses
//! burns the code.

use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::PgPool;

const CODE_LEN: usize = 6;
const MAX_FAILED_ATTEMPTS: i32 = 5;

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("invalid code")]
    InvalidCode,
    #[error("expired or incorrect code")]
    VerificationFailed,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// What a code unlocks. Reset codes are deliberately short-lived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpPurpose {
    VerifyEmail,
    ResetPassword,
}

impl OtpPurpose {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VerifyEmail => "verify_email",
            Self::ResetPassword => "reset_password",
        }
    }

    /// Postgres interval literal for the code's lifetime.
    #[must_use]
    fn ttl(self) -> &'static str {
        match self {
            Self::VerifyEmail => "24 hours",
            Self::ResetPassword => "15 minutes",
        }
    }
}

#[must_use]
pub fn normalize_code(code: &str) -> Option<String> {
    let normalized = code.trim().to_owned();
    if normalized.len() != CODE_LEN || !normalized.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(normalized)
}

/// Generate a six-digit numeric code. Never starts with zero so the code
/// reads the same whether treated as a string or a number.
#[must_use]
pub fn generate_code() -> String {
    let n: u32 = rand::rng().random_range(100_000..1_000_000);
    n.to_string()
}

#[must_use]
pub fn hash_code(code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(code.as_bytes());
    let bytes = hasher.finalize();
    bytes.iter().map(|b| format!("{b:02x}")).collect::<String>()
}

/// Issue a fresh code for the email/purpose pair, invalidating any live one.
/// Returns the plain code for the caller to mail out.
pub async fn issue_code(pool: &PgPool, email: &str, purpose: OtpPurpose) -> Result<String, OtpError> {
    sqlx::query("DELETE FROM otp_codes WHERE email = $1 AND purpose = $2 AND consumed_at IS NULL")
        .bind(email)
        .bind(purpose.as_str())
        .execute(pool)
        .await?;

    let code = generate_code();
    let code_hash = hash_code(&code);

    sqlx::query(
        r"INSERT INTO otp_codes (email, purpose, code_hash, expires_at)
          VALUES ($1, $2, $3, now() + $4::interval)",
    )
    .bind(email)
    .bind(purpose.as_str())
    .bind(code_hash)
    .bind(purpose.ttl())
    .execute(pool)
    .await?;

    Ok(code)
}

/// Verify and consume a code. A wrong guess bumps the attempt counter and
/// burns the code once `MAX_FAILED_ATTEMPTS` is reached.
pub async fn verify_code(pool: &PgPool, email: &str, purpose: OtpPurpose, code: &str) -> Result<(), OtpError> {
    let normalized = normalize_code(code).ok_or(OtpError::InvalidCode)?;
    let code_hash = hash_code(&normalized);

    let update = sqlx::query(
        r"UPDATE otp_codes
          SET consumed_at = now()
          WHERE id = (
              SELECT id
              FROM otp_codes
              WHERE email = $1
                AND purpose = $2
                AND consumed_at IS NULL
                AND expires_at > now()
              ORDER BY created_at DESC
              LIMIT 1
          )
          AND code_hash = $3
          RETURNING id",
    )
    .bind(email)
    .bind(purpose.as_str())
    .bind(&code_hash)
    .fetch_optional(pool)
    .await?;

    if update.is_none() {
        sqlx::query(
            r"UPDATE otp_codes
              SET attempts = attempts + 1,
                  consumed_at = CASE WHEN attempts + 1 >= $3 THEN now() ELSE consumed_at END
              WHERE id = (
                  SELECT id
                  FROM otp_codes
                  WHERE email = $1
                    AND purpose = $2
                    AND consumed_at IS NULL
                    AND expires_at > now()
                  ORDER BY created_at DESC
                  LIMIT 1
              )",
        )
        .bind(email)
        .bind(purpose.as_str())
        .bind(MAX_FAILED_ATTEMPTS)
        .execute(pool)
        .await?;
        return Err(OtpError::VerificationFailed);
    }

    Ok(())
}

#[cfg(test)]
#[path = "otp_test.rs"]
mod tests;
