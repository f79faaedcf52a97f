//! Mail delivery behind a sender trait.
//!
//! ARCHITECTURE
//! ============
//! OTP and notification flows depend on outbound mail, so delivery sits
//! behind `MailSender`. Production uses Resend; tests swap in a mock and
//! assert on captured sends.

use async_trait::async_trait;
use resend_rs::Resend;
use resend_rs::types::CreateEmailBaseOptions;

const VERIFY_EMAIL_TEMPLATE: &str = include_str!("../../templates/verify_email.html");
const RESET_PASSWORD_TEMPLATE: &str = include_str!("../../templates/reset_password.html");

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("email delivery failed: {0}")]
    Delivery(String),
}

/// Outbound mail seam. One method; the caller renders the body.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError>;
}

/// Resend-backed mail sender.
pub struct ResendMailer {
    client: Resend,
    from: String,
}

impl ResendMailer {
    /// Load from `RESEND_API_KEY` and `RESEND_FROM`.
    /// Returns `None` if either is missing (mail will be disabled).
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("RESEND_API_KEY").ok()?;
        let from = std::env::var("RESEND_FROM").ok()?;
        Some(Self { client: Resend::new(&api_key), from })
    }
}

#[async_trait]
impl MailSender for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), MailError> {
        let recipients = [to];
        let email = CreateEmailBaseOptions::new(&self.from, recipients, subject).with_html(html);
        self.client
            .emails
            .send(email)
            .await
            .map_err(|e| MailError::Delivery(e.to_string()))?;
        Ok(())
    }
}

// =============================================================================
// TEMPLATES
// =============================================================================

#[must_use]
pub fn render_verify_email(email: &str, code: &str) -> String {
    VERIFY_EMAIL_TEMPLATE
        .replace("{{EMAIL}}", email)
        .replace("{{CODE}}", code)
}

#[must_use]
pub fn render_reset_email(email: &str, code: &str) -> String {
    RESET_PASSWORD_TEMPLATE
        .replace("{{EMAIL}}", email)
        .replace("{{CODE}}", code)
}

/// Plain notification body for a new guide application.
#[must_use]
pub fn render_guide_application_email(name: &str, email: &str, destinations: &[String], hourly_rate: f64) -> String {
    format!(
        "<div style=\"font-family: sans-serif; max-width: 600px;\">\
         <h2>New Guide Application</h2>\
         <p><strong>Name:</strong> {name}</p>\
         <p><strong>Email:</strong> {email}</p>\
         <p><strong>Destinations:</strong> {}</p>\
         <p><strong>Hourly rate:</strong> {hourly_rate}</p>\
         <p>Open the admin panel to approve or reject this application.</p>\
         </div>",
        destinations.join(", ")
    )
}

#[cfg(test)]
#[path = "mail_test.rs"]
mod tests;
