//! Auth routes — registration, login, Google OAuth, OTP flows, WS tickets.

use axum::extract::{FromRef, FromRequestParts, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Redirect, Response};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use time::Duration;

use crate::services::otp::{self, OtpPurpose};
use crate::services::{auth as auth_svc, mail, session};
use crate::state::AppState;

const COOKIE_NAME: &str = "session_token";
const OAUTH_STATE_COOKIE_NAME: &str = "oauth_state";

pub(crate) fn env_bool(key: &str) -> Option<bool> {
    std::env::var(key)
        .ok()
        .and_then(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
}

pub(crate) fn cookie_secure() -> bool {
    if let Some(value) = env_bool("COOKIE_SECURE") {
        return value;
    }

    std::env::var("GOOGLE_REDIRECT_URI")
        .map(|uri| uri.starts_with("https://"))
        .unwrap_or(false)
}

// =============================================================================
// AUTH EXTRACTORS
// =============================================================================

/// Authenticated user extracted from the session cookie.
/// Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: session::SessionUser,
    pub token: String,
}

impl<S> FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar.get(COOKIE_NAME).map(Cookie::value).unwrap_or_default();
        if token.is_empty() {
            return Err(StatusCode::UNAUTHORIZED);
        }

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, token)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { user, token: token.to_owned() })
    }
}

/// Admin-role user. Rejects with 403 for any other role.
pub struct AdminUser {
    pub user: session::SessionUser,
}

impl<S> FromRequestParts<S> for AdminUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = AuthUser::from_request_parts(parts, state).await?;
        if !auth.user.is_admin() {
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(Self { user: auth.user })
    }
}

pub(crate) fn auth_error_to_status(err: &auth_svc::AuthError) -> StatusCode {
    use auth_svc::AuthError;
    match err {
        AuthError::InvalidEmail
        | AuthError::DisposableEmail
        | AuthError::WeakPassword
        | AuthError::InvalidRole => StatusCode::BAD_REQUEST,
        AuthError::EmailTaken | AuthError::AlreadyVerified => StatusCode::CONFLICT,
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::Blocked | AuthError::Deactivated => StatusCode::FORBIDDEN,
        AuthError::UserNotFound => StatusCode::NOT_FOUND,
        AuthError::TokenExchange(_) | AuthError::OAuthApi(_) => StatusCode::BAD_GATEWAY,
        AuthError::PasswordHash | AuthError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

// =============================================================================
// REGISTRATION / LOGIN
// =============================================================================

#[derive(Deserialize)]
pub struct RegisterBody {
    name: String,
    email: String,
    password: String,
    role: Option<String>,
}

/// `POST /api/auth/register` — create an account and log it in.
pub async fn register(State(state): State<AppState>, Json(body): Json<RegisterBody>) -> Response {
    let name = body.name.trim();
    if name.is_empty() {
        return (StatusCode::BAD_REQUEST, "name required").into_response();
    }
    let role = body.role.as_deref().unwrap_or("traveler");

    let user = match auth_svc::register_user(&state.pool, name, &body.email, &body.password, role).await {
        Ok(u) => u,
        Err(e) => return (auth_error_to_status(&e), e.to_string()).into_response(),
    };

    login_response(&state, user, StatusCode::CREATED).await
}

#[derive(Deserialize)]
pub struct LoginBody {
    email: String,
    password: String,
}

/// `POST /api/auth/login` — verify credentials, set session cookie.
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> Response {
    let user = match auth_svc::verify_credentials(&state.pool, &body.email, &body.password).await {
        Ok(u) => u,
        Err(e) => return (auth_error_to_status(&e), e.to_string()).into_response(),
    };

    login_response(&state, user, StatusCode::OK).await
}

/// Create a session for the user and attach the HttpOnly cookie.
async fn login_response(state: &AppState, user: session::SessionUser, status: StatusCode) -> Response {
    let token = match session::create_session(&state.pool, user.id).await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "session creation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to create session").into_response();
        }
    };

    let cookie = Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .secure(cookie_secure());

    let jar = CookieJar::new().add(cookie);
    (jar, (status, Json(user))).into_response()
}

/// `GET /api/auth/me` — return current user.
pub async fn me(auth: AuthUser) -> Json<session::SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout` — delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    let _ = session::delete_session(&state.pool, &auth.token).await;

    let cookie = Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .secure(cookie_secure())
        .max_age(Duration::ZERO);

    let jar = CookieJar::new().add(cookie);
    (jar, StatusCode::NO_CONTENT)
}

// =============================================================================
// GOOGLE OAUTH
// =============================================================================

/// `GET /auth/google` — redirect to the Google authorization page.
pub async fn google_redirect(State(state): State<AppState>) -> Response {
    let Some(config) = &state.google else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Google OAuth not configured").into_response();
    };

    let oauth_state = session::generate_token();
    let cookie = Cookie::build((OAUTH_STATE_COOKIE_NAME, oauth_state.clone()))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .secure(cookie_secure())
        .max_age(Duration::minutes(10));

    let jar = CookieJar::new().add(cookie);
    (jar, Redirect::temporary(&config.authorize_url(&oauth_state))).into_response()
}

#[derive(Deserialize)]
pub struct CallbackQuery {
    code: String,
    state: Option<String>,
}

/// `GET /auth/google/callback` — exchange code, upsert user, set cookie,
/// redirect to `/`.
pub async fn google_callback(
    State(state): State<AppState>,
    jar: CookieJar,
    axum::extract::Query(params): axum::extract::Query<CallbackQuery>,
) -> Response {
    let Some(config) = &state.google else {
        return (StatusCode::SERVICE_UNAVAILABLE, "Google OAuth not configured").into_response();
    };
    let secure = cookie_secure();

    // Verify OAuth CSRF state from cookie.
    let Some(callback_state) = params.state.as_deref() else {
        return (StatusCode::BAD_REQUEST, "missing oauth state").into_response();
    };
    let expected_state = jar
        .get(OAUTH_STATE_COOKIE_NAME)
        .map(Cookie::value)
        .unwrap_or_default();
    if expected_state.is_empty() || expected_state != callback_state {
        return (StatusCode::UNAUTHORIZED, "invalid oauth state").into_response();
    }

    // Exchange code for access token.
    let access_token = match auth_svc::exchange_code(config, &params.code).await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "oauth code exchange failed");
            return (StatusCode::BAD_GATEWAY, "OAuth code exchange failed").into_response();
        }
    };

    // Fetch the Google profile.
    let google_user = match auth_svc::fetch_google_user(&access_token).await {
        Ok(u) => u,
        Err(e) => {
            tracing::error!(error = %e, "google user fetch failed");
            return (StatusCode::BAD_GATEWAY, "Failed to fetch Google profile").into_response();
        }
    };

    // Link or create the account.
    let user = match auth_svc::upsert_oauth_user(&state.pool, &google_user).await {
        Ok(u) => u,
        Err(e) => {
            tracing::error!(error = %e, "oauth user upsert failed");
            return (auth_error_to_status(&e), "Failed to create user").into_response();
        }
    };

    let token = match session::create_session(&state.pool, user.id).await {
        Ok(t) => t,
        Err(e) => {
            tracing::error!(error = %e, "session creation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create session").into_response();
        }
    };

    let session_cookie = Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .secure(secure);
    let clear_oauth_state_cookie = Cookie::build((OAUTH_STATE_COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(axum_extra::extract::cookie::SameSite::Lax)
        .secure(secure)
        .max_age(Duration::ZERO);

    let jar = jar.add(session_cookie).add(clear_oauth_state_cookie);
    (jar, Redirect::temporary("/")).into_response()
}

// =============================================================================
// OTP FLOWS
// =============================================================================

/// Issue a code and mail it. Shared by the verify and reset flows.
async fn send_code(state: &AppState, email: &str, purpose: OtpPurpose) -> Result<(), Response> {
    let Some(mailer) = &state.mailer else {
        return Err((StatusCode::SERVICE_UNAVAILABLE, "mail delivery not configured").into_response());
    };

    if let Err(e) = state.rate_limiter.check_otp_send(email) {
        return Err((StatusCode::TOO_MANY_REQUESTS, e.to_string()).into_response());
    }

    let code = otp::issue_code(&state.pool, email, purpose)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response())?;

    let (subject, html) = match purpose {
        OtpPurpose::VerifyEmail => ("Verify your email", mail::render_verify_email(email, &code)),
        OtpPurpose::ResetPassword => ("Reset your password", mail::render_reset_email(email, &code)),
    };
    if let Err(e) = mailer.send(email, subject, &html).await {
        tracing::error!(error = %e, %email, "otp mail delivery failed");
        return Err((StatusCode::BAD_GATEWAY, "mail delivery failed").into_response());
    }
    Ok(())
}

fn otp_error_to_status(err: &otp::OtpError) -> StatusCode {
    match err {
        otp::OtpError::InvalidCode => StatusCode::BAD_REQUEST,
        otp::OtpError::VerificationFailed => StatusCode::UNAUTHORIZED,
        otp::OtpError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `POST /api/auth/verify/request` — mail a verification code.
pub async fn request_verify_code(State(state): State<AppState>, auth: AuthUser) -> Response {
    if auth.user.verified {
        return (StatusCode::CONFLICT, "account already verified").into_response();
    }

    if let Err(resp) = send_code(&state, &auth.user.email, OtpPurpose::VerifyEmail).await {
        return resp;
    }
    Json(serde_json::json!({ "ok": true })).into_response()
}

#[derive(Deserialize)]
pub struct VerifyCodeBody {
    code: String,
}

/// `POST /api/auth/verify/confirm` — consume the code, mark verified.
pub async fn confirm_verify_code(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<VerifyCodeBody>,
) -> Response {
    if let Err(e) = otp::verify_code(&state.pool, &auth.user.email, OtpPurpose::VerifyEmail, &body.code).await {
        return (otp_error_to_status(&e), e.to_string()).into_response();
    }
    if let Err(e) = auth_svc::mark_verified(&state.pool, &auth.user.email).await {
        return (auth_error_to_status(&e), e.to_string()).into_response();
    }
    Json(serde_json::json!({ "ok": true })).into_response()
}

#[derive(Deserialize)]
pub struct ResetRequestBody {
    email: String,
}

/// `POST /api/auth/reset/request` — mail a password-reset code.
pub async fn request_reset_code(State(state): State<AppState>, Json(body): Json<ResetRequestBody>) -> Response {
    let Some(email) = auth_svc::normalize_email(&body.email) else {
        return (StatusCode::BAD_REQUEST, "invalid email address").into_response();
    };

    let exists: Result<bool, sqlx::Error> = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
        .bind(&email)
        .fetch_one(&state.pool)
        .await;
    match exists {
        Ok(true) => {}
        Ok(false) => return (StatusCode::NOT_FOUND, "user not found").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "reset lookup failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    if let Err(resp) = send_code(&state, &email, OtpPurpose::ResetPassword).await {
        return resp;
    }
    Json(serde_json::json!({ "ok": true })).into_response()
}

#[derive(Deserialize)]
pub struct ResetConfirmBody {
    email: String,
    code: String,
    new_password: String,
}

/// `POST /api/auth/reset/confirm` — consume the code, replace the password.
pub async fn confirm_reset_code(State(state): State<AppState>, Json(body): Json<ResetConfirmBody>) -> Response {
    let Some(email) = auth_svc::normalize_email(&body.email) else {
        return (StatusCode::BAD_REQUEST, "invalid email address").into_response();
    };

    if let Err(e) = otp::verify_code(&state.pool, &email, OtpPurpose::ResetPassword, &body.code).await {
        return (otp_error_to_status(&e), e.to_string()).into_response();
    }
    if let Err(e) = auth_svc::reset_password(&state.pool, &email, &body.new_password).await {
        return (auth_error_to_status(&e), e.to_string()).into_response();
    }
    Json(serde_json::json!({ "ok": true })).into_response()
}

#[derive(Deserialize)]
pub struct ChangePasswordBody {
    current_password: String,
    new_password: String,
}

/// `POST /api/auth/change-password` — verify the current password first.
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ChangePasswordBody>,
) -> Response {
    if let Err(e) = auth_svc::change_password(&state.pool, auth.user.id, &body.current_password, &body.new_password).await
    {
        return (auth_error_to_status(&e), e.to_string()).into_response();
    }
    Json(serde_json::json!({ "ok": true })).into_response()
}

// =============================================================================
// WS TICKETS
// =============================================================================

/// `POST /api/auth/ws-ticket` — create a one-time WS ticket.
pub async fn ws_ticket(State(state): State<AppState>, auth: AuthUser) -> Result<Json<serde_json::Value>, StatusCode> {
    let ticket = session::create_ws_ticket(&state.pool, auth.user.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(serde_json::json!({ "ticket": ticket })))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
