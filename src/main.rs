mod db;
mod frame;
mod rate_limit;
mod routes;
mod services;
mod state;

use std::sync::Arc;

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL required");
    let port: u16 = std::env::var("PORT")
        .unwrap_or_else(|_| "5000".into())
        .parse()
        .expect("invalid PORT");

    let pool = db::init_pool(&database_url)
        .await
        .expect("database init failed");

    if let Err(e) = services::auth::promote_admin_from_env(&pool).await {
        tracing::error!(error = %e, "admin promotion failed");
    }

    // Mail delivery (non-fatal: OTP and notification mails disabled if unset).
    let mailer = match services::mail::ResendMailer::from_env() {
        Some(m) => Some(Arc::new(m) as Arc<dyn services::mail::MailSender>),
        None => {
            tracing::warn!("RESEND_API_KEY/RESEND_FROM not set — mail delivery disabled");
            None
        }
    };

    // Google OAuth (non-fatal: credential login still works without it).
    let google = services::auth::GoogleConfig::from_env();
    if google.is_none() {
        tracing::warn!("Google OAuth env vars not set — OAuth login disabled");
    }

    let state = state::AppState::new(pool, mailer, google);

    // Spawn the periodic presence re-broadcast.
    let _presence = services::presence::spawn_presence_task(state.clone());

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "tourhub listening");
    axum::serve(listener, app).await.expect("server failed");
}
