//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the HTTP API and the websocket endpoint under a single
//! Axum router. The frontend is a separate SPA, so CORS is permissive and
//! everything API-shaped lives under `/api`.

pub mod auth;
pub mod chat;
pub mod guides;
pub mod tours;
pub mod users;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/auth/google", get(auth::google_redirect))
        .route("/auth/google/callback", get(auth::google_callback))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/verify/request", post(auth::request_verify_code))
        .route("/api/auth/verify/confirm", post(auth::confirm_verify_code))
        .route("/api/auth/reset/request", post(auth::request_reset_code))
        .route("/api/auth/reset/confirm", post(auth::confirm_reset_code))
        .route("/api/auth/change-password", post(auth::change_password))
        .route("/api/auth/ws-ticket", post(auth::ws_ticket))
        .route("/api/users/me", get(users::me_profile).patch(users::update_profile))
        .route("/api/tours", get(tours::list_approved_tours).post(tours::create_tour))
        .route("/api/tours/mine", get(tours::my_tours))
        .route(
            "/api/tours/{id}",
            get(tours::tour_detail)
                .patch(tours::update_tour)
                .delete(tours::delete_tour),
        )
        .route("/api/tours/{id}/cancel", post(tours::cancel_tour))
        .route("/api/admin/tours", get(tours::admin_list_tours))
        .route("/api/admin/tours/{id}/decision", post(tours::admin_decide_tour))
        .route("/api/guides", get(guides::list_guides))
        .route("/api/guides/apply", post(guides::apply_guide))
        .route("/api/admin/guides", get(guides::admin_list_applications))
        .route("/api/admin/guides/{id}/decision", post(guides::admin_decide_application))
        .route("/api/chat/messages", get(chat::list_messages).post(chat::post_message))
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
