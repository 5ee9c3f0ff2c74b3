use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;
use super::static_files::static_handler;

// UI Routes - the embedded single page
pub fn ui_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::ui::index_handler))
        .route("/static/{*path}", get(static_handler))
}

// API Routes - JSON endpoints behind the page
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest(
        "/api",
        Router::new()
            // Generate + execute, and the manual-edit re-run
            .route("/query", post(handlers::api::nl_query))
            .route("/execute", post(handlers::api::execute_edited))
            // Sidebar schema
            .route("/schema", get(handlers::api::get_schema))
            // Session state for page reloads
            .route("/session", get(handlers::api::get_session))
            // System status
            .route("/status", get(handlers::api::system_status)),
    )
}
