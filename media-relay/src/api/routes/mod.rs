//! API route modules.

pub mod dashboard;
pub mod health;
pub mod status;

use axum::Router;

use crate::api::server::AppState;

/// Create the router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(dashboard::router())
        .nest("/api", status::router())
        .nest("/health", health::router())
        .with_state(state)
}
