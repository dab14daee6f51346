pub mod health;

use axum::{
    http::Uri,
    routing::{get, post},
    Router,
};

use crate::capillary::handlers;
use crate::errors::AppError;
use crate::state::AppState;

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {uri}"))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/api/v1/capillary/calculate",
            post(handlers::handle_calculate),
        )
        .route("/api/v1/capillary/export", post(handlers::handle_export))
        .fallback(not_found)
        .with_state(state)
}
