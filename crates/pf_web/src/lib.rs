use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

pub mod handlers;
pub mod state;

pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/feed", get(handlers::feed))
        .route("/api/status", get(handlers::status))
        .route("/api/trigger", post(handlers::trigger))
        .layer(cors)
        .with_state(Arc::new(state))
}

pub mod prelude {
    pub use super::AppState;
    pub use pf_core::{Error, Result};
}
