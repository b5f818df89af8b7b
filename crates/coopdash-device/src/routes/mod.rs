//! HTTP route handlers for the device emulator.
//!
//! The API lives under `/api`; every other path is served from the
//! dashboard build when a static directory is configured.

pub mod api;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Create the main Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let static_dir = state.static_dir.clone();

    let mut router = Router::new()
        .nest("/api", api::routes())
        .with_state(state);

    // Missing files fall back to index.html so client-side routes resolve.
    if let Some(dir) = static_dir {
        let index = dir.join("index.html");
        router = router.fallback_service(ServeDir::new(dir).fallback(ServeFile::new(index)));
    }

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
