//! API Router configuration

use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, enable_cors: bool) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        // Detectors
        .route("/detectors", get(handlers::list_detectors))
        .route(
            "/namespaces/:namespace/detectors/:name",
            get(handlers::get_detector)
                .put(handlers::apply_detector)
                .delete(handlers::delete_detector),
        )
        .route(
            "/namespaces/:namespace/detectors/:name/status",
            get(handlers::get_detector_status),
        )
        .route(
            "/namespaces/:namespace/detectors/:name/reconcile",
            post(handlers::reconcile_detector),
        );

    let router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TraceLayer::new_for_http());

    let router = if enable_cors {
        router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else {
        router
    };

    router.with_state(state)
}
