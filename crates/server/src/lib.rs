pub mod handler;
pub mod lifecycle;
pub mod middleware;
pub mod streaming;

use std::sync::Arc;
use std::time::Instant;

use axum::{middleware as axum_mw, Router};
use orp_catalog::ModelCatalog;
use orp_core::settings::SettingsStore;
use orp_keymanager::KeyManager;
use orp_upstream::UpstreamClient;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<SettingsStore>,
    pub upstream: Arc<UpstreamClient>,
    pub catalog: Arc<ModelCatalog>,
    pub key_manager: Arc<KeyManager>,
    pub start_time: Instant,
}

pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", axum::routing::get(handler::health::health))
        .route(
            "/v1/models",
            axum::routing::get(handler::models::list_models),
        )
        .route("/models", axum::routing::get(handler::models::list_models))
        .route(
            "/v1/engines",
            axum::routing::get(handler::engines::list_engines),
        )
        .route(
            "/engines",
            axum::routing::get(handler::engines::list_engines),
        )
        .route(
            "/v1/chat/completions",
            axum::routing::post(handler::chat_completions::chat_completions),
        )
        .route(
            "/chat/completions",
            axum::routing::post(handler::chat_completions::chat_completions),
        );

    api_routes
        .layer(axum_mw::from_fn(
            middleware::request_logging::request_logging_middleware,
        ))
        .layer(axum_mw::from_fn(
            middleware::request_context::request_context_middleware,
        ))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
