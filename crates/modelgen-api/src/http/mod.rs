//! HTTP server for the model generation API.
//!
//! Provides endpoints for:
//! - Health check (`/health`)
//! - Auth info (`/v1/auth`)
//! - Generators (`/v1/generators`, `/v1/generators/:generator/:tag`)
//! - Models (`/v1/generators/:generator/:tag/models`)
//! - Task status (`/v1/tasks/:task_id`)
//!
//! Everything under `/v1` requires the bearer token.

use std::sync::Arc;

use axum::{middleware, routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod auth;
mod handlers;
pub mod responses;

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/v1/auth", get(handlers::auth_info))
        .route("/v1/generators", get(handlers::list_generators))
        .route("/v1/generators/:generator/:tag", get(handlers::get_generator))
        .route(
            "/v1/generators/:generator/:tag/models",
            get(handlers::list_models).post(handlers::create_model),
        )
        .route("/v1/tasks/:task_id", get(handlers::get_task))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth::require_auth));

    Router::new()
        .route("/health", get(handlers::health_check))
        .merge(api)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
