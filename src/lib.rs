use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderValue, Method, StatusCode},
    middleware,
    routing::get,
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

pub mod config;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

use crate::{state::AppState, utils::middleware as app_middleware};

/// 构建应用路由
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let allowed_origins = app_state
        .config
        .cors_allowed_origins
        .split(',')
        .filter_map(|origin| match origin.trim().parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect::<Vec<_>>();

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers(Any)
        .allow_origin(allowed_origins);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .nest(
            "/api/users",
            routes::users::router().merge(routes::follows::router()),
        )
        .nest("/api/diagnostics", routes::diagnostics::router())
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            app_middleware::rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            app_middleware::request_logging_middleware,
        ))
        .layer(middleware::from_fn(app_middleware::request_id_middleware))
        .layer(cors)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

async fn root() -> &'static str {
    "Rainbow-Network is running!"
}

async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, &'static str) {
    match state.db.verify_connection().await {
        Ok(_) => (StatusCode::OK, "Rainbow-Network is running!"),
        Err(e) => {
            warn!("Health check failed: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, "Database unavailable")
        }
    }
}
