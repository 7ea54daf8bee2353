use axum::{
    http::{header, HeaderName, Method},
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod metrics;
pub mod middlewares;
pub mod models;
pub mod services;
pub mod utils;

pub use config::Config;
pub use error::{HintError, HintResult};
pub use services::AppState;

pub fn create_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(middlewares::trace::TRACE_ID_HEADER),
        ])
        .expose_headers([HeaderName::from_static(middlewares::trace::TRACE_ID_HEADER)])
        .allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/metrics",
            get(handlers::metrics_handler).layer(middleware::from_fn_with_state(
                app_state.clone(),
                handlers::metrics_auth_middleware,
            )),
        )
        .nest("/api/v1", practice_routes().layer(cors))
        .with_state(app_state)
        .layer(middleware::from_fn(
            middlewares::metrics::metrics_middleware,
        ))
        .layer(middleware::from_fn(
            middlewares::trace::trace_context_middleware,
        ))
        .layer(TraceLayer::new_for_http())
}

fn practice_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/classify", post(handlers::practice::classify_attempt))
        .route(
            "/questions/{topic}/{category}/{question}/steps/{step}/check",
            post(handlers::practice::check_step),
        )
        .route(
            "/questions/{topic}/{category}/{question}/hints",
            post(handlers::practice::ensure_hints),
        )
        .route(
            "/questions/{topic}/{category}/{question}/hints/regenerate",
            post(handlers::practice::regenerate_hints),
        )
        .route(
            "/questions/{topic}/{category}/{question}/hints/{step}",
            get(handlers::practice::resolve_hint),
        )
}
