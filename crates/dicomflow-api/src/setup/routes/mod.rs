//! Route configuration and setup.

mod health;

use crate::auth::{auth_middleware, AuthState, JwtVerifier};
use crate::constants::DICOM_PREFIX;
use crate::handlers;
use crate::state::AppState;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, patch, post},
    Json, Router,
};
use dicomflow_core::Config;
use dicomflow_infra::{request_id_middleware, security_headers_middleware};
use std::sync::Arc;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

/// Setup all application routes
pub fn setup_routes(config: &Config, state: Arc<AppState>) -> Result<Router<()>, anyhow::Error> {
    let cors = setup_cors(config)?;
    let auth_state = Arc::new(AuthState {
        verifier: JwtVerifier::new(config.jwt_secret()),
    });

    let protected_routes = Router::new()
        .nest(DICOM_PREFIX, dicom_routes())
        .layer(axum::middleware::from_fn_with_state(auth_state, auth_middleware));

    let app_state_routes = public_routes().merge(protected_routes);

    let http_concurrency_limit = config.http_concurrency_limit().max(1);
    let max_body_bytes = config.max_request_body_bytes();
    tracing::info!(
        http_concurrency_limit,
        max_body_bytes,
        "HTTP limits configured"
    );

    let app = app_state_routes
        .nest(
            "/docs",
            utoipa_rapidoc::RapiDoc::new("/api/openapi.json")
                .path("/docs")
                .into(),
        )
        .layer(ConcurrencyLimitLayer::new(http_concurrency_limit))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(axum::middleware::from_fn(security_headers_middleware))
        .with_state(state);

    Ok(app)
}

fn setup_cors(config: &Config) -> Result<CorsLayer, anyhow::Error> {
    let methods = [Method::GET, Method::POST, Method::PATCH, Method::OPTIONS];
    let cors = if config.cors_origins().iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow all origins - not recommended for production");
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any)
    } else {
        let origins = config
            .cors_origins()
            .iter()
            .map(|o| o.parse::<HeaderValue>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow::anyhow!("Invalid CORS origin: {}", e))?;
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(Any)
    };
    Ok(cors)
}

fn dicom_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/folder-structure",
            post(handlers::folder_structure::register_folder_structure),
        )
        .route("/chunks", post(handlers::chunks::upload_chunk))
        .route("/upload", post(handlers::upload::upload_files))
        .route("/orders", get(handlers::orders::list_orders))
        .route("/orders/{order_id}", get(handlers::orders::get_order))
        .route(
            "/orders/{order_id}/status",
            patch(handlers::orders::update_order_status),
        )
        .route(
            "/orders/{order_id}/collaborators",
            post(handlers::orders::add_collaborator),
        )
}

fn public_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/live", get(health::liveness_check))
        .route(
            "/api/openapi.json",
            get(|| async { Json(crate::api_doc::get_openapi_spec()) }),
        )
}
