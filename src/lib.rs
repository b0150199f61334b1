pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod resources;
pub mod services;
pub mod state;

#[cfg(test)]
pub mod testing;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::SecurityConfig;
use crate::error::ApiError;
use crate::handlers::{courses, data, levels, members, progress, root, tenant};
use crate::middleware::{require_principal, resolve_tenant};
use crate::state::AppState;

/// The full HTTP surface: public probes, principal-only routes, and tenant-scoped routes
pub fn app(state: AppState) -> Router {
    let max_body = state.config.api.max_request_size_bytes;
    let cors = cors_layer(&state.config.security);

    let authenticated = Router::new()
        .route("/api/principal", get(members::principal))
        .merge(tenant_routes(&state))
        .route_layer(from_fn_with_state(state.clone(), require_principal));

    Router::new()
        .route("/", get(root::root))
        .route("/health", get(root::health))
        .merge(authenticated)
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(max_body))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn tenant_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/me", get(members::me))
        .route("/api/members/sync", post(members::sync))
        .route("/api/tenant", get(tenant::show).patch(tenant::rename))
        .route(
            "/api/data/:resource",
            get(data::list)
                .post(data::create)
                .patch(data::update_by_query)
                .delete(data::remove_by_query),
        )
        .route(
            "/api/data/:resource/:id",
            get(data::show).patch(data::update).delete(data::remove),
        )
        .route(
            "/api/trainers/:id/levels",
            get(levels::trainer_levels)
                .post(levels::trainer_assign)
                .delete(levels::trainer_unassign),
        )
        .route(
            "/api/batches/:id/levels",
            get(levels::batch_levels)
                .post(levels::batch_assign)
                .delete(levels::batch_unassign),
        )
        .route("/api/courses/:id/outline", get(courses::outline))
        .route("/api/progress/completions", post(progress::record_completion))
        .route("/api/progress/attempts", post(progress::record_attempt))
        .route("/api/progress/courses/:id/completed", get(progress::completed))
        .route("/api/progress/courses/:id/latest-attempt", get(progress::latest_attempt))
        .route_layer(from_fn_with_state(state.clone(), resolve_tenant))
}

fn cors_layer(security: &SecurityConfig) -> CorsLayer {
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if security.cors_origins.is_empty() || security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    CorsLayer::permissive().allow_origin(AllowOrigin::list(origins))
}

async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
