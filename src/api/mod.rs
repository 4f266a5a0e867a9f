//! API layer - HTTP handlers and routing
//!
//! All endpoints live under `/api`:
//! - Auth and account endpoints
//! - Course catalogue, authoring and instructor dashboard
//! - Enrollment and lesson progress
//! - Cart, wishlist, coupons and orders
//! - Blog posts, likes and comments
//! - Auth provider webhook and health check

pub mod auth;
pub mod blog;
pub mod commerce;
pub mod common;
pub mod courses;
pub mod enrollments;
pub mod health;
pub mod instructor;
pub mod middleware;
pub mod webhooks;

use axum::{
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub use middleware::{ApiError, AppState, RequestStats};

/// Build the API router (mounted under `/api` by [`build_router`])
pub fn build_api_router(state: AppState) -> Router<AppState> {
    // Admin routes (need admin role)
    let admin_routes = Router::new()
        .merge(auth::admin_router())
        .merge(commerce::admin_router())
        .route_layer(axum_middleware::from_fn(middleware::require_admin))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Instructor routes (instructors and admins)
    let instructor_routes = Router::new()
        .merge(courses::instructor_router())
        .merge(instructor::router())
        .route_layer(axum_middleware::from_fn(middleware::require_instructor))
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Protected routes (any signed-in user)
    let protected_routes = Router::new()
        .merge(auth::protected_router())
        .merge(courses::protected_router())
        .merge(enrollments::router())
        .merge(commerce::protected_router())
        .merge(blog::protected_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ));

    // Public routes; a valid session still identifies the viewer
    let public_routes = Router::new()
        .merge(auth::public_router())
        .merge(courses::public_router())
        .merge(commerce::public_router())
        .merge(blog::public_router())
        .route_layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ));

    Router::new()
        .merge(health::router())
        .merge(webhooks::router())
        .merge(public_routes)
        .merge(admin_routes)
        .merge(instructor_routes)
        .merge(protected_routes)
}

/// Build the complete router with middleware
pub fn build_router(state: AppState, cors_origin: &str) -> Router {
    // Cookie sessions need credentials, which rules out a wildcard origin
    let origin = cors_origin.parse::<HeaderValue>().unwrap_or_else(|e| {
        tracing::warn!(
            "Invalid CORS origin {:?} ({}), falling back to http://localhost:3000",
            cors_origin,
            e
        );
        HeaderValue::from_static("http://localhost:3000")
    });
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    Router::new()
        .nest("/api", build_api_router(state.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        // Request stats middleware (outermost layer, runs for all requests)
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::request_stats_middleware,
        ))
        .with_state(state)
}
