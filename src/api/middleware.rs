//! API middleware
//!
//! Contains:
//! - Shared application state
//! - The JSON error type and the service error conversions
//! - Authentication (session token validation) and role guards
//! - Request statistics

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::cache::Cache;
use crate::config::AuthConfig;
use crate::db::repositories::{
    SqlxBlogRepository, SqlxCartRepository, SqlxCourseRepository, SqlxEnrollmentRepository,
    SqlxOrderRepository, SqlxSessionRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::models::User;
use crate::services::{
    BlogService, BlogServiceError, CommerceService, CommerceServiceError, CourseService,
    CourseServiceError, EnrollmentService, EnrollmentServiceError, UserService, UserServiceError,
    WebhookError, WebhookService,
};

// ============================================================================
// Request Statistics
// ============================================================================

/// Lightweight request statistics using atomic operations (no locks)
pub struct RequestStats {
    total_requests: AtomicU64,
    /// Sum of response times in microseconds
    total_response_time_us: AtomicU64,
    start_time: Instant,
}

impl RequestStats {
    pub fn new() -> Self {
        Self {
            total_requests: AtomicU64::new(0),
            total_response_time_us: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a request with its response time
    pub fn record(&self, duration_us: u64) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        self.total_response_time_us
            .fetch_add(duration_us, Ordering::Relaxed);
    }

    pub fn total_requests(&self) -> u64 {
        self.total_requests.load(Ordering::Relaxed)
    }

    /// Average response time in milliseconds
    pub fn avg_response_time_ms(&self) -> f64 {
        let total = self.total_requests.load(Ordering::Relaxed);
        if total == 0 {
            return 0.0;
        }
        let total_time = self.total_response_time_us.load(Ordering::Relaxed);
        total_time as f64 / total as f64 / 1000.0
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}

impl Default for RequestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub user_service: Arc<UserService>,
    pub course_service: Arc<CourseService>,
    pub enrollment_service: Arc<EnrollmentService>,
    pub blog_service: Arc<BlogService>,
    pub commerce_service: Arc<CommerceService>,
    pub webhook_service: Arc<WebhookService>,
    pub request_stats: Arc<RequestStats>,
    /// Session lifetime, used for the cookie's Max-Age
    pub session_days: i64,
}

impl AppState {
    /// Wire repositories and services over one pool and cache
    pub fn new(pool: DynDatabasePool, cache: Arc<Cache>, auth: &AuthConfig) -> Self {
        let user_repo = SqlxUserRepository::boxed(pool.clone());
        let session_repo = SqlxSessionRepository::boxed(pool.clone());
        let course_repo = SqlxCourseRepository::boxed(pool.clone());
        let enrollment_repo = SqlxEnrollmentRepository::boxed(pool.clone());
        let blog_repo = SqlxBlogRepository::boxed(pool.clone());
        let cart_repo = SqlxCartRepository::boxed(pool.clone());
        let order_repo = SqlxOrderRepository::boxed(pool.clone());

        let user_service = Arc::new(UserService::with_session_days(
            user_repo.clone(),
            session_repo,
            auth.session_days,
        ));
        let course_service = Arc::new(CourseService::new(
            course_repo.clone(),
            enrollment_repo.clone(),
            cache.clone(),
        ));
        let enrollment_service = Arc::new(EnrollmentService::new(
            enrollment_repo.clone(),
            course_repo.clone(),
            cache.clone(),
        ));
        let blog_service = Arc::new(BlogService::new(blog_repo, user_repo, cache.clone()));
        let commerce_service = Arc::new(CommerceService::new(
            cart_repo,
            order_repo,
            course_repo,
            enrollment_repo,
            cache,
        ));
        let webhook_service = Arc::new(WebhookService::new(
            user_service.clone(),
            auth.webhook_secret.clone(),
            auth.webhook_tolerance_seconds,
        ));

        Self {
            pool,
            user_service,
            course_service,
            enrollment_service,
            blog_service,
            commerce_service,
            webhook_service,
            request_stats: Arc::new(RequestStats::new()),
            session_days: auth.session_days,
        }
    }
}

// ============================================================================
// Extractors
// ============================================================================

/// Authenticated user, placed in request extensions by [`require_auth`]
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

/// The signed-in user on public routes, if any (see [`optional_auth`])
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl MaybeUser {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

impl<S> FromRequestParts<S> for MaybeUser
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(
            parts
                .extensions
                .get::<AuthenticatedUser>()
                .map(|u| u.0.clone()),
        ))
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error response for API errors
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: None,
            },
        }
    }

    pub fn with_details(
        code: impl Into<String>,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            error: ApiErrorDetail {
                code: code.into(),
                message: message.into(),
                details: Some(details),
            },
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new("UNAUTHORIZED", message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new("FORBIDDEN", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("NOT_FOUND", message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new("VALIDATION_ERROR", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new("CONFLICT", message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new("RATE_LIMITED", message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new("INTERNAL_ERROR", message)
    }

    /// Log the cause and hide it from the client
    pub fn internal(err: impl std::fmt::Display) -> Self {
        tracing::error!("Internal error: {}", err);
        Self::internal_error("Internal server error")
    }

    pub fn status(&self) -> StatusCode {
        match self.error.code.as_str() {
            "UNAUTHORIZED" => StatusCode::UNAUTHORIZED,
            "FORBIDDEN" => StatusCode::FORBIDDEN,
            "NOT_FOUND" => StatusCode::NOT_FOUND,
            "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
            "CONFLICT" => StatusCode::CONFLICT,
            "RATE_LIMITED" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(self)).into_response()
    }
}

impl From<UserServiceError> for ApiError {
    fn from(err: UserServiceError) -> Self {
        match err {
            UserServiceError::AuthenticationError(msg) => ApiError::unauthorized(msg),
            UserServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            UserServiceError::UserExists(msg) => ApiError::conflict(msg),
            UserServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            UserServiceError::TooManyAttempts => ApiError::rate_limited(err.to_string()),
            UserServiceError::NotFound => ApiError::not_found("User not found"),
            UserServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<CourseServiceError> for ApiError {
    fn from(err: CourseServiceError) -> Self {
        match err {
            CourseServiceError::NotFound | CourseServiceError::LessonNotFound => {
                ApiError::not_found(err.to_string())
            }
            CourseServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            CourseServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CourseServiceError::Conflict(msg) => ApiError::conflict(msg),
            CourseServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<EnrollmentServiceError> for ApiError {
    fn from(err: EnrollmentServiceError) -> Self {
        match err {
            EnrollmentServiceError::CourseNotFound | EnrollmentServiceError::LessonNotFound => {
                ApiError::not_found(err.to_string())
            }
            EnrollmentServiceError::PurchaseRequired => {
                ApiError::validation_error("Purchase required for paid courses")
            }
            EnrollmentServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            EnrollmentServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<BlogServiceError> for ApiError {
    fn from(err: BlogServiceError) -> Self {
        match err {
            BlogServiceError::NotFound | BlogServiceError::CommentNotFound => {
                ApiError::not_found(err.to_string())
            }
            BlogServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            BlogServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            BlogServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<CommerceServiceError> for ApiError {
    fn from(err: CommerceServiceError) -> Self {
        match err {
            CommerceServiceError::CourseNotFound
            | CommerceServiceError::OrderNotFound
            | CommerceServiceError::CouponNotFound => ApiError::not_found(err.to_string()),
            CommerceServiceError::AlreadyEnrolled => ApiError::conflict(err.to_string()),
            CommerceServiceError::EmptyCart => ApiError::validation_error(err.to_string()),
            CommerceServiceError::InvalidCoupon(msg) => {
                ApiError::with_details("VALIDATION_ERROR", "Invalid coupon", serde_json::json!({ "reason": msg }))
            }
            CommerceServiceError::ValidationError(msg) => ApiError::validation_error(msg),
            CommerceServiceError::Conflict(msg) => ApiError::conflict(msg),
            CommerceServiceError::Forbidden(msg) => ApiError::forbidden(msg),
            CommerceServiceError::InternalError(e) => ApiError::internal(e),
        }
    }
}

impl From<WebhookError> for ApiError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::NotConfigured => {
                tracing::error!("Webhook received but no signing secret is configured");
                ApiError::internal_error("Webhook secret not configured")
            }
            WebhookError::InternalError(e) => ApiError::internal(e),
            other => {
                tracing::warn!("Rejected webhook: {}", other);
                ApiError::validation_error(other.to_string())
            }
        }
    }
}

// ============================================================================
// Authentication
// ============================================================================

/// Session token from `Authorization: Bearer` or the `session` cookie
pub(crate) fn extract_session_token(headers: &axum::http::HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                if let Some(token) = cookie.trim().strip_prefix("session=") {
                    return Some(token.to_string());
                }
            }
        }
    }

    None
}

/// Authentication middleware
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_session_token(request.headers())
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;

    let user = state
        .user_service
        .validate_session(&token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("Invalid or expired session"))?;

    request.extensions_mut().insert(AuthenticatedUser(user));
    Ok(next.run(request).await)
}

/// Optional authentication middleware
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    if let Some(token) = extract_session_token(request.headers()) {
        if let Ok(Some(user)) = state.user_service.validate_session(&token).await {
            request.extensions_mut().insert(AuthenticatedUser(user));
        }
    }
    next.run(request).await
}

/// Instructor (or admin) authorization middleware; runs after [`require_auth`]
pub async fn require_instructor(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.can_teach() {
        return Err(ApiError::forbidden("Instructor role required"));
    }

    Ok(next.run(request).await)
}

/// Admin authorization middleware; runs after [`require_auth`]
pub async fn require_admin(request: Request, next: Next) -> Result<Response, ApiError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| ApiError::unauthorized("Authentication required"))?;

    if !user.0.is_admin() {
        return Err(ApiError::forbidden("Admin privileges required"));
    }

    Ok(next.run(request).await)
}

/// Request statistics middleware
pub async fn request_stats_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    state
        .request_stats
        .record(start.elapsed().as_micros() as u64);
    response
}
