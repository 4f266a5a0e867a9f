//! Enrollment and progress endpoints
//!
//! - GET /api/enrollments - The caller's courses with progress
//! - POST /api/lessons/{id}/complete - Mark a lesson done

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};

use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::models::{CourseProgress, EnrollmentWithCourse};

/// Routes behind `require_auth`
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/enrollments", get(list_enrollments))
        .route("/lessons/{id}/complete", post(complete_lesson))
}

async fn list_enrollments(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
) -> Result<Json<Vec<EnrollmentWithCourse>>, ApiError> {
    Ok(Json(state.enrollment_service.list(&user).await?))
}

async fn complete_lesson(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(id): Path<i64>,
) -> Result<Json<CourseProgress>, ApiError> {
    Ok(Json(
        state.enrollment_service.complete_lesson(&user, id).await?,
    ))
}
